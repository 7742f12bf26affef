use crate::{
    executor::{default_executor, Executor},
    result::catch,
    Error, Future, Result,
};
use std::{fmt, sync::Arc};

/// The write side of a [`Future`].
///
/// A `Promise` owns its future from creation and completes it exactly once,
/// either directly or by scheduling the work that produces the result.
///
/// # Examples
///
/// ```
/// use promise_future::Promise;
/// use std::thread;
///
/// let promise = Promise::new();
/// let future = promise.future().clone();
/// let task = thread::spawn(move || promise.success(String::from("🍓")));
/// assert_eq!(future.get(), Ok(String::from("🍓")));
/// task.join().expect("The task thread has panicked");
/// ```
pub struct Promise<T> {
    future: Future<T>,
}

impl<T> Promise<T>
where
    T: Send + Sync + 'static,
{
    /// A promise scheduling its work on the default executor.
    pub fn new() -> Self {
        Self::with_executor(default_executor())
    }

    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Promise {
            future: Future::empty_on(executor),
        }
    }

    pub fn future(&self) -> &Future<T> {
        &self.future
    }

    /// Resolves the future with `result`.
    ///
    /// # Panics
    ///
    /// If the future is already resolved.
    pub fn complete(&self, result: Result<T>) {
        self.future.complete(result)
    }

    pub fn success(&self, value: T) {
        self.complete(Ok(value))
    }

    pub fn failure(&self, error: Error) {
        self.complete(Err(error))
    }

    /// Runs `producer` on the executor and completes with what it returns.
    ///
    /// Returns immediately. A panic in `producer` completes the future with
    /// [`Error::Panicked`].
    pub fn complete_by<F>(&self, producer: F) -> &Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let future = self.future.clone();
        self.future
            .executor()
            .execute(Box::new(move || future.complete(catch(producer))));
        self
    }

    /// Runs `producer` on the executor and completes with the result of the
    /// future it returns, once that one resolves.
    pub fn complete_with<F>(&self, producer: F) -> &Self
    where
        T: Clone,
        F: FnOnce() -> Future<T> + Send + 'static,
    {
        let future = self.future.clone();
        self.future.executor().execute(Box::new(move || {
            match catch(move || Ok(producer())) {
                Ok(source) => {
                    let on_failure = future.clone();
                    source
                        .on_success(move |value| future.complete(Ok(value.clone())))
                        .on_failure(move |err| on_failure.complete(Err(err.clone())));
                }
                Err(err) => future.complete(Err(err)),
            }
        }));
        self
    }
}

impl<T> Default for Promise<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("future", &self.future)
            .finish()
    }
}
