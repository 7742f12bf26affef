use crate::{
    executor::{default_executor, Executor},
    result::catch,
    waiter::Waiter,
    Error, Promise, Result,
};
use std::{
    fmt,
    future::IntoFuture,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError},
    task::Waker,
};

type Callback<T> = Box<dyn FnOnce(&Result<T>) + Send + 'static>;

/// A result that becomes available exactly once.
///
/// `Future` is a cheap handle: clones share the same cell. It is resolved by
/// a [`Promise`], by a computation handed to [`Future::spawn`], or at
/// construction time. Readers can poll it ([`value`](Future::value)), block on
/// it ([`wait`](Future::wait)), subscribe to it
/// ([`on_complete`](Future::on_complete)) or `.await` it.
///
/// # Examples
///
/// ```
/// use promise_future::Future;
///
/// let six = Future::spawn(|| Ok(5)).map(|v| v + 1);
/// assert_eq!(six.get(), Ok(6));
/// ```
pub struct Future<T> {
    inner: Arc<Inner<T>>,
    executor: Arc<dyn Executor>,
}

struct Inner<T> {
    slot: OnceLock<Result<T>>,
    state: Mutex<State<T>>,
    resolved: Condvar,
}

struct State<T> {
    subscribers: Vec<Callback<T>>,
    // Keyed per `Waiter` so dropping one never forgets another's waker.
    wakers: Vec<(u64, Waker)>,
    next_waker_key: u64,
}

impl<T> Inner<T> {
    fn new(slot: OnceLock<Result<T>>) -> Self {
        Inner {
            slot,
            state: Mutex::new(State {
                subscribers: Vec::new(),
                wakers: Vec::new(),
                next_waker_key: 0,
            }),
            resolved: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            inner: Arc::clone(&self.inner),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T> Future<T>
where
    T: Send + Sync + 'static,
{
    /// An unresolved future with nothing behind it.
    ///
    /// It stays unresolved forever unless something completes it, which
    /// outside this crate means handing it out through a [`Promise`]. Waiting
    /// on it blocks forever.
    pub fn empty() -> Self {
        Self::empty_on(default_executor())
    }

    pub(crate) fn empty_on(executor: Arc<dyn Executor>) -> Self {
        Future {
            inner: Arc::new(Inner::new(OnceLock::new())),
            executor,
        }
    }

    /// Runs `op` on the default executor and resolves with its outcome.
    pub fn spawn<F>(op: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self::spawn_on(default_executor(), op)
    }

    /// Runs `op` on `executor` and resolves with its outcome. A panic inside
    /// `op` resolves the future with [`Error::Panicked`].
    pub fn spawn_on<F>(executor: Arc<dyn Executor>, op: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let future = Self::empty_on(Arc::clone(&executor));
        let handle = future.clone();
        log::trace!("scheduling computed future");
        executor.execute(Box::new(move || handle.complete(catch(op))));
        future
    }

    /// An already resolved future.
    pub fn ready(result: Result<T>) -> Self {
        Self::ready_on(default_executor(), result)
    }

    pub fn ready_on(executor: Arc<dyn Executor>, result: Result<T>) -> Self {
        Future {
            inner: Arc::new(Inner::new(OnceLock::from(result))),
            executor,
        }
    }

    pub fn success(value: T) -> Self {
        Self::ready(Ok(value))
    }

    pub fn failure(error: Error) -> Self {
        Self::ready(Err(error))
    }

    /// The executor derived work is scheduled on.
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Whether the future has been resolved. Never blocks.
    pub fn is_completed(&self) -> bool {
        self.inner.slot.get().is_some()
    }

    /// The result, if resolved. Never blocks.
    pub fn value(&self) -> Option<&Result<T>> {
        self.inner.slot.get()
    }

    /// Blocks the calling thread until the future is resolved.
    ///
    /// Can be called any number of times, from any number of threads; once
    /// resolved every call returns straight away.
    pub fn wait(&self) -> &Self {
        if self.inner.slot.get().is_none() {
            let state = self.inner.lock();
            let _state = self
                .inner
                .resolved
                .wait_while(state, |_| self.inner.slot.get().is_none())
                .unwrap_or_else(PoisonError::into_inner);
        }
        self
    }

    fn resolved(&self) -> &Result<T> {
        match self.wait().inner.slot.get() {
            Some(result) => result,
            None => unreachable!("woke up from wait with an empty slot"),
        }
    }

    /// Waits for the result and clones it out.
    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.resolved().clone()
    }

    /// Calls `callback` with the result.
    ///
    /// On a resolved future this happens right away on the calling thread.
    /// Otherwise `callback` is queued and runs once, on whichever thread
    /// resolves the future, after the callbacks queued before it. A queued
    /// callback that panics is logged and skipped; the others still run.
    pub fn on_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        if let Some(result) = self.inner.slot.get() {
            callback(result);
            return self;
        }
        {
            let mut state = self.inner.lock();
            // The slot is only ever set under this lock.
            if self.inner.slot.get().is_none() {
                state.subscribers.push(Box::new(callback));
                return self;
            }
        }
        // Resolved between the first check and taking the lock.
        callback(self.resolved());
        self
    }

    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.on_complete(move |result| {
            if let Ok(value) = result {
                callback(value)
            }
        })
    }

    pub fn on_failure<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_complete(move |result| {
            if let Err(err) = result {
                callback(err)
            }
        })
    }

    /// Resolves the future.
    ///
    /// # Panics
    ///
    /// If the future is already resolved. Completing twice is a bug in the
    /// caller, not a recoverable condition.
    pub(crate) fn complete(&self, result: Result<T>) {
        let (subscribers, wakers) = {
            let mut state = self.inner.lock();
            if self.inner.slot.set(result).is_err() {
                drop(state);
                log::error!("attempted to complete an already resolved future");
                panic!("future already completed");
            }
            (
                mem::take(&mut state.subscribers),
                mem::take(&mut state.wakers),
            )
        };
        self.inner.resolved.notify_all();
        log::trace!(
            "future resolved, notifying {} subscribers and {} wakers",
            subscribers.len(),
            wakers.len()
        );

        let result = match self.inner.slot.get() {
            Some(result) => result,
            None => unreachable!("slot empty right after being set"),
        };
        for (_, waker) in wakers {
            waker.wake();
        }
        // A panicking subscriber must not starve the ones queued after it, nor
        // unwind into whoever is completing the future.
        for callback in subscribers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
                log::warn!("future callback panicked: {}", Error::from_panic(payload));
            }
        }
    }

    /// An [`std::future::Future`] that resolves with a clone of the result.
    pub fn waiter(&self) -> Waiter<T>
    where
        T: Clone,
    {
        Waiter::new(self.clone())
    }
}

impl<T> Future<T> {
    /// Stores `waker` under `key`, replacing what that key held before.
    ///
    /// Hands out a key on first registration. Returns `None` once the future
    /// is resolved, as there is nothing left to wait for.
    pub(crate) fn register_waker(&self, key: Option<u64>, waker: &Waker) -> Option<u64> {
        let mut state = self.inner.lock();
        if self.inner.slot.get().is_some() {
            return None;
        }
        let existing = key.and_then(|key| state.wakers.iter().position(|(k, _)| *k == key));
        match existing {
            Some(index) => {
                let registered = &mut state.wakers[index].1;
                if !registered.will_wake(waker) {
                    *registered = waker.clone();
                }
                key
            }
            None => {
                let key = key.unwrap_or_else(|| {
                    state.next_waker_key += 1;
                    state.next_waker_key
                });
                state.wakers.push((key, waker.clone()));
                Some(key)
            }
        }
    }

    /// Drops the waker stored under `key`.
    pub(crate) fn unregister_waker(&self, key: u64) {
        self.inner.lock().wakers.retain(|(k, _)| *k != key);
    }

    #[cfg(test)]
    pub(crate) fn waker_count(&self) -> usize {
        self.inner.lock().wakers.len()
    }
}

impl<T> Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Maps the resolved result through `f` on the executor.
    ///
    /// A panic in `f` resolves the new future with [`Error::Panicked`].
    pub fn transform_with<U, F>(&self, f: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let promise = Promise::with_executor(Arc::clone(&self.executor));
        let future = promise.future().clone();
        self.on_complete(move |result| {
            let result = result.clone();
            promise.complete_by(move || f(result));
        });
        future
    }

    /// Maps a success through `on_success` and an error through `on_error`.
    pub fn transform<U, S, E>(&self, on_success: S, on_error: E) -> Future<U>
    where
        U: Send + Sync + 'static,
        S: FnOnce(T) -> U + Send + 'static,
        E: FnOnce(Error) -> Error + Send + 'static,
    {
        self.transform_with(move |result| result.map(on_success).map_err(on_error))
    }

    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.transform_with(move |result| result.map(f))
    }

    /// Continues with the future `f` returns for a success.
    ///
    /// An error skips `f` and resolves the returned future with that error.
    pub fn flat_map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let promise = Promise::with_executor(Arc::clone(&self.executor));
        let future = promise.future().clone();
        self.on_complete(move |result| match result.clone() {
            Ok(value) => {
                promise.complete_with(move || f(value));
            }
            Err(err) => promise.failure(err),
        });
        future
    }

    /// Keeps a success only if `predicate` accepts it, failing with
    /// [`Error::NoSuchElement`] otherwise.
    pub fn filter<P>(&self, predicate: P) -> Future<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        self.transform_with(move |result| match result {
            Ok(value) => {
                if predicate(&value) {
                    Ok(value)
                } else {
                    Err(Error::NoSuchElement)
                }
            }
            Err(err) => Err(err),
        })
    }

    /// Turns an error into whatever `f` returns for it.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> Result<T> + Send + 'static,
    {
        self.transform_with(move |result| result.or_else(f))
    }

    /// Blocks until resolved. A success hands back this same future; an
    /// error is replaced by the future `f` returns.
    pub fn recover_with<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> Future<T>,
    {
        match self.resolved() {
            Ok(_) => self.clone(),
            Err(err) => f(err.clone()),
        }
    }

    /// Observes the result once resolved. The returned future always carries
    /// the original result, even if `side_effect` panics.
    pub fn and_then<F>(&self, side_effect: F) -> Future<T>
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        self.transform_with(move |result| {
            let observed = panic::catch_unwind(AssertUnwindSafe(|| side_effect(&result)));
            if let Err(payload) = observed {
                log::warn!("and_then side effect panicked: {}", Error::from_panic(payload));
            }
            result
        })
    }
}

impl<T> From<Result<T>> for Future<T>
where
    T: Send + Sync + 'static,
{
    fn from(result: Result<T>) -> Self {
        Future::ready(result)
    }
}

/// Blocks on both futures and compares their results.
impl<T> PartialEq for Future<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.resolved() == other.resolved()
    }
}

impl<T> IntoFuture for Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter::new(self)
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.slot.get() {
            Some(result) => f.debug_tuple("Future").field(result).finish(),
            None => f.write_str("Future(<unresolved>)"),
        }
    }
}
