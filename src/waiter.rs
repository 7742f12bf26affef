use crate::{Future, Result};
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// Awaits a [`Future`] from async code. Any number of waiters may exist for
/// the same future, each yields a clone of the result.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use promise_future::Promise;
/// use std::thread;
///
/// let promise = Promise::<String>::new();
/// let consumer = promise.future().clone();
/// let consumer2 = consumer.clone();
/// let task1 = thread::spawn(move || block_on(async { consumer.await }));
/// let task2 = thread::spawn(move || block_on(consumer2.waiter()));
/// promise.success("Hi".into());
/// assert_eq!(task1.join().expect("The task1 thread has panicked."), Ok("Hi".into()));
/// assert_eq!(task2.join().expect("The task2 thread has panicked."), Ok("Hi".into()));
/// ```
///
/// Dropping a pending waiter removes its waker from the future.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Waiter<T> {
    future: Future<T>,
    key: Option<u64>,
}

impl<T> Waiter<T> {
    pub(crate) fn new(future: Future<T>) -> Self {
        Waiter { future, key: None }
    }
}

impl<T> Clone for Waiter<T> {
    fn clone(&self) -> Self {
        Waiter::new(self.future.clone())
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.future.unregister_waker(key);
        }
    }
}

impl<T> std::future::Future for Waiter<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.future.value() {
            return Poll::Ready(result.clone());
        }
        match this.future.register_waker(this.key, cx.waker()) {
            Some(key) => {
                this.key = Some(key);
                Poll::Pending
            }
            None => Poll::Ready(this.future.get()),
        }
    }
}
