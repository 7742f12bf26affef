use std::{any::Any, error::Error as StdError, sync::Arc};
use thiserror::Error;

/// Failure value carried by a resolved [`Future`](crate::Future).
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Reserved for a future that can never be resolved. Nothing in this
    /// crate produces it yet.
    #[error("future was never resolved")]
    Unresolved,
    /// `filter` rejected the success value.
    #[error("no such element")]
    NoSuchElement,
    /// A closure run by the library panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    /// Wraps any error type.
    ///
    /// ```
    /// use promise_future::Error;
    /// let err = Error::new(std::fmt::Error);
    /// assert!(err.is::<std::fmt::Error>());
    /// ```
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            Error::Other(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast_ref::<&'static str>() {
                Some(message) => (*message).to_owned(),
                None => String::from("Box<dyn Any>"),
            },
        };
        Error::Panicked(message)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Unresolved, Error::Unresolved) => true,
            (Error::NoSuchElement, Error::NoSuchElement) => true,
            (Error::Panicked(a), Error::Panicked(b)) => a == b,
            (Error::Message(a), Error::Message(b)) => a == b,
            // Wrapped errors have no structural equality; the closest thing is
            // identical rendering, which distinguishes enum cases and payloads.
            (Error::Other(a), Error::Other(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.to_string() == b.to_string() && format!("{a:?}") == format!("{b:?}"))
            }
            _ => false,
        }
    }
}
