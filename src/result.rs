use crate::Error;
use std::panic::{self, AssertUnwindSafe};

/// The payload of a resolved [`Future`](crate::Future).
///
/// `map` and `and_then` come from [`std::result::Result`]; [`ResultExt`] adds
/// the borrowed accessors and chaining side effects.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub trait ResultExt<T> {
    /// The success value, if any.
    fn success(&self) -> Option<&T>;

    /// The error, if any.
    fn failure(&self) -> Option<&Error>;

    /// Runs `f` on a success value and hands `self` back unchanged.
    fn if_success<F>(self, f: F) -> Self
    where
        F: FnOnce(&T);

    /// Runs `f` on an error and hands `self` back unchanged.
    fn if_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(&Error);
}

impl<T> ResultExt<T> for Result<T> {
    fn success(&self) -> Option<&T> {
        self.as_ref().ok()
    }

    fn failure(&self) -> Option<&Error> {
        self.as_ref().err()
    }

    fn if_success<F>(self, f: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let Ok(value) = &self {
            f(value);
        }
        self
    }

    fn if_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(&Error),
    {
        if let Err(err) = &self {
            f(err);
        }
        self
    }
}

/// Runs `f`, turning a panic into [`Error::Panicked`].
pub(crate) fn catch<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let err = Error::from_panic(payload);
            log::warn!("captured panic from user closure: {err}");
            Err(err)
        }
    }
}
