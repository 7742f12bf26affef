//! Write-once futures and promises for threaded code.
//!
//! A [`Future`] holds a [`Result`] that becomes available exactly once. It can
//! be read without blocking, waited on, subscribed to, or `.await`ed, and it
//! composes through `map`, `flat_map`, `filter`, `recover` and friends. A
//! [`Promise`] is the side that supplies the result.
//!
//! Work that produces results runs on an [`Executor`]. Unless one is given
//! explicitly, the process-wide [`executor::default_executor`] is used, a
//! thread pool from the [`futures`] crate that spills onto extra threads when
//! all of its workers are blocked.
//!
//! ```
//! use promise_future::{Error, Future, Promise};
//!
//! let promise = Promise::new();
//! let doubled = promise.future().map(|v: i32| v * 2);
//! let recovered = Future::<i32>::failure(Error::msg("offline")).recover(|_| Ok(0));
//!
//! promise.success(21);
//! assert_eq!(doubled.get(), Ok(42));
//! assert_eq!(recovered.get(), Ok(0));
//! ```

mod error;
pub mod executor;
mod future;
mod promise;
mod result;
mod waiter;

pub use error::Error;
pub use executor::Executor;
pub use future::Future;
pub use promise::Promise;
pub use result::{Result, ResultExt};
pub use waiter::Waiter;
