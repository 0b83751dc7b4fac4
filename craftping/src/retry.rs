//! Re-running an operation that may fail transiently.

use std::future::Future;

use tracing::warn;

use crate::Error;

/// Runs an operation up to `tries` times, returning the first success or the
/// error of the final attempt.
///
/// By default every error is retried. [`Retry::retry_on`] narrows that down;
/// an error the predicate rejects is returned immediately.
///
/// ```
/// use craftping::{Error, Retry};
///
/// let mut attempts = 0;
/// let value = Retry::new(3)?.run(|| {
///     attempts += 1;
///     if attempts < 3 { Err(Error::TimedOut) } else { Ok(attempts) }
/// })?;
/// assert_eq!(value, 3);
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Retry<F = fn(&Error) -> bool> {
    tries: usize,
    retry_on: F,
}

const fn any_error(_: &Error) -> bool {
    true
}

impl Retry {
    /// # Errors
    /// If `tries` is zero.
    pub fn new(tries: usize) -> Result<Self, Error> {
        if tries < 1 {
            return Err(Error::InvalidValue(format!(
                "tries must be at least 1, got {tries}"
            )));
        }
        Ok(Self {
            tries,
            retry_on: any_error,
        })
    }
}

impl<F: Fn(&Error) -> bool> Retry<F> {
    /// Only retry errors matching `predicate`.
    #[must_use]
    pub fn retry_on<G: Fn(&Error) -> bool>(self, predicate: G) -> Retry<G> {
        Retry {
            tries: self.tries,
            retry_on: predicate,
        }
    }

    #[must_use]
    pub const fn tries(&self) -> usize {
        self.tries
    }

    /// Whether `attempt` (zero based) failing with `err` warrants another go.
    fn should_retry(&self, attempt: usize, err: &Error) -> bool {
        if attempt + 1 >= self.tries || !(self.retry_on)(err) {
            return false;
        }
        warn!(attempt = attempt + 1, tries = self.tries, error = %err, "attempt failed, retrying");
        true
    }

    /// # Errors
    /// The error of the last attempt, or the first error not matching the
    /// retry predicate.
    pub fn run<T>(&self, mut operation: impl FnMut() -> Result<T, Error>) -> Result<T, Error> {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(attempt, &err) => attempt += 1,
                Err(err) => return Err(err),
            }
        }
    }

    /// Like [`Retry::run`], awaiting a fresh future for each attempt.
    ///
    /// # Errors
    /// The error of the last attempt, or the first error not matching the
    /// retry predicate.
    pub async fn run_async<T, Fut>(&self, mut operation: impl FnMut() -> Fut) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(attempt, &err) => attempt += 1,
                Err(err) => return Err(err),
            }
        }
    }
}
