//! Fixed retry policy for API operations.
//!
//! Attempts run strictly one after another with no delay between them. Any
//! error triggers a retry while attempts remain; the error of the final
//! attempt is returned.

use std::future::Future;

use crate::error::ApiError;
use crate::http::HttpMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Reads: the first attempt plus three retries.
    pub const READ: RetryPolicy = RetryPolicy { max_retries: 3 };

    /// Writes: a single attempt.
    pub const NONE: RetryPolicy = RetryPolicy { max_retries: 0 };

    /// `READ` for methods that may be repeated, `NONE` otherwise.
    pub fn for_method(method: HttpMethod) -> RetryPolicy {
        if method.is_idempotent() {
            RetryPolicy::READ
        } else {
            RetryPolicy::NONE
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut tried = 0;
        loop {
            tried += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) if tried <= self.max_retries => {
                    tracing::warn!(attempt = tried, %error, "request attempt failed, retrying");
                }
                Err(error) => return Err(error),
            }
        }
    }
}
