//! Error types for the tour API client.
//!
//! # Design
//! Callers see one failure category: the request did not produce a usable
//! result. The variants only carry diagnostic detail; retry and reporting
//! treat them all the same way.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors returned by `TourClient` and `TourDb` operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

type Sink = dyn Fn(&ApiError) + Send + Sync;

/// Side effect run once for every failed operation before the error is
/// handed back to the caller.
///
/// `report` never alters or swallows the error. The default hook emits a
/// `tracing` error event; tests install their own sink to observe calls.
#[derive(Clone)]
pub struct ErrorHook {
    sink: Arc<Sink>,
}

impl ErrorHook {
    pub fn new(sink: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Run the side effect and pass the error through unchanged.
    pub fn report(&self, error: ApiError) -> ApiError {
        (self.sink)(&error);
        error
    }
}

impl Default for ErrorHook {
    fn default() -> Self {
        Self::new(|error| tracing::error!(%error, "tour api request failed"))
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHook").finish_non_exhaustive()
    }
}
