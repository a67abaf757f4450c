//! Async API client for the tour database backend.
//!
//! # Overview
//! Builds requests for the tour backend's REST endpoints, sends them, retries
//! failed reads, and maps the JSON answers into typed records.
//!
//! # Design
//! - `TourClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`. It never touches the network.
//! - Filter, sort and projection parameters travel as a base64-encoded JSON
//!   object in a URL path segment (`blob`), which is the backend's contract.
//! - `TourDb` adds I/O through a `Transport`, the fixed `RetryPolicy` and
//!   the `ErrorHook` that logs each failure once before returning it.
//! - `TourSearch::resolve` turns loosely filled search forms into a single
//!   `TourQuery` with a fixed precedence.

pub mod blob;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod retry;
pub mod service;
pub mod transport;
pub mod types;

pub use blob::{decode_blob, encode_blob, BlobParams, OrderBy, SortDir};
pub use client::TourClient;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorHook};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{GeoFilter, TourQuery, TourSearch, ALL_COUNTRIES};
pub use retry::RetryPolicy;
pub use service::TourDb;
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    ActivityType, Comment, Country, Location, LocationType, NewComment, Region, Tour, TourRaw,
};
