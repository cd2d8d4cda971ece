//! Resilient client for a paginated JSON read API.
//!
//! Transient faults (network errors, HTTP 5xx, 429) are retried with capped
//! exponential backoff; client errors fail immediately. Collections can be
//! fetched in one request or streamed page by page.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;

pub use api::{ApiClient, PageCursor, RecordStream};
pub use error::{ExternalServiceError, Fault, FaultKind};
