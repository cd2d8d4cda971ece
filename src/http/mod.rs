//! HTTP transport, fault classification and retry logic.

mod client;
mod retry;
mod transport;

pub use client::{CONNECT_TIMEOUT_MS, READ_TIMEOUT_MS, ReqwestTransport};
pub use retry::{
    Classification, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, RetryPolicy, RetryState,
    classify, execute_with_retry,
};
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{AttemptOutcome, Record, Request, Transport};
