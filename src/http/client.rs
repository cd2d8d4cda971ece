//! reqwest-backed transport performing one GET attempt per call.

use std::error::Error as _;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::transport::{AttemptOutcome, Record, Request, Transport};
use crate::error::Fault;

/// Default time allowed to establish a connection, in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 3000;

/// Default time allowed between reads of the response, in milliseconds.
pub const READ_TIMEOUT_MS: u64 = 5000;

const USER_AGENT: &str = concat!("pagefetch/", env!("CARGO_PKG_VERSION"));

/// HTTP transport over a shared reqwest Client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a new transport wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with independent connect and read timeouts.
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    async fn get(&self, request: &Request) -> AttemptOutcome {
        debug!("GET JSON from {} with query {:?}...", request.url, request.query);

        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(to_fault)?;

        let response = response.error_for_status().map_err(to_fault)?;

        response.json::<Vec<Record>>().await.map_err(to_fault)
    }
}

/// Maps a reqwest error onto the fault taxonomy.
fn to_fault(error: reqwest::Error) -> Fault {
    if let Some(status) = error.status() {
        return Fault::Status(status.as_u16());
    }

    if error.is_timeout() || error.is_connect() {
        return Fault::Network(error_chain(&error));
    }

    Fault::Other(error_chain(&error))
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
