//! Fetch operations against the configured collection endpoint.
//!
//! - [`ApiClient::fetch_all`] fetches the unpaged collection in one request.
//! - [`ApiClient::fetch_pages`] returns a [`RecordStream`] that requests pages
//!   on demand until the server answers with an empty page.
//!
//! Every request goes through [`execute_with_retry`], so transient faults are
//! retried within a single request; there is no retry across page boundaries.

mod pages;

use anyhow::{Result, ensure};
use tracing::{Instrument, Span, info, info_span};

use crate::config::ApiConfig;
use crate::error::ExternalServiceError;
use crate::http::{Record, ReqwestTransport, Request, RetryPolicy, Transport, execute_with_retry};

pub use pages::{PageCursor, RecordStream};

/// Client for one paginated collection endpoint.
pub struct ApiClient<T: Transport = ReqwestTransport> {
    transport: T,
    endpoint: String,
    policy: RetryPolicy,
    span: Span,
}

impl ApiClient<ReqwestTransport> {
    /// Builds a client with a reqwest transport configured from `config`.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::with_timeouts(config.connect_timeout(), config.read_timeout())?;
        Ok(Self::new(transport, config.endpoint(), config.retry_policy()))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, endpoint: impl Into<String>, policy: RetryPolicy) -> Self {
        let endpoint = endpoint.into();
        let span = info_span!("api_client", endpoint = %endpoint);
        Self {
            transport,
            endpoint,
            policy,
            span,
        }
    }

    /// Replaces the span all log events of this client are emitted in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches the whole collection with a single unpaged request.
    pub async fn fetch_all(&self) -> Result<Vec<Record>, ExternalServiceError> {
        let request = Request::new(self.endpoint.as_str());

        async {
            info!("Fetching collection from {}", self.endpoint);

            let records = execute_with_retry("Fetch collection", &self.policy, || {
                self.transport.get(&request)
            })
            .await?;

            info!("Fetched {} records", records.len());
            Ok::<_, ExternalServiceError>(records)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Returns a lazy stream over the collection, `page_size` records per request.
    ///
    /// No request is made until the first record is pulled.
    pub fn fetch_pages(&self, page_size: usize) -> Result<RecordStream<'_, T>> {
        ensure!(page_size > 0, "Page size must be greater than zero");

        self.span.in_scope(|| {
            info!(
                "Starting paginated fetch from {} ({} records per page)",
                self.endpoint, page_size
            )
        });

        Ok(RecordStream::new(self, PageCursor::new(page_size)))
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Vec<Record>, ExternalServiceError> {
        let request = cursor.request(&self.endpoint);
        let operation = format!("Fetch page {}", cursor.page());

        async {
            let records = execute_with_retry(&operation, &self.policy, || {
                self.transport.get(&request)
            })
            .await?;

            info!(
                page = cursor.page(),
                count = records.len(),
                "Fetched page {} ({} records)",
                cursor.page(),
                records.len()
            );
            Ok::<_, ExternalServiceError>(records)
        }
        .instrument(self.span.clone())
        .await
    }
}
