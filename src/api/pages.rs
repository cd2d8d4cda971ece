use std::collections::VecDeque;

use futures_util::Stream;
use tracing::info;

use super::ApiClient;
use crate::error::ExternalServiceError;
use crate::http::{Record, Request, Transport};

/// Query parameter carrying the 1-based page number.
const PAGE_PARAM: &str = "_page";

/// Query parameter carrying the page size.
const LIMIT_PARAM: &str = "_limit";

/// Position of a pagination sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    page_size: usize,
}

impl PageCursor {
    /// Starts at page 1.
    pub fn new(page_size: usize) -> Self {
        Self { page: 1, page_size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Builds the request for the current page.
    pub fn request(&self, endpoint: &str) -> Request {
        Request::new(endpoint)
            .with_query(PAGE_PARAM, self.page)
            .with_query(LIMIT_PARAM, self.page_size)
    }

    fn advance(&mut self) {
        self.page += 1;
    }
}

/// Forward-only sequence of records produced page by page.
///
/// Pages are requested only when the consumer pulls past the records already
/// buffered. The sequence ends at the first empty page; a page shorter than the
/// page size is ordinary data. Once a fetch fails, the error is returned from
/// the pull that triggered it and the sequence is finished.
pub struct RecordStream<'a, T: Transport> {
    client: &'a ApiClient<T>,
    cursor: PageCursor,
    buffer: VecDeque<Record>,
    pages_fetched: u32,
    records_yielded: usize,
    finished: bool,
}

impl<'a, T: Transport> RecordStream<'a, T> {
    pub(super) fn new(client: &'a ApiClient<T>, cursor: PageCursor) -> Self {
        Self {
            client,
            cursor,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            records_yielded: 0,
            finished: false,
        }
    }

    /// Pulls the next record, fetching the next page if the buffer is drained.
    ///
    /// Returns `Ok(None)` once the sequence has ended.
    pub async fn try_next(&mut self) -> Result<Option<Record>, ExternalServiceError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.records_yielded += 1;
                return Ok(Some(record));
            }

            if self.finished {
                return Ok(None);
            }

            let page = match self.client.fetch_page(&self.cursor).await {
                Ok(page) => page,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };
            self.pages_fetched += 1;

            if page.is_empty() {
                self.finished = true;
                self.client.span.in_scope(|| {
                    info!(
                        "Pagination complete: {} records from {} pages",
                        self.records_yielded,
                        self.pages_fetched - 1
                    )
                });
                return Ok(None);
            }

            self.buffer.extend(page);
            self.cursor.advance();
        }
    }

    /// Page number the next request will ask for.
    pub fn page(&self) -> u32 {
        self.cursor.page()
    }

    /// Number of page requests that completed successfully, including the final empty one.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn records_yielded(&self) -> usize {
        self.records_yielded
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }

    /// Adapts this sequence into a [`Stream`].
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, ExternalServiceError>> + 'a {
        futures_util::stream::try_unfold(self, |mut records| async move {
            Ok::<_, ExternalServiceError>(
                records.try_next().await?.map(|record| (record, records)),
            )
        })
    }
}
