use async_trait::async_trait;

use crate::error::Fault;

/// One element of a collection returned by the remote API. Passed through untouched.
pub type Record = serde_json::Value;

/// Result of a single HTTP attempt.
pub type AttemptOutcome = Result<Vec<Record>, Fault>;

/// A GET request against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Looks up a query parameter by name.
    #[cfg(test)]
    pub(crate) fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP GET capability used by the fetch engine.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &Request) -> AttemptOutcome;
}
