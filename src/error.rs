//! Fault taxonomy shared by the transport, the retry loop and the fetch API.

use std::fmt;

/// A single failed HTTP attempt, as reported by a [`Transport`](crate::http::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// No response was obtained: connection refused, DNS failure, timeout.
    Network(String),
    /// The server answered with a non-success status code.
    Status(u16),
    /// Any other transport-level failure (e.g. an undecodable body).
    Other(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Network(msg) => write!(f, "network error: {}", msg),
            Fault::Status(code) => write!(f, "HTTP {} error", code),
            Fault::Other(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for Fault {}

/// Category a [`Fault`] falls into once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Failure before any response was obtained. Always retryable.
    Transport,
    /// HTTP 5xx or 429. Retryable.
    Server,
    /// HTTP 4xx other than 429. Retrying cannot help.
    Client,
}

impl FaultKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, FaultKind::Client)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Transport => write!(f, "transport fault"),
            FaultKind::Server => write!(f, "server fault"),
            FaultKind::Client => write!(f, "client fault"),
        }
    }
}

/// Terminal failure of a fetch operation.
///
/// Either the last fault was rejected outright (a client fault), or a
/// retryable fault persisted until the attempt ceiling was reached.
#[derive(Debug, Clone)]
pub struct ExternalServiceError {
    operation: String,
    cause: Fault,
    kind: FaultKind,
    attempts: u32,
    exhausted: bool,
}

impl ExternalServiceError {
    pub(crate) fn rejected(operation: &str, cause: Fault, kind: FaultKind, attempts: u32) -> Self {
        Self {
            operation: operation.to_string(),
            cause,
            kind,
            attempts,
            exhausted: false,
        }
    }

    pub(crate) fn exhausted(operation: &str, cause: Fault, kind: FaultKind, attempts: u32) -> Self {
        Self {
            operation: operation.to_string(),
            cause,
            kind,
            attempts,
            exhausted: true,
        }
    }

    /// Name of the operation that failed.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The fault returned by the last attempt.
    pub fn cause(&self) -> &Fault {
        &self.cause
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Whether the underlying fault was of a retryable kind.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// True when a retryable fault outlasted the attempt ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// HTTP status of the last attempt, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self.cause {
            Fault::Status(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ExternalServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exhausted {
            write!(
                f,
                "{}: external service still failing after {} attempts ({}): {}",
                self.operation, self.attempts, self.kind, self.cause
            )
        } else {
            write!(
                f,
                "{}: request rejected by external service ({}): {}",
                self.operation, self.kind, self.cause
            )
        }
    }
}

impl std::error::Error for ExternalServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
