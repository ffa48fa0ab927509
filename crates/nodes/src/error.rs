//! Node-level error types.

use thiserror::Error;

/// Errors returned by an action handler.
///
/// Both variants end the run with a `failed` step. The carried message is
/// what lands in the step's `error` column, so it must never contain raw
/// transport or internal error text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node's configuration was refused before any side effect
    /// (bad agent id, disallowed webhook URL, unsupported method).
    #[error("{0}")]
    Rejected(String),

    /// The side effect was attempted and did not complete.
    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    /// The caller-safe message recorded on the step.
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected(msg) | Self::Failed(msg) => msg,
        }
    }
}

/// Errors from the outbound HTTP client used by the `webhook` action.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("could not build http client: {0}")]
    Client(String),

    #[error("http request failed: {0}")]
    Request(String),

    #[error("refused to connect: {0}")]
    Blocked(String),
}

/// Errors from the injected email delivery channel.
#[derive(Debug, Error, Clone)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);
