//! Test doubles for handlers and injected collaborators.
//!
//! Useful in unit and integration tests where real I/O is either unavailable
//! or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{MailError, TransportError};
use crate::mailer::{EmailMessage, Mailer};
use crate::transport::{WebhookRequest, WebhookTransport};
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

/// Behaviour injected into `MockHandler` at construction time.
pub enum MockBehaviour {
    /// Succeed with a specific output.
    Return(ActionOutput),
    /// Fail with `NodeError::Rejected`.
    Reject(String),
    /// Fail with `NodeError::Failed`.
    Fail(String),
    /// Panic inside `execute`.
    Panic(String),
}

/// A handler that records every configuration it receives and returns a
/// programmer-specified result.
pub struct MockHandler {
    pub behaviour: MockBehaviour,
    /// All configurations seen by this handler (in call order).
    pub calls: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl MockHandler {
    fn with(behaviour: MockBehaviour) -> Self {
        Self { behaviour, calls: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn returning(output: ActionOutput) -> Self {
        Self::with(MockBehaviour::Return(output))
    }

    pub fn rejecting(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Reject(msg.into()))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    pub fn panicking(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Panic(msg.into()))
    }

    /// Number of times this handler has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionHandler for MockHandler {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        _ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        self.calls.lock().unwrap().push(config.clone());

        match &self.behaviour {
            MockBehaviour::Return(output) => Ok(output.clone()),
            MockBehaviour::Reject(msg) => Err(NodeError::Rejected(msg.clone())),
            MockBehaviour::Fail(msg) => Err(NodeError::Failed(msg.clone())),
            MockBehaviour::Panic(msg) => panic!("{msg}"),
        }
    }
}

enum TransportBehaviour {
    Respond(u16),
    Fail(String),
    Hang,
}

/// A [`WebhookTransport`] that records requests instead of sending them.
pub struct RecordingTransport {
    behaviour: TransportBehaviour,
    requests: Mutex<Vec<WebhookRequest>>,
}

impl RecordingTransport {
    fn with(behaviour: TransportBehaviour) -> Self {
        Self { behaviour, requests: Mutex::new(Vec::new()) }
    }

    /// Every request completes with `status`.
    pub fn responding(status: u16) -> Self {
        Self::with(TransportBehaviour::Respond(status))
    }

    /// Every request fails at the network layer with `msg`.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(TransportBehaviour::Fail(msg.into()))
    }

    /// Every request never completes.
    pub fn hanging() -> Self {
        Self::with(TransportBehaviour::Hang)
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn send(&self, request: WebhookRequest) -> Result<u16, TransportError> {
        self.requests.lock().unwrap().push(request);

        match &self.behaviour {
            TransportBehaviour::Respond(status) => Ok(*status),
            TransportBehaviour::Fail(msg) => Err(TransportError::Request(msg.clone())),
            TransportBehaviour::Hang => std::future::pending().await,
        }
    }
}

/// A [`Mailer`] that keeps sent messages in memory.
#[derive(Default)]
pub struct RecordingMailer {
    failure: Option<String>,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self { failure: Some(msg.into()), sent: Mutex::new(Vec::new()) }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
        if let Some(msg) = &self.failure {
            return Err(MailError(msg.clone()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
