//! Built-in action handlers, one per action type.

mod agent;
mod email;
mod message;
mod wait;
mod webhook;

pub use agent::RunAgentAction;
pub use email::SendEmailAction;
pub use message::SendMessageAction;
pub use wait::WaitAction;
pub use webhook::WebhookAction;

/// Longest message or email body kept, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;
/// Longest email recipient kept, in characters.
pub const MAX_EMAIL_TO_CHARS: usize = 255;
/// Longest email subject kept, in characters.
pub const MAX_EMAIL_SUBJECT_CHARS: usize = 500;
