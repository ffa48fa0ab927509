//! `nodes` crate — everything an action node can do.
//!
//! Every action type, built-in or registered, implements
//! [`ActionHandler`]. The engine dispatches through [`ActionDispatcher`] and
//! never performs I/O itself: outbound HTTP and email go through the injected
//! [`WebhookTransport`] and [`Mailer`], and every URL from node configuration
//! passes [`url_guard::check_url`] first.

pub mod builtin;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mailer;
pub mod mock;
pub mod output;
pub mod traits;
pub mod transport;
pub mod url_guard;

pub use dispatcher::{ActionDispatcher, ActionLimits};
pub use error::{MailError, NodeError, TransportError};
pub use mailer::{EmailMessage, LogMailer, Mailer};
pub use output::ActionOutput;
pub use traits::{ActionContext, ActionHandler};
pub use transport::{HttpMethod, ReqwestTransport, WebhookRequest, WebhookTransport};
