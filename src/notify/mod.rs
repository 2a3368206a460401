pub mod smtp;
pub mod template;

use async_trait::async_trait;

use crate::error::TicketError;
use crate::ticket::TicketArtifact;

pub use smtp::SmtpNotifier;
pub use template::MessageTemplate;

/// A rendered email, ready to go out with a ticket attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// Delivers a ticket to a registrant.
///
/// One call is one delivery attempt; implementations do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to: &str,
        artifact: &TicketArtifact,
        message: &MailMessage,
    ) -> Result<(), TicketError>;
}

/// Stand-in used when no mail credentials are configured. Every send fails.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(
        &self,
        _to: &str,
        _artifact: &TicketArtifact,
        _message: &MailMessage,
    ) -> Result<(), TicketError> {
        Err(TicketError::delivery(
            "mail transport is not configured (set MAIL_USER and MAIL_PASS)",
        ))
    }
}
