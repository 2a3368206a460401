use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailMessage, Notifier};
use crate::config::SmtpConfig;
use crate::error::TicketError;
use crate::ticket::TicketArtifact;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends tickets through an authenticated SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| format!("SMTP relay error: {e}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| format!("SMTP starttls error: {e}"))?
        };

        let transport = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        to: &str,
        artifact: &TicketArtifact,
        message: &MailMessage,
    ) -> Result<(), TicketError> {
        let png = ContentType::parse("image/png")
            .map_err(|e| TicketError::delivery(format!("Invalid attachment type: {e}")))?;
        let attachment = Attachment::new(artifact.file_name()).body(artifact.png.clone(), png);

        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| TicketError::delivery(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| TicketError::delivery(format!("Invalid to address '{to}': {e}")))?)
            .subject(message.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| TicketError::delivery(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| TicketError::delivery(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}
