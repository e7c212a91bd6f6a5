//! Outgoing mail over SMTP
//!
//! The transport is built per send from the effective Gmail settings, so
//! credentials changed in the admin dashboard apply without a restart.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, debug};
use crate::models::GmailSettings;
use crate::services::settings::SettingsService;
use crate::utils::errors::{EmailError, Result};

/// File attached to an outgoing message
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct EmailService {
    settings: SettingsService,
}

fn mailbox(name: Option<&str>, address: &str) -> std::result::Result<Mailbox, EmailError> {
    let address: Address = address
        .trim()
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_string()))?;
    Ok(Mailbox::new(name.filter(|n| !n.is_empty()).map(str::to_string), address))
}

/// Assemble a plain-text message with an optional attachment
pub fn build_message(
    settings: &GmailSettings,
    to_name: &str,
    to_address: &str,
    subject: &str,
    body: &str,
    attachment: Option<EmailAttachment>,
) -> std::result::Result<Message, EmailError> {
    let sender = if settings.from_address.is_empty() { &settings.username } else { &settings.from_address };
    let from = mailbox(Some(&settings.from_name), sender)?;
    let to = mailbox(Some(to_name), to_address)?;

    let builder = Message::builder().from(from).to(to).subject(subject);

    let message = match attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| EmailError::Build(e.to_string()))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body.to_string()))
                    .singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type)),
            )
        }
        None => builder.header(ContentType::TEXT_PLAIN).body(body.to_string()),
    };

    message.map_err(|e| EmailError::Build(e.to_string()))
}

impl EmailService {
    pub fn new(settings: SettingsService) -> Self {
        Self { settings }
    }

    async fn configured(&self) -> Result<GmailSettings> {
        let settings = self.settings.gmail_settings().await?;
        if !settings.is_complete() {
            return Err(EmailError::NotConfigured(
                "SMTP host, username and password are required".to_string()
            ).into());
        }
        Ok(settings)
    }

    fn transport(settings: &GmailSettings) -> std::result::Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .credentials(credentials)
            .build();

        Ok(mailer)
    }

    /// Send a message, optionally with one attachment
    pub async fn send(
        &self,
        to_name: &str,
        to_address: &str,
        subject: &str,
        body: &str,
        attachment: Option<EmailAttachment>,
    ) -> Result<()> {
        let settings = self.configured().await?;
        let message = build_message(&settings, to_name, to_address, subject, body, attachment)?;
        let mailer = Self::transport(&settings)?;

        debug!(to = %to_address, subject = %subject, "Sending email");
        mailer.send(message).await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        info!(to = %to_address, "Email sent");
        Ok(())
    }

    pub async fn send_with_attachment(
        &self,
        to_name: &str,
        to_address: &str,
        subject: &str,
        body: &str,
        attachment: EmailAttachment,
    ) -> Result<()> {
        self.send(to_name, to_address, subject, body, Some(attachment)).await
    }

    /// Check that the SMTP server accepts the configured credentials
    pub async fn test_connection(&self) -> Result<bool> {
        let settings = self.configured().await?;
        let mailer = Self::transport(&settings)?;

        let ok = mailer.test_connection().await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GmailSettings {
        GmailSettings {
            smtp_host: "smtp.gmail.com".to_string(),
            username: "certs@maabara.online".to_string(),
            password: "app-password".to_string(),
            from_address: String::new(),
            from_name: "Maabara Online".to_string(),
        }
    }

    #[test]
    fn test_message_with_attachment() {
        let attachment = EmailAttachment {
            filename: "CERT-2025-ABCDEFGH.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.3".to_vec(),
        };
        let message = build_message(&settings(), "Achieng Otieno", "achieng@example.com", "Your certificate", "Attached.", Some(attachment)).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("<certs@maabara.online>"));
        assert!(raw.contains("Maabara Online"));
        assert!(raw.contains("CERT-2025-ABCDEFGH.pdf"));
        assert!(raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let err = build_message(&settings(), "Nobody", "not-an-email", "Hi", "Body", None).unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(_)));
    }
}
