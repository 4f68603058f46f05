//! Emails the download link to the recipient once a transfer is stored

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpSettings;

/// Everything the notification needs to know about a stored transfer
pub struct TransferNotification<'a> {
    pub transfer_id: &'a str,
    pub recipient_email: &'a str,
    pub sender_email: &'a str,
    pub file_count: usize,
    pub public_url: &'a str,
}

/// Build the download link for a transfer
pub fn download_link(public_url: &str, transfer_id: &str) -> String {
    format!("{}/download/{}", public_url.trim_end_matches('/'), transfer_id)
}

/// Send the download-link email. Failures here never fail the upload itself;
/// the caller reports them as a warning.
pub async fn send_download_link(smtp: &SmtpSettings, notification: &TransferNotification<'_>) -> Result<()> {
    let from: Mailbox = smtp
        .sender_email
        .parse()
        .with_context(|| format!("Invalid SMTP sender address: {}", smtp.sender_email))?;
    let to: Mailbox = notification
        .recipient_email
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", notification.recipient_email))?;

    let link = download_link(notification.public_url, notification.transfer_id);
    let plural = if notification.file_count > 1 { "s" } else { "" };
    let body = format!(
        "{sender} sent you {count} file{plural} via iTransfer.\n\n\
         Download link: {link}\n",
        sender = notification.sender_email,
        count = notification.file_count,
    );

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(format!("Your file{} are ready to download", plural));
    if let Ok(reply_to) = notification.sender_email.parse::<Mailbox>() {
        builder = builder.reply_to(reply_to);
    }
    let email = builder.body(body).context("Failed to build notification email")?;

    let transport = build_transport(smtp)?;
    transport
        .send(email)
        .await
        .context("SMTP delivery failed")?;

    Ok(())
}

fn build_transport(smtp: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    if smtp.user.is_empty() {
        // Unauthenticated relay, e.g. a local MTA on port 25
        Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.server)
            .port(smtp.port)
            .build())
    } else {
        let relay = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)
            .with_context(|| format!("Failed to configure SMTP relay for {}", smtp.server))?;
        Ok(relay
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_link_building() {
        assert_eq!(
            download_link("http://localhost:5500/", "abc-123"),
            "http://localhost:5500/download/abc-123"
        );
        assert_eq!(
            download_link("https://files.example.com", "t1"),
            "https://files.example.com/download/t1"
        );
    }
}
