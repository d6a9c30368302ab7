//! # Outbound Mail Capability
//!
//! The core needs exactly one thing from the mail world: "deliver this
//! HTML body to this address, tell me if it worked". IMAP/SMTP session
//! handling, MIME assembly, and retry queues are external collaborators —
//! this trait is the seam they plug into.

use async_trait::async_trait;

use crate::error::AuthorityError;

/// Something that can deliver a message to an email address.
///
/// Implementations must be cancel-safe: the registration protocol wraps
/// every call in a bounded timeout and treats a timeout as a transport
/// failure.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AuthorityError>;
}

/// A mailer that logs instead of sending. For development and demos —
/// the one-time code shows up in the authority's log stream.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AuthorityError> {
        tracing::info!(
            to = address,
            subject = subject,
            body_len = html_body.len(),
            "mail delivery (log-only mailer)"
        );
        tracing::debug!(body = html_body, "mail body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        assert!(mailer
            .send("alice@example.com", "Your code", "<b>482913</b>")
            .await
            .is_ok());
    }
}
