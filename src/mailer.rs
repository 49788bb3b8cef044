// src/mailer.rs
//
// Outbound email goes through an HTTP mail-relay API (JSON POST). The
// dispatcher only sees the `Mailer` trait so the relay can be swapped out.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

// Bounds each send so one slow relay call cannot stall the rest of a
// reminder batch behind it.
const SEND_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailerError>;
}

pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/messages", cfg.mail_api_url.trim_end_matches('/')),
            api_token: cfg.mail_api_token.clone(),
            from: cfg.mail_from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailerError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(SEND_TIMEOUT)
            .bearer_auth(&self.api_token)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailerError::Rejected { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub html_body: String,
    }

    /// Records every send; flips to failure mode on demand.
    #[derive(Default)]
    pub struct MockMailer {
        pub sent: Mutex<Vec<SentMail>>,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailerError::Rejected {
                    status: 502,
                    body: "relay down".into(),
                });
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::mock::MockMailer;
    use super::*;

    #[tokio::test]
    async fn mock_records_sends_in_order() {
        let mailer = MockMailer::default();
        mailer.send("a@example.com", "one", "<p>1</p>").await.unwrap();
        mailer.send("b@example.com", "two", "<p>2</p>").await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[1].subject, "two");
    }

    #[tokio::test]
    async fn mock_failure_mode_returns_error_and_records_nothing() {
        let mailer = MockMailer::default();
        mailer.fail.store(true, Ordering::SeqCst);

        let err = mailer.send("a@example.com", "x", "<p></p>").await;
        assert!(err.is_err());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
