use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

// --- Mailer trait ---

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

pub fn create_mailer(config: &MailConfig) -> Result<Box<dyn Mailer>> {
    match config.transport {
        MailTransport::Log => Ok(Box::new(LogMailer)),
        MailTransport::Relay => {
            let url = config
                .relay_url
                .clone()
                .ok_or_else(|| anyhow!("mail.relay_url is required for the relay transport"))?;
            Ok(Box::new(RelayMailer::new(url, config.relay_api_key.clone())))
        }
    }
}

pub fn confirmation_mail(from: &str, to: &str, code: &str, ttl_hours: i64) -> OutgoingMail {
    OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Confirm Your Email for TeamKonekt".to_string(),
        text: format!(
            "Your confirmation code is: {}\n\nThis code will expire in {} hours.",
            code, ttl_hours
        ),
    }
}

// --- Log mailer ---

/// Development transport: the message only goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "Outgoing mail (log transport)"
        );
        tracing::debug!(to = %mail.to, body = %mail.text, "Outgoing mail body");
        Ok(())
    }
}

// --- HTTP relay mailer ---

pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl RelayMailer {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(std::time::Duration::from_secs(15))
            .json(mail);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach mail relay")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mail relay returned {}: {}", status, body));
        }
        Ok(())
    }
}
