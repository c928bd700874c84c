//! Brevo transactional email client

use async_trait::async_trait;
use estate_core::{EmailMessage, EstateError, MailConfig, Mailer, Result};
use reqwest::Client;
use serde::Serialize;

const BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";

pub struct BrevoMailer {
    client: Client,
    api_key: String,
    sender: Contact,
}

#[derive(Debug, Clone, Serialize)]
struct Contact {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: &'a Contact,
    to: Vec<Contact>,
    subject: &'a str,
    html_content: &'a str,
}

impl BrevoMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.brevo_api_key.clone(),
            sender: Contact {
                email: config.sender_email.clone(),
                name: Some(config.sender_name.clone()),
            },
        }
    }

    fn request_body<'a>(&'a self, message: &'a EmailMessage) -> SendRequest<'a> {
        SendRequest {
            sender: &self.sender,
            to: vec![Contact {
                email: message.to_email.clone(),
                name: message.to_name.clone(),
            }],
            subject: &message.subject,
            html_content: &message.html,
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(BREVO_URL)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&self.request_body(message))
            .send()
            .await
            .map_err(|e| EstateError::Upstream(format!("Brevo request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EstateError::Upstream(format!(
                "Brevo returned {status}: {error_text}"
            )));
        }

        tracing::debug!(to = %message.to_email, subject = %message.subject, "Email sent");
        Ok(())
    }
}
