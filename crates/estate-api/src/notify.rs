//! Notification dispatch
//!
//! Composes the transactional emails and hands them to the [`Mailer`].
//! Every send is best-effort: failures are logged and never returned.

use chrono::{NaiveDate, NaiveTime};
use estate_core::{EmailMessage, MailConfig, Mailer, Property, Recipient, User};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Upper bound on listing announcements in flight at once
pub const BROADCAST_CONCURRENCY: usize = 8;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    client_url: String,
    admin_email: String,
}

/// Minimal HTML escaping for user-supplied text
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, client_url: &str, mail: &MailConfig) -> Self {
        Self {
            mailer,
            client_url: client_url.trim_end_matches('/').to_string(),
            admin_email: mail.admin_email.clone(),
        }
    }

    async fn deliver(&self, message: EmailMessage) {
        if let Err(e) = self.mailer.send(&message).await {
            tracing::warn!(
                to = %message.to_email,
                subject = %message.subject,
                error = %e,
                "Email delivery failed"
            );
        }
    }

    pub async fn verification(&self, user: &User, token: &str) {
        let link = format!("{}/verify-email/{token}", self.client_url);
        self.deliver(EmailMessage {
            to_email: user.email.clone(),
            to_name: Some(user.full_name()),
            subject: "Verify your email address".to_string(),
            html: format!(
                "<p>Hello {},</p><p>Confirm your email address to activate your account:</p>\
                 <p><a href=\"{link}\">{link}</a></p>",
                escape(&user.first_name)
            ),
        })
        .await;
    }

    pub async fn password_reset(&self, user: &User, token: &str) {
        let link = format!("{}/reset-password/{token}", self.client_url);
        self.deliver(EmailMessage {
            to_email: user.email.clone(),
            to_name: Some(user.full_name()),
            subject: "Reset your password".to_string(),
            html: format!(
                "<p>Hello {},</p><p>Use the link below to choose a new password. \
                 It expires in one hour.</p><p><a href=\"{link}\">{link}</a></p>\
                 <p>If you did not request this, ignore this email.</p>",
                escape(&user.first_name)
            ),
        })
        .await;
    }

    /// Announce a new listing to every recipient, at most
    /// [`BROADCAST_CONCURRENCY`] sends at a time
    pub async fn new_listing(&self, recipients: &[Recipient], property: &Property) {
        let link = format!("{}/properties/{}", self.client_url, property.id);
        let subject = format!("New listing: {}", property.name);

        let sends: Vec<_> = recipients.iter().map(|recipient| {
            self.deliver(EmailMessage {
                to_email: recipient.email.clone(),
                to_name: Some(recipient.name.clone()),
                subject: subject.clone(),
                html: format!(
                    "<p>Hello {},</p><p>A new {} is available in {}: <strong>{}</strong> \
                     for {:.2}.</p><p><a href=\"{link}\">View the listing</a></p>",
                    escape(&recipient.name),
                    property.property_type().as_str().to_lowercase(),
                    escape(&property.location),
                    escape(&property.name),
                    property.price
                ),
            })
        }).collect();
        stream::iter(sends)
            .buffer_unordered(BROADCAST_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;

        tracing::info!(
            property_id = %property.id,
            recipients = recipients.len(),
            "New listing broadcast sent"
        );
    }

    /// Forward a tour request to the office and confirm it to the requester
    pub async fn tour_request(
        &self,
        user: &User,
        property: &Property,
        date: NaiveDate,
        time: NaiveTime,
        message: Option<&str>,
    ) {
        let when = format!("{} at {}", date.format("%Y-%m-%d"), time.format("%H:%M"));
        let note = message
            .map(|m| format!("<p>Message: {}</p>", escape(m)))
            .unwrap_or_default();

        self.deliver(EmailMessage {
            to_email: self.admin_email.clone(),
            to_name: None,
            subject: format!("Tour request: {}", property.name),
            html: format!(
                "<p>{} ({}, {}) requested a tour of <strong>{}</strong> on {when}.</p>{note}",
                escape(&user.full_name()),
                escape(&user.email),
                escape(&user.phone),
                escape(&property.name)
            ),
        })
        .await;

        self.deliver(EmailMessage {
            to_email: user.email.clone(),
            to_name: Some(user.full_name()),
            subject: "Your tour request was received".to_string(),
            html: format!(
                "<p>Hello {},</p><p>We received your request to tour <strong>{}</strong> \
                 on {when}. We will contact you to confirm.</p>",
                escape(&user.first_name),
                escape(&property.name)
            ),
        })
        .await;
    }
}
