// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Outbound Mail
//!
//! Account letters: the confirmation letter carrying a verification link,
//! and the notice sent once an address is verified.
//!
//! ## Implementations
//!
//! - [`HttpMailer`] - posts JSON to a mail relay (`MAIL_API_URL`)
//! - [`LogMailer`] - logs the letter instead of sending it (no relay configured)
//!
//! Callers dispatch letters off the request path; see
//! [`AuthFlow`](crate::auth::AuthFlow).

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use url::Url;

pub const CONFIRMATION_SUBJECT: &str = "Account Confirmation";
pub const VERIFIED_SUBJECT: &str = "Verification Success";

/// Path the verification link points at.
pub const VERIFY_PATH: &str = "/v1/auth/verify";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, token: &str, email: &str, name: &str) -> Result<(), MailError>;

    async fn send_verified(&self, email: &str) -> Result<(), MailError>;
}

/// Rendered letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    pub subject: &'static str,
    pub html: String,
}

/// `{base}/v1/auth/verify?token={token}`
pub fn verification_link(base: &Url, token: &str) -> Result<Url, MailError> {
    let mut link = base.join(VERIFY_PATH)?;
    link.query_pairs_mut().append_pair("token", token);
    Ok(link)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn confirmation_letter(name: &str, link: &Url) -> Letter {
    Letter {
        subject: CONFIRMATION_SUBJECT,
        html: format!(
            "<p>Hello {name},</p>\
             <p>Please confirm your email address by following the link below.</p>\
             <p><a href=\"{link}\">Confirm account</a></p>",
            name = escape_html(name),
            link = escape_html(link.as_str()),
        ),
    }
}

pub fn verified_letter() -> Letter {
    Letter {
        subject: VERIFIED_SUBJECT,
        html: "<p>Your email address has been verified. Welcome aboard!</p>".to_string(),
    }
}

/// Development mailer: logs instead of sending.
pub struct LogMailer {
    base_url: Url,
}

impl LogMailer {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, token: &str, email: &str, name: &str) -> Result<(), MailError> {
        let link = verification_link(&self.base_url, token)?;
        info!(to = %email, name = %name, link = %link, subject = CONFIRMATION_SUBJECT, "Mail relay not configured, letter logged");
        Ok(())
    }

    async fn send_verified(&self, email: &str) -> Result<(), MailError> {
        info!(to = %email, subject = VERIFIED_SUBJECT, "Mail relay not configured, letter logged");
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Mailer backed by an HTTP relay accepting `{from, to, subject, html}`.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    from: String,
    base_url: Url,
}

impl HttpMailer {
    pub fn new(endpoint: Url, api_key: impl Into<String>, from: impl Into<String>, base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
            from: from.into(),
            base_url,
        }
    }

    async fn deliver(&self, to: &str, letter: &Letter) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&RelayMessage {
                from: &self.from,
                to,
                subject: letter.subject,
                html: &letter.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }
        info!(to = %to, subject = letter.subject, "Letter handed to mail relay");
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_confirmation(&self, token: &str, email: &str, name: &str) -> Result<(), MailError> {
        let link = verification_link(&self.base_url, token)?;
        self.deliver(email, &confirmation_letter(name, &link)).await
    }

    async fn send_verified(&self, email: &str) -> Result<(), MailError> {
        self.deliver(email, &verified_letter()).await
    }
}
