use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::MailConfig;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// The verification email as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEmail {
    pub to: String,
    pub display_name: String,
    pub code: String,
}

impl VerificationEmail {
    pub fn subject(&self) -> &'static str {
        "Your verification code"
    }

    pub fn text(&self) -> String {
        format!(
            "Hi {name},\n\n\
             Use the following code to complete your verification. \
             This code is valid for 10 minutes.\n\n\
             {code}\n\n\
             If you didn't request this code, you can safely ignore this email.\n",
            name = self.display_name,
            code = self.code,
        )
    }

    pub fn html(&self) -> String {
        format!(
            "<html><body style=\"font-family: Arial, sans-serif\">\
             <h2>OTP Verification</h2>\
             <p>Hi {name},</p>\
             <p>Use the following code to complete your verification. \
             This code is valid for 10 minutes.</p>\
             <p style=\"font-size: 28px; font-weight: bold; letter-spacing: 4px\">{code}</p>\
             <p style=\"color: #888\">If you didn't request this code, you can safely ignore this email.</p>\
             </body></html>",
            name = escape_html(&self.display_name),
            code = escape_html(&self.code),
        )
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &VerificationEmail) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct ResendBody<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: String,
    text: String,
}

/// Sends mail through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    base_url: String,
}

impl ResendMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            base_url: RESEND_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_verification(&self, email: &VerificationEmail) -> anyhow::Result<()> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("email delivery is not configured");
        };

        let body = ResendBody {
            from: &self.from,
            to: vec![email.to.as_str()],
            subject: email.subject(),
            html: email.html(),
            text: email.text(),
        };

        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("resend request")?;

        let status = resp.status();
        if status.is_success() {
            debug!(%status, "verification email accepted");
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("resend send failed (status={status}): {text}")
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every email; fails every send when `failing` is set.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<VerificationEmail>>,
        pub failing: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub async fn last(&self) -> Option<VerificationEmail> {
            self.sent.lock().await.last().cloned()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification(&self, email: &VerificationEmail) -> anyhow::Result<()> {
            if self.failing {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().await.push(email.clone());
            Ok(())
        }
    }
}
