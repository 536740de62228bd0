use anyhow::Context;
use async_trait::async_trait;

use super::{EmailMessage, Mailer};

pub struct ResendMailer {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [message.to],
                "subject": message.subject,
                "text": message.body,
            }))
            .send()
            .await
            .context("failed to send email")?
            .error_for_status()
            .context("email API returned error")?;

        Ok(())
    }
}
