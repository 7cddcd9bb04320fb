use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::MailSender;

/// Transactional mail over a JSON HTTP API (`{from, to, subject, text}`).
pub struct HttpMailSender {
    api_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl HttpMailSender {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!self.api_url.is_empty(), "MAIL_API_URL is not configured");

        let payload = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call mail API")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("mail API error ({status}): {detail}");
        }
        Ok(())
    }
}
