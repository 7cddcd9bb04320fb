use anyhow::Context;
use async_trait::async_trait;

use super::{PaymentConfirmation, PaymentGateway};

pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn confirm(&self, reference: &str) -> anyhow::Result<PaymentConfirmation> {
        anyhow::ensure!(!self.secret_key.is_empty(), "STRIPE_SECRET_KEY is not configured");

        let url = format!("{}/v1/payment_intents/{}", self.api_base, reference);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call Stripe API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Stripe response")?;

        if !status.is_success() {
            anyhow::bail!("Stripe API error ({}): {}", status, data["error"]["message"]);
        }

        let payment_status = data["status"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing status in Stripe response"))?;
        let amount = data["amount_received"]
            .as_i64()
            .or_else(|| data["amount"].as_i64())
            .unwrap_or(0);

        Ok(PaymentConfirmation {
            status: payment_status.to_string(),
            amount_cents: amount,
        })
    }

    async fn refund(&self, reference: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret_key.is_empty(), "STRIPE_SECRET_KEY is not configured");

        let url = format!("{}/v1/refunds", self.api_base);
        self.client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[("payment_intent", reference)])
            .send()
            .await
            .context("failed to call Stripe refund API")?
            .error_for_status()
            .context("Stripe refund returned error")?;

        tracing::info!(reference, "refund issued");
        Ok(())
    }
}
