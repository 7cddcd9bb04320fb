pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the payment provider reports for a previously captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub status: String,
    pub amount_cents: i64,
}

impl PaymentConfirmation {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, reference: &str) -> anyhow::Result<PaymentConfirmation>;
    async fn refund(&self, reference: &str) -> anyhow::Result<()>;
}
