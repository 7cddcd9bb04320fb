use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

/// An outbound message handed to the notification worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub channel: Channel,
    pub kind: String,
    pub recipient: String,
    pub body: String,
    pub subject: Option<String>,
    pub metadata: serde_json::Value,
}

impl Notification {
    pub fn booking_id(&self) -> Option<&str> {
        self.metadata.get("booking_id").and_then(|v| v.as_str())
    }
}

pub const KIND_CONFIRMATION: &str = "booking_confirmation";
pub const KIND_REMINDER: &str = "reminder";
pub const KIND_CREDENTIALS: &str = "account_credentials";
