use serde::{Deserialize, Serialize};

/// Contact snapshot for one resolved recipient, taken at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientAddress {
    pub customer_id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// The rendered-template payload handed to a channel sender. Subject and
/// body may contain Tera placeholders resolved per recipient.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
}

/// Per-recipient result of one transport call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub customer_id: i32,
    pub email: String,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn ok(recipient: &RecipientAddress) -> Self {
        DeliveryOutcome {
            customer_id: recipient.customer_id,
            email: recipient.email.clone(),
            error: None,
        }
    }

    pub fn failed(recipient: &RecipientAddress, error: String) -> Self {
        DeliveryOutcome {
            customer_id: recipient.customer_id,
            email: recipient.email.clone(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
