use async_trait::async_trait;
use serde::Serialize;

use crate::config::PushSettings;
use crate::notifications::models::{DeliveryOutcome, OutgoingMessage, RecipientAddress};

use super::{ChannelSender, SenderError, HTTP_CLIENT};

/// Browser-style push delivery through a gateway. Mirrors the permission
/// model of native notifications: an unconfigured gateway is the "denied or
/// unsupported" case and fails loudly instead of silently dropping the
/// message. Push is not a fan-out mechanism; it delivers to one recipient.
pub struct PushSender {
    settings: Option<PushSettings>,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl PushSender {
    pub fn new(settings: Option<PushSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ChannelSender for PushSender {
    async fn send(
        &self,
        message: &OutgoingMessage,
        recipients: &[RecipientAddress],
    ) -> Result<Vec<DeliveryOutcome>, SenderError> {
        let Some(settings) = &self.settings else {
            return Err(SenderError::Unsupported(
                "push gateway not configured (permission denied or unsupported)".to_owned(),
            ));
        };
        let [recipient] = recipients else {
            return Err(SenderError::Unsupported(
                "push delivers to exactly one recipient".to_owned(),
            ));
        };

        let payload = PushPayload {
            title: &message.subject,
            body: &message.body,
            icon: settings.icon_url.as_deref(),
            url: settings.click_url.as_deref(),
        };
        let response = HTTP_CLIENT
            .post(&settings.gateway_url)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "push gateway returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(vec![DeliveryOutcome::ok(recipient)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(id: i32) -> RecipientAddress {
        RecipientAddress {
            customer_id: id,
            name: "Cliente".to_owned(),
            email: "c@example.com".to_owned(),
            phone: None,
        }
    }

    fn message() -> OutgoingMessage {
        OutgoingMessage {
            subject: "Hola".to_owned(),
            body: "Texto".to_owned(),
        }
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_an_explicit_error() {
        let sender = PushSender::new(None);
        let err = sender.send(&message(), &[recipient(1)]).await.unwrap_err();
        assert!(matches!(err, SenderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn push_refuses_to_broadcast() {
        let sender = PushSender::new(Some(PushSettings {
            gateway_url: "http://localhost:1/push".to_owned(),
            icon_url: None,
            click_url: None,
        }));
        let err = sender
            .send(&message(), &[recipient(1), recipient(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::Unsupported(_)));
    }
}
