use async_trait::async_trait;
use futures::future::join_all;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tera::{Context, Tera};
use tokio::time::Duration;
use tracing::warn;

use crate::config::{EmailSettings, FallbackApiSettings};
use crate::notifications::models::{DeliveryOutcome, OutgoingMessage, RecipientAddress};

use super::{ChannelSender, SenderError, HTTP_CLIENT};

/// Pause between parallel send groups, so a large broadcast does not slam
/// the relay.
const CHUNK_PAUSE_MS: u64 = 200;

/// Outbound email. The primary path is SMTP; when that errors out the
/// message is retried through a third-party HTTP email API, if configured.
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    settings: EmailSettings,
}

/// Splits the audience into fixed-size send groups; each group's sends run
/// in parallel, groups run one after another.
pub fn batches(recipients: &[RecipientAddress], size: usize) -> Vec<&[RecipientAddress]> {
    recipients.chunks(size.max(1)).collect()
}

/// Renders a Tera template against one recipient's context.
pub fn render(
    template: &str,
    recipient: &RecipientAddress,
    autoescape: bool,
) -> Result<String, SenderError> {
    let mut context = Context::new();
    context.insert("nombre", &recipient.name);
    context.insert("email", &recipient.email);
    Tera::one_off(template, &context, autoescape)
        .map_err(|e| SenderError::TemplatingError(e.to_string()))
}

impl EmailSender {
    pub fn new(settings: EmailSettings) -> Result<Self, SenderError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| SenderError::InvalidConfiguration(format!("bad SMTP relay: {e}")))?
            .port(settings.smtp_port);
        if let (Some(user), Some(password)) =
            (settings.smtp_user.clone(), settings.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(user, password));
        }
        Ok(Self {
            transport: builder.build(),
            settings,
        })
    }

    async fn try_smtp(
        &self,
        message: &OutgoingMessage,
        recipient: &RecipientAddress,
    ) -> Result<(), SenderError> {
        let subject = render(&message.subject, recipient, false)?;
        let html = render(&message.body, recipient, true)?;
        let email = Message::builder()
            .from(
                self.settings
                    .from_address
                    .parse::<Mailbox>()
                    .map_err(|e| {
                        SenderError::InvalidConfiguration(format!("bad from address: {e}"))
                    })?,
            )
            .to(recipient
                .email
                .parse::<Mailbox>()
                .map_err(|e| SenderError::SendFailed(format!("bad recipient address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| SenderError::SendFailed(format!("failed to build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| SenderError::SendFailed(e.to_string()))?;
        Ok(())
    }

    async fn try_fallback(
        &self,
        api: &FallbackApiSettings,
        message: &OutgoingMessage,
        recipient: &RecipientAddress,
    ) -> Result<(), SenderError> {
        let subject = render(&message.subject, recipient, false)?;
        let body = render(&message.body, recipient, true)?;
        let payload = serde_json::json!({
            "service_id": api.service_id,
            "template_id": api.template_id,
            "user_id": api.public_key,
            "template_params": {
                "to_email": recipient.email,
                "subject": subject,
                "message": body,
            },
        });

        let response = HTTP_CLIENT.post(&api.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "email API returned non-success status: {status}. Body: {error_body}"
            )));
        }
        Ok(())
    }

    async fn send_one(
        &self,
        message: &OutgoingMessage,
        recipient: &RecipientAddress,
    ) -> DeliveryOutcome {
        match self.try_smtp(message, recipient).await {
            Ok(()) => DeliveryOutcome::ok(recipient),
            Err(primary_err) => {
                warn!(email = %recipient.email, error = %primary_err, "SMTP send failed, trying HTTP fallback");
                match &self.settings.fallback {
                    Some(api) => match self.try_fallback(api, message, recipient).await {
                        Ok(()) => DeliveryOutcome::ok(recipient),
                        Err(fallback_err) => DeliveryOutcome::failed(
                            recipient,
                            format!("smtp: {primary_err}; fallback: {fallback_err}"),
                        ),
                    },
                    None => DeliveryOutcome::failed(recipient, primary_err.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    async fn send(
        &self,
        message: &OutgoingMessage,
        recipients: &[RecipientAddress],
    ) -> Result<Vec<DeliveryOutcome>, SenderError> {
        let groups = batches(recipients, self.settings.batch_size);
        let last = groups.len().saturating_sub(1);
        let mut outcomes = Vec::with_capacity(recipients.len());
        for (index, group) in groups.into_iter().enumerate() {
            let sends = group.iter().map(|r| self.send_one(message, r));
            outcomes.extend(join_all(sends).await);
            if index < last {
                tokio::time::sleep(Duration::from_millis(CHUNK_PAUSE_MS)).await;
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(id: i32) -> RecipientAddress {
        RecipientAddress {
            customer_id: id,
            name: format!("Cliente {id}"),
            email: format!("cliente{id}@example.com"),
            phone: None,
        }
    }

    #[test]
    fn batches_chunk_the_audience() {
        let recipients: Vec<RecipientAddress> = (0..120).map(recipient).collect();
        let groups = batches(&recipients, 50);
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(sizes.iter().sum::<usize>(), 120);
    }

    #[test]
    fn batches_tolerate_a_zero_size() {
        let recipients: Vec<RecipientAddress> = (0..3).map(recipient).collect();
        assert_eq!(batches(&recipients, 0).len(), 3);
    }

    #[test]
    fn render_resolves_recipient_placeholders() {
        let rendered = render("Hola {{ nombre }}", &recipient(7), false).unwrap();
        assert_eq!(rendered, "Hola Cliente 7");
    }

    #[test]
    fn render_surfaces_template_errors() {
        let err = render("Hola {{ nombre ", &recipient(7), false).unwrap_err();
        assert!(matches!(err, SenderError::TemplatingError(_)));
    }
}
