use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use thiserror::Error;

use super::models::{DeliveryOutcome, OutgoingMessage, RecipientAddress};

pub mod email;
pub mod push;

/// Shared HTTP client for senders that talk to external APIs.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("templating error: {0}")]
    TemplatingError(String),
    #[error("channel unsupported: {0}")]
    Unsupported(String),
}

/// A trait for sending one notification to its resolved audience over a
/// specific channel type.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Delivers `message` to every recipient, returning one outcome per
    /// recipient. An `Err` means the channel as a whole could not be used;
    /// per-recipient failures are reported inside the outcome list.
    async fn send(
        &self,
        message: &OutgoingMessage,
        recipients: &[RecipientAddress],
    ) -> Result<Vec<DeliveryOutcome>, SenderError>;
}
