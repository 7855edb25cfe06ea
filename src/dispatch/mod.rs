use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

use crate::db::services::notification_service::NotificationError;
use crate::notifications::senders::SenderError;

pub mod engine;
pub mod resolver;

pub use engine::DispatchEngine;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("notification store error: {0}")]
    Store(#[from] NotificationError),
    #[error("customer not found: {0}")]
    CustomerNotFound(i32),
    #[error("no active customers to broadcast to")]
    EmptyAudience,
    #[error("sender error: {0}")]
    Sender(#[from] SenderError),
}

/// Summary of one dispatch pass, returned by the on-demand trigger.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}
