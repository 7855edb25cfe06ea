use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::db::services::notification_service::NotificationError;
use crate::db::services::template_service::TemplateError;
use crate::dispatch::DispatchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {msg}"),
            ),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::InvalidInput(msg) => AppError::InvalidInput(msg),
            TemplateError::DuplicateName(name) => {
                AppError::Conflict(format!("A template named '{name}' already exists."))
            }
            TemplateError::NotFound(id) => AppError::NotFound(format!("Template {id} not found")),
            TemplateError::Database(e) => AppError::DatabaseError(e.to_string()),
        }
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => {
                AppError::NotFound(format!("Notification {id} not found"))
            }
            NotificationError::TemplateNotFound(id) => {
                AppError::NotFound(format!("Template {id} not found"))
            }
            NotificationError::Database(e) => AppError::DatabaseError(e.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Database(e) => AppError::DatabaseError(e.to_string()),
            DispatchError::Store(e) => e.into(),
            DispatchError::CustomerNotFound(id) => {
                AppError::NotFound(format!("Customer {id} not found"))
            }
            DispatchError::EmptyAudience => {
                AppError::InvalidInput("no active customers to broadcast to".to_string())
            }
            DispatchError::Sender(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}
