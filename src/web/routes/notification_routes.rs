use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::entities::notification;
use crate::db::enums::{ChannelType, NotificationStatus};
use crate::db::models::{
    CreateNotificationRequest, ListOptions, NotificationOrder, NotificationWithTemplate,
    SortDirection, UpdateNotification,
};
use crate::db::services::notification_service;
use crate::web::{AppError, AppState};

use super::current_operator;

// --- Request/Response Structs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    status: Option<NotificationStatus>,
    channel: Option<ChannelType>,
    order_by: Option<NotificationOrder>,
    direction: Option<SortDirection>,
    limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    scheduled_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseNotificationRequest {
    template_id: i32,
    customer_id: i32,
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    older_than_days: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    deleted: u64,
}

// --- Route Handlers ---

async fn list_notifications_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<notification::Model>>, AppError> {
    let rows = if let Some(status) = query.status {
        notification_service::get_by_status(&app_state.db_pool, status).await?
    } else if let Some(channel) = query.channel {
        notification_service::get_by_channel(&app_state.db_pool, channel).await?
    } else {
        let defaults = ListOptions::default();
        let options = ListOptions {
            order_by: query.order_by.unwrap_or(defaults.order_by),
            direction: query.direction.unwrap_or(defaults.direction),
            limit: query.limit,
        };
        notification_service::get_all(&app_state.db_pool, options).await?
    };
    Ok(Json(rows))
}

async fn create_notification_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<notification::Model>), AppError> {
    let created =
        notification_service::create(&app_state.db_pool, payload.into_canonical()).await?;
    info!(
        notification_id = created.id,
        channel = ?created.channel_type,
        operator = %current_operator(&app_state, &headers)
            .map(|s| s.operator_name)
            .unwrap_or_else(|| "anonymous".to_owned()),
        "Notification created."
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Path(notification_id): Path<i32>,
) -> Result<Json<NotificationWithTemplate>, AppError> {
    Ok(Json(
        notification_service::get_with_template(&app_state.db_pool, notification_id).await?,
    ))
}

async fn update_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Path(notification_id): Path<i32>,
    Json(payload): Json<UpdateNotification>,
) -> Result<Json<notification::Model>, AppError> {
    Ok(Json(
        notification_service::update(&app_state.db_pool, notification_id, payload).await?,
    ))
}

async fn delete_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Path(notification_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    notification_service::delete(&app_state.db_pool, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn customer_notifications_handler(
    State(app_state): State<Arc<AppState>>,
    Path(customer_id): Path<i32>,
) -> Result<Json<Vec<notification::Model>>, AppError> {
    Ok(Json(
        notification_service::get_by_customer(&app_state.db_pool, customer_id).await?,
    ))
}

async fn reschedule_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Path(notification_id): Path<i32>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<StatusCode, AppError> {
    notification_service::reschedule(&app_state.db_pool, notification_id, payload.scheduled_at)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Programmatic creation from a template, used by the purchase flow right
/// after an order completes.
async fn purchase_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PurchaseNotificationRequest>,
) -> Result<(StatusCode, Json<notification::Model>), AppError> {
    let created = notification_service::create_from_template(
        &app_state.db_pool,
        payload.template_id,
        payload.scheduled_at,
        Some(payload.customer_id),
    )
    .await?;
    info!(
        notification_id = created.id,
        template_id = payload.template_id,
        customer_id = payload.customer_id,
        "Post-purchase notification queued."
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn purge_notifications_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, AppError> {
    if payload.older_than_days <= 0 {
        return Err(AppError::InvalidInput(
            "olderThanDays must be positive".to_string(),
        ));
    }
    let cutoff = Utc::now() - Duration::days(payload.older_than_days);
    let deleted = notification_service::delete_older_than(&app_state.db_pool, cutoff).await?;
    info!(deleted, older_than_days = payload.older_than_days, "Old notifications purged.");
    Ok(Json(PurgeResponse { deleted }))
}

// --- Router ---

pub fn create_notifications_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_notifications_handler).post(create_notification_handler),
        )
        .route("/purchase", post(purchase_notification_handler))
        .route("/purge", delete(purge_notifications_handler))
        .route("/customer/{customer_id}", get(customer_notifications_handler))
        .route(
            "/{notification_id}",
            get(get_notification_handler)
                .put(update_notification_handler)
                .delete(delete_notification_handler),
        )
        .route(
            "/{notification_id}/reschedule",
            post(reschedule_notification_handler),
        )
}
