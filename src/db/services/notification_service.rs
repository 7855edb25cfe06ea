use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, Order, QueryFilter, QueryOrder, QuerySelect, Set,
};
use thiserror::Error;

use crate::db::entities::notification;
use crate::db::entities::prelude::*;
use crate::db::enums::NotificationStatus;
use crate::db::models::{
    ListOptions, NewNotification, NotificationOrder, NotificationWithTemplate, SortDirection,
    UpdateNotification,
};
use crate::db::services::template_service;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notification not found: {0}")]
    NotFound(i32),
    #[error("template not found: {0}")]
    TemplateNotFound(i32),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

// --- Creation ---

/// Inserts a canonical new notification. Defaults: Pending, zero attempts,
/// scheduled now when no schedule was given.
pub async fn create(
    db: &DatabaseConnection,
    input: NewNotification,
) -> Result<notification::Model, NotificationError> {
    let now = Utc::now();
    let model = notification::ActiveModel {
        subject: Set(input.subject),
        body: Set(input.body),
        channel_type: Set(input.channel_type),
        status: Set(NotificationStatus::Pending),
        scheduled_at: Set(input.scheduled_at.unwrap_or(now)),
        sent_at: Set(None),
        attempts: Set(0),
        template_id: Set(input.template_id),
        customer_id: Set(input.customer_id),
        last_error: Set(None),
        claimed_at: Set(None),
        claimed_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Creates a notification by copying subject/body/channel out of a template
/// at save time. Used by the editor and by the post-purchase hook.
pub async fn create_from_template(
    db: &DatabaseConnection,
    template_id: i32,
    scheduled_at: Option<DateTime<Utc>>,
    customer_id: Option<i32>,
) -> Result<notification::Model, NotificationError> {
    let template = template_service::get_by_id(db, template_id)
        .await
        .map_err(|e| match e {
            template_service::TemplateError::NotFound(id) => {
                NotificationError::TemplateNotFound(id)
            }
            template_service::TemplateError::Database(db_err) => {
                NotificationError::Database(db_err)
            }
            other => NotificationError::Database(DbErr::Custom(other.to_string())),
        })?;

    create(
        db,
        NewNotification {
            subject: template.subject,
            body: template.body,
            channel_type: template.channel_type,
            scheduled_at,
            customer_id,
            template_id: Some(template_id),
        },
    )
    .await
}

// --- Reads ---

pub async fn get_all(
    db: &DatabaseConnection,
    opts: ListOptions,
) -> Result<Vec<notification::Model>, NotificationError> {
    let order = match opts.direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    };
    let column = match opts.order_by {
        NotificationOrder::ScheduledAt => NotificationColumn::ScheduledAt,
        NotificationOrder::CreatedAt => NotificationColumn::CreatedAt,
        NotificationOrder::Id => NotificationColumn::Id,
    };
    let mut query = Notification::find().order_by(column, order);
    if let Some(limit) = opts.limit {
        query = query.limit(limit);
    }
    Ok(query.all(db).await?)
}

pub async fn get_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<notification::Model, NotificationError> {
    Notification::find_by_id(id)
        .one(db)
        .await?
        .ok_or(NotificationError::NotFound(id))
}

/// Like `get_by_id`, but resolves the template reference, degrading to a
/// placeholder when the template was deleted out from under the row.
pub async fn get_with_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<NotificationWithTemplate, NotificationError> {
    let model = get_by_id(db, id).await?;
    let template = match model.template_id {
        Some(template_id) => Some(match template_service::get_by_id(db, template_id).await {
            Ok(dto) => dto,
            Err(template_service::TemplateError::NotFound(_)) => {
                template_service::placeholder(template_id)
            }
            Err(template_service::TemplateError::Database(e)) => {
                return Err(NotificationError::Database(e));
            }
            Err(other) => return Err(NotificationError::Database(DbErr::Custom(other.to_string()))),
        }),
        None => None,
    };
    Ok(NotificationWithTemplate {
        notification: model,
        template,
    })
}

pub async fn get_by_status(
    db: &DatabaseConnection,
    status: NotificationStatus,
) -> Result<Vec<notification::Model>, NotificationError> {
    Ok(Notification::find()
        .filter(NotificationColumn::Status.eq(status))
        .order_by(NotificationColumn::ScheduledAt, Order::Desc)
        .all(db)
        .await?)
}

pub async fn get_by_channel(
    db: &DatabaseConnection,
    channel: crate::db::enums::ChannelType,
) -> Result<Vec<notification::Model>, NotificationError> {
    Ok(Notification::find()
        .filter(NotificationColumn::ChannelType.eq(channel))
        .order_by(NotificationColumn::ScheduledAt, Order::Desc)
        .all(db)
        .await?)
}

/// Union of notifications addressed directly to a customer and those where
/// the customer appears as a delivery recipient, deduplicated by id.
pub async fn get_by_customer(
    db: &DatabaseConnection,
    customer_id: i32,
) -> Result<Vec<notification::Model>, NotificationError> {
    let direct = Notification::find()
        .filter(NotificationColumn::CustomerId.eq(customer_id))
        .all(db)
        .await?;
    let links = NotificationRecipient::find()
        .filter(NotificationRecipientColumn::CustomerId.eq(customer_id))
        .all(db)
        .await?;

    let direct_ids: HashSet<i32> = direct.iter().map(|n| n.id).collect();
    let linked_ids: HashSet<i32> = links
        .iter()
        .map(|r| r.notification_id)
        .filter(|id| !direct_ids.contains(id))
        .collect();

    let linked = if linked_ids.is_empty() {
        Vec::new()
    } else {
        Notification::find()
            .filter(NotificationColumn::Id.is_in(linked_ids))
            .all(db)
            .await?
    };

    Ok(merge_customer_notifications(direct, linked))
}

/// Merge rule for `get_by_customer`: direct rows win over recipient-linked
/// copies of the same id; the result is sorted scheduled-descending.
pub fn merge_customer_notifications(
    direct: Vec<notification::Model>,
    linked: Vec<notification::Model>,
) -> Vec<notification::Model> {
    let mut by_id: HashMap<i32, notification::Model> = HashMap::new();
    for n in linked {
        by_id.insert(n.id, n);
    }
    for n in direct {
        by_id.insert(n.id, n);
    }
    let mut merged: Vec<notification::Model> = by_id.into_values().collect();
    merged.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
    merged
}

/// Due work for a dispatch pass: pending, scheduled in the past, below the
/// retry ceiling and not under a live claim, oldest schedule first.
pub async fn find_due(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    max_retries: i32,
    lease_seconds: i64,
) -> Result<Vec<notification::Model>, NotificationError> {
    let stale_before = now - ChronoDuration::seconds(lease_seconds);
    Ok(Notification::find()
        .filter(NotificationColumn::Status.eq(NotificationStatus::Pending))
        .filter(NotificationColumn::ScheduledAt.lte(now))
        .filter(NotificationColumn::Attempts.lt(max_retries))
        .filter(
            Condition::any()
                .add(NotificationColumn::ClaimedAt.is_null())
                .add(NotificationColumn::ClaimedAt.lt(stale_before)),
        )
        .order_by(NotificationColumn::ScheduledAt, Order::Asc)
        .all(db)
        .await?)
}

// --- Mutations ---

/// Whitelisted partial update; anything outside the listed columns cannot
/// be changed through this path.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateNotification,
) -> Result<notification::Model, NotificationError> {
    let model = get_by_id(db, id).await?;
    let mut active_model = model.into_active_model();
    if let Some(subject) = input.subject {
        active_model.subject = Set(subject);
    }
    if let Some(body) = input.body {
        active_model.body = Set(body);
    }
    if let Some(channel_type) = input.channel_type {
        active_model.channel_type = Set(channel_type);
    }
    if let Some(scheduled_at) = input.scheduled_at {
        active_model.scheduled_at = Set(scheduled_at);
    }
    if let Some(customer_id) = input.customer_id {
        active_model.customer_id = Set(customer_id);
    }
    if let Some(template_id) = input.template_id {
        active_model.template_id = Set(template_id);
    }
    active_model.updated_at = Set(Utc::now());
    Ok(active_model.update(db).await?)
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: NotificationStatus,
) -> Result<(), NotificationError> {
    let result = Notification::update_many()
        .col_expr(NotificationColumn::Status, Expr::value(status.to_value()))
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(Utc::now()))
        .filter(NotificationColumn::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(NotificationError::NotFound(id));
    }
    Ok(())
}

/// Transitions Pending -> Sent, stamping `sent_at` and bumping the attempt
/// counter in one statement. Returns false when the row was not pending
/// anymore (another pass got there first), which keeps `sent_at` set
/// exactly once.
pub async fn mark_as_sent(db: &DatabaseConnection, id: i32) -> Result<bool, NotificationError> {
    let now = Utc::now();
    let result = Notification::update_many()
        .col_expr(
            NotificationColumn::Status,
            Expr::value(NotificationStatus::Sent.to_value()),
        )
        .col_expr(NotificationColumn::SentAt, Expr::value(Some(now)))
        .col_expr(
            NotificationColumn::Attempts,
            Expr::col(NotificationColumn::Attempts).add(1),
        )
        .col_expr(NotificationColumn::LastError, Expr::value(None::<String>))
        .col_expr(
            NotificationColumn::ClaimedAt,
            Expr::value(None::<DateTime<Utc>>),
        )
        .col_expr(NotificationColumn::ClaimedBy, Expr::value(None::<String>))
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(now))
        .filter(NotificationColumn::Id.eq(id))
        .filter(NotificationColumn::Status.eq(NotificationStatus::Pending))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Puts a notification back in the queue with a fresh schedule.
pub async fn reschedule(
    db: &DatabaseConnection,
    id: i32,
    when: DateTime<Utc>,
) -> Result<(), NotificationError> {
    let result = Notification::update_many()
        .col_expr(
            NotificationColumn::Status,
            Expr::value(NotificationStatus::Pending.to_value()),
        )
        .col_expr(NotificationColumn::ScheduledAt, Expr::value(when))
        .col_expr(NotificationColumn::LastError, Expr::value(None::<String>))
        .col_expr(
            NotificationColumn::ClaimedAt,
            Expr::value(None::<DateTime<Utc>>),
        )
        .col_expr(NotificationColumn::ClaimedBy, Expr::value(None::<String>))
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(Utc::now()))
        .filter(NotificationColumn::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(NotificationError::NotFound(id));
    }
    Ok(())
}

/// SQL-side increment; never read-modify-write from the caller.
pub async fn increment_attempts(db: &DatabaseConnection, id: i32) -> Result<(), NotificationError> {
    let result = Notification::update_many()
        .col_expr(
            NotificationColumn::Attempts,
            Expr::col(NotificationColumn::Attempts).add(1),
        )
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(Utc::now()))
        .filter(NotificationColumn::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(NotificationError::NotFound(id));
    }
    Ok(())
}

/// Records a failed processing attempt. The increment and the Failed/Pending
/// decision happen as conditional updates against the stored counter, so
/// concurrent passes cannot lose an increment: the row settles on Failed
/// exactly when this attempt reaches `max_retries`. Both statements touch
/// only pending rows; a row another pass already settled (a late failure
/// after its lease expired and the row went out as Sent) is left alone and
/// its current status reported back.
pub async fn record_failure(
    db: &DatabaseConnection,
    id: i32,
    max_retries: i32,
    error: &str,
) -> Result<NotificationStatus, NotificationError> {
    let now = Utc::now();
    let failed = Notification::update_many()
        .col_expr(
            NotificationColumn::Attempts,
            Expr::col(NotificationColumn::Attempts).add(1),
        )
        .col_expr(
            NotificationColumn::Status,
            Expr::value(NotificationStatus::Failed.to_value()),
        )
        .col_expr(
            NotificationColumn::LastError,
            Expr::value(Some(error.to_owned())),
        )
        .col_expr(
            NotificationColumn::ClaimedAt,
            Expr::value(None::<DateTime<Utc>>),
        )
        .col_expr(NotificationColumn::ClaimedBy, Expr::value(None::<String>))
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(now))
        .filter(NotificationColumn::Id.eq(id))
        .filter(NotificationColumn::Status.eq(NotificationStatus::Pending))
        .filter(NotificationColumn::Attempts.gte(max_retries - 1))
        .exec(db)
        .await?;
    if failed.rows_affected == 1 {
        return Ok(NotificationStatus::Failed);
    }

    let retried = Notification::update_many()
        .col_expr(
            NotificationColumn::Attempts,
            Expr::col(NotificationColumn::Attempts).add(1),
        )
        .col_expr(
            NotificationColumn::Status,
            Expr::value(NotificationStatus::Pending.to_value()),
        )
        .col_expr(
            NotificationColumn::LastError,
            Expr::value(Some(error.to_owned())),
        )
        .col_expr(
            NotificationColumn::ClaimedAt,
            Expr::value(None::<DateTime<Utc>>),
        )
        .col_expr(NotificationColumn::ClaimedBy, Expr::value(None::<String>))
        .col_expr(NotificationColumn::UpdatedAt, Expr::value(now))
        .filter(NotificationColumn::Id.eq(id))
        .filter(NotificationColumn::Status.eq(NotificationStatus::Pending))
        .exec(db)
        .await?;
    if retried.rows_affected == 0 {
        // Not pending anymore: another actor settled the row between our
        // send and this bookkeeping. Report where it landed.
        return Ok(get_by_id(db, id).await?.status);
    }
    Ok(NotificationStatus::Pending)
}

/// Acquires the processing lease for one notification. Succeeds only if the
/// row is still pending and either unclaimed or held by a claim older than
/// the lease TTL.
pub async fn claim(
    db: &DatabaseConnection,
    id: i32,
    token: &str,
    lease_seconds: i64,
) -> Result<bool, NotificationError> {
    let now = Utc::now();
    let stale_before = now - ChronoDuration::seconds(lease_seconds);
    let result = Notification::update_many()
        .col_expr(NotificationColumn::ClaimedAt, Expr::value(Some(now)))
        .col_expr(
            NotificationColumn::ClaimedBy,
            Expr::value(Some(token.to_owned())),
        )
        .filter(NotificationColumn::Id.eq(id))
        .filter(NotificationColumn::Status.eq(NotificationStatus::Pending))
        .filter(
            Condition::any()
                .add(NotificationColumn::ClaimedAt.is_null())
                .add(NotificationColumn::ClaimedAt.lt(stale_before)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Clears a lease, but only for its owning token.
pub async fn release(
    db: &DatabaseConnection,
    id: i32,
    token: &str,
) -> Result<(), NotificationError> {
    Notification::update_many()
        .col_expr(
            NotificationColumn::ClaimedAt,
            Expr::value(None::<DateTime<Utc>>),
        )
        .col_expr(NotificationColumn::ClaimedBy, Expr::value(None::<String>))
        .filter(NotificationColumn::Id.eq(id))
        .filter(NotificationColumn::ClaimedBy.eq(token))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), NotificationError> {
    let result = Notification::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(NotificationError::NotFound(id));
    }
    Ok(())
}

/// Prunes notifications created before the cutoff.
pub async fn delete_older_than(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<u64, NotificationError> {
    let result = Notification::delete_many()
        .filter(NotificationColumn::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::ChannelType;
    use crate::db::models::CreateNotificationRequest;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn notif(id: i32, minutes_ago: i64) -> notification::Model {
        let now = Utc::now();
        notification::Model {
            id,
            subject: format!("aviso {id}"),
            body: "cuerpo".to_owned(),
            channel_type: ChannelType::Email,
            status: NotificationStatus::Pending,
            scheduled_at: now - ChronoDuration::minutes(minutes_ago),
            sent_at: None,
            attempts: 0,
            template_id: None,
            customer_id: None,
            last_error: None,
            claimed_at: None,
            claimed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[test]
    fn both_historical_payload_shapes_are_canonicalized() {
        let modern: CreateNotificationRequest = serde_json::from_str(
            r#"{"subject":"Hola","body":"Texto","channelType":"email","customerId":4}"#,
        )
        .unwrap();
        let legacy: CreateNotificationRequest = serde_json::from_str(
            r#"{"asunto":"Hola","mensaje":"Texto","tipo":"email","cliente_id":4}"#,
        )
        .unwrap();
        assert_eq!(modern, legacy);
        let canonical = legacy.into_canonical();
        assert_eq!(canonical.subject, "Hola");
        assert_eq!(canonical.customer_id, Some(4));
        assert_eq!(canonical.channel_type, ChannelType::Email);
    }

    #[test]
    fn unknown_update_fields_are_dropped_silently() {
        let parsed: UpdateNotification =
            serde_json::from_str(r#"{"subject":"x","bogusColumn":123,"attempts":99}"#).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("x"));
        // attempts is not whitelisted; it cannot reach the row.
        assert!(parsed.scheduled_at.is_none());
    }

    #[test]
    fn merge_prefers_direct_rows_and_sorts_descending() {
        let mut direct_copy = notif(2, 30);
        direct_copy.subject = "directa".to_owned();
        let mut linked_copy = notif(2, 30);
        linked_copy.subject = "enlazada".to_owned();

        let merged = merge_customer_notifications(
            vec![notif(1, 10), direct_copy],
            vec![linked_copy, notif(3, 5)],
        );

        let ids: Vec<i32> = merged.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        let winner = merged.iter().find(|n| n.id == 2).unwrap();
        assert_eq!(winner.subject, "directa");
    }

    #[tokio::test]
    async fn claim_reports_lease_conflicts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        assert!(claim(&db, 1, "token-a", 600).await.unwrap());
        assert!(!claim(&db, 1, "token-b", 600).await.unwrap());
    }

    #[tokio::test]
    async fn record_failure_settles_on_failed_at_the_ceiling() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();
        let status = record_failure(&db, 1, 3, "smtp timeout").await.unwrap();
        assert_eq!(status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn record_failure_below_ceiling_returns_to_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0), exec(1)])
            .into_connection();
        let status = record_failure(&db, 1, 3, "smtp timeout").await.unwrap();
        assert_eq!(status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn record_failure_never_reopens_a_sent_row() {
        let mut sent = notif(1, 10);
        sent.status = NotificationStatus::Sent;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0), exec(0)])
            .append_query_results([vec![sent]])
            .into_connection();
        let status = record_failure(&db, 1, 3, "late failure").await.unwrap();
        assert_eq!(status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn mark_as_sent_is_a_noop_once_already_sent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        assert!(mark_as_sent(&db, 1).await.unwrap());
        assert!(!mark_as_sent(&db, 1).await.unwrap());
    }

    #[tokio::test]
    async fn update_status_requires_an_existing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        update_status(&db, 1, NotificationStatus::Sent).await.unwrap();
        let err = update_status(&db, 99, NotificationStatus::Sent)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(99)));
    }

    #[tokio::test]
    async fn increment_attempts_requires_an_existing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0)])
            .into_connection();
        let err = increment_attempts(&db, 99).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(99)));
    }

    #[tokio::test]
    async fn get_by_customer_unions_direct_and_linked_rows() {
        use crate::db::entities::notification_recipient;
        use crate::db::enums::DeliveryStatus;

        let now = Utc::now();
        let link = notification_recipient::Model {
            id: 1,
            notification_id: 9,
            customer_id: 4,
            email: "c@example.com".to_owned(),
            phone: None,
            delivery_status: DeliveryStatus::Pending,
            created_at: now,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notif(1, 10)]])
            .append_query_results([vec![link]])
            .append_query_results([vec![notif(9, 60)]])
            .into_connection();

        let merged = get_by_customer(&db, 4).await.unwrap();
        let ids: Vec<i32> = merged.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[tokio::test]
    async fn delete_older_than_reports_pruned_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(12)])
            .into_connection();
        let pruned = delete_older_than(&db, Utc::now() - ChronoDuration::days(90))
            .await
            .unwrap();
        assert_eq!(pruned, 12);
    }
}
