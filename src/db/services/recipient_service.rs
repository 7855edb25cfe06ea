use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set,
};

use crate::db::entities::notification_recipient;
use crate::db::entities::prelude::*;
use crate::db::enums::DeliveryStatus;
use crate::notifications::models::RecipientAddress;

/// Persists one delivery record per resolved recipient. Addresses are the
/// snapshot taken by the resolver; each record starts in the Pending
/// delivery sub-state.
pub async fn create_for_notification(
    db: &DatabaseConnection,
    notification_id: i32,
    recipients: &[RecipientAddress],
) -> Result<Vec<notification_recipient::Model>, DbErr> {
    let now = Utc::now();
    let mut created = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let model = notification_recipient::ActiveModel {
            notification_id: Set(notification_id),
            customer_id: Set(recipient.customer_id),
            email: Set(recipient.email.clone()),
            phone: Set(recipient.phone.clone()),
            delivery_status: Set(DeliveryStatus::Pending),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created.push(model);
    }
    Ok(created)
}

/// Records the per-recipient delivery result once the channel sender has run.
pub async fn mark_delivery(
    db: &DatabaseConnection,
    notification_id: i32,
    customer_id: i32,
    status: DeliveryStatus,
) -> Result<(), DbErr> {
    NotificationRecipient::update_many()
        .col_expr(
            NotificationRecipientColumn::DeliveryStatus,
            Expr::value(status.to_value()),
        )
        .filter(NotificationRecipientColumn::NotificationId.eq(notification_id))
        .filter(NotificationRecipientColumn::CustomerId.eq(customer_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn get_by_notification(
    db: &DatabaseConnection,
    notification_id: i32,
) -> Result<Vec<notification_recipient::Model>, DbErr> {
    NotificationRecipient::find()
        .filter(NotificationRecipientColumn::NotificationId.eq(notification_id))
        .all(db)
        .await
}
