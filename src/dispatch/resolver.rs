use sea_orm::DatabaseConnection;

use crate::db::entities::{customer, notification};
use crate::db::services::customer_service;
use crate::notifications::models::RecipientAddress;

use super::DispatchError;

fn snapshot(customer: &customer::Model) -> RecipientAddress {
    RecipientAddress {
        customer_id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
    }
}

/// Expands a notification to its audience: exactly one customer when the
/// row carries a reference, every active customer otherwise. Contact data
/// is snapshotted here, at processing time.
pub async fn resolve(
    db: &DatabaseConnection,
    notification: &notification::Model,
) -> Result<Vec<RecipientAddress>, DispatchError> {
    match notification.customer_id {
        Some(customer_id) => {
            let customer = customer_service::get_by_id(db, customer_id)
                .await?
                .ok_or(DispatchError::CustomerNotFound(customer_id))?;
            Ok(vec![snapshot(&customer)])
        }
        None => {
            let customers = customer_service::get_all_active(db).await?;
            if customers.is_empty() {
                return Err(DispatchError::EmptyAudience);
            }
            Ok(customers.iter().map(snapshot).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{ChannelType, NotificationStatus};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn customer(id: i32) -> customer::Model {
        let now = Utc::now();
        customer::Model {
            id,
            name: format!("Cliente {id}"),
            email: format!("cliente{id}@example.com"),
            phone: Some("555-0100".to_owned()),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn notification(customer_id: Option<i32>) -> notification::Model {
        let now = Utc::now();
        notification::Model {
            id: 1,
            subject: "Hola".to_owned(),
            body: "Texto".to_owned(),
            channel_type: ChannelType::Email,
            status: NotificationStatus::Pending,
            scheduled_at: now,
            sent_at: None,
            attempts: 0,
            template_id: None,
            customer_id,
            last_error: None,
            claimed_at: None,
            claimed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn direct_notification_resolves_exactly_one_recipient() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![customer(4)]])
            .into_connection();
        let recipients = resolve(&db, &notification(Some(4))).await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].customer_id, 4);
        assert_eq!(recipients[0].email, "cliente4@example.com");
    }

    #[tokio::test]
    async fn missing_customer_fails_the_item() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<customer::Model>::new()])
            .into_connection();
        let err = resolve(&db, &notification(Some(4))).await.unwrap_err();
        assert!(matches!(err, DispatchError::CustomerNotFound(4)));
    }

    #[tokio::test]
    async fn broadcast_resolves_every_active_customer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![customer(1), customer(2), customer(3)]])
            .into_connection();
        let recipients = resolve(&db, &notification(None)).await.unwrap();
        assert_eq!(recipients.len(), 3);
    }

    #[tokio::test]
    async fn empty_audience_fails_the_broadcast() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<customer::Model>::new()])
            .into_connection();
        let err = resolve(&db, &notification(None)).await.unwrap_err();
        assert!(matches!(err, DispatchError::EmptyAudience));
    }
}
