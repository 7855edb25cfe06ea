use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DispatchSettings;
use crate::db::entities::notification;
use crate::db::enums::{ChannelType, DeliveryStatus, NotificationStatus};
use crate::db::services::{notification_service, recipient_service};
use crate::notifications::models::OutgoingMessage;
use crate::notifications::senders::{ChannelSender, SenderError};

use super::{resolver, DispatchError, PassSummary};

/// Drives due notifications through resolution, delivery and state
/// transitions. One engine instance runs per process; its `owner` token
/// identifies the leases it holds.
pub struct DispatchEngine {
    db: Arc<DatabaseConnection>,
    email: Arc<dyn ChannelSender>,
    push: Arc<dyn ChannelSender>,
    settings: DispatchSettings,
    owner: String,
}

impl DispatchEngine {
    pub fn new(
        db: Arc<DatabaseConnection>,
        email: Arc<dyn ChannelSender>,
        push: Arc<dyn ChannelSender>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            db,
            email,
            push,
            settings,
            owner: Uuid::new_v4().to_string(),
        }
    }

    /// Runs dispatch passes forever on the configured interval. Errors are
    /// logged and never terminate the loop.
    pub async fn start_periodic_dispatch(self: Arc<Self>) {
        info!(
            interval_seconds = self.settings.interval_seconds,
            "Notification dispatch service started."
        );
        let mut ticker = interval(Duration::from_secs(self.settings.interval_seconds));
        loop {
            ticker.tick().await;
            debug!("Running notification dispatch pass...");
            match self.run_dispatch_pass().await {
                Ok(summary) => {
                    if summary.scanned > 0 {
                        info!(
                            scanned = summary.scanned,
                            sent = summary.sent,
                            failed = summary.failed,
                            skipped = summary.skipped,
                            "Dispatch pass finished."
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Error during notification dispatch pass.");
                }
            }
        }
    }

    /// One pass over the due work. Per-item failures are recorded against
    /// the notification and counted; they never abort the pass.
    pub async fn run_dispatch_pass(&self) -> Result<PassSummary, DispatchError> {
        let due = notification_service::find_due(
            &self.db,
            Utc::now(),
            self.settings.max_retries,
            self.settings.lease_seconds,
        )
        .await?;

        let mut summary = PassSummary {
            scanned: due.len(),
            ..Default::default()
        };
        let total = due.len();
        for (index, item) in due.into_iter().enumerate() {
            let claimed = notification_service::claim(
                &self.db,
                item.id,
                &self.owner,
                self.settings.lease_seconds,
            )
            .await?;
            if !claimed {
                debug!(
                    notification_id = item.id,
                    "Notification claimed elsewhere, skipping."
                );
                summary.skipped += 1;
                continue;
            }

            match self.process_one(&item).await {
                Ok(()) => {
                    info!(
                        notification_id = item.id,
                        channel = %item.channel_type,
                        "Notification sent."
                    );
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(notification_id = item.id, error = %e, "Notification processing failed.");
                    match notification_service::record_failure(
                        &self.db,
                        item.id,
                        self.settings.max_retries,
                        &e.to_string(),
                    )
                    .await
                    {
                        Ok(NotificationStatus::Failed) => {
                            warn!(
                                notification_id = item.id,
                                "Retry ceiling reached, notification marked failed."
                            );
                        }
                        Ok(NotificationStatus::Sent) => {
                            debug!(
                                notification_id = item.id,
                                "Row was settled as sent elsewhere, failure not recorded."
                            );
                        }
                        Ok(_) => {
                            debug!(
                                notification_id = item.id,
                                "Notification returned to the queue for retry."
                            );
                        }
                        Err(store_err) => {
                            error!(notification_id = item.id, error = %store_err, "Could not record the failed attempt.");
                        }
                    }
                    summary.failed += 1;
                }
            }

            if index + 1 < total && self.settings.item_delay_ms > 0 {
                sleep(Duration::from_millis(self.settings.item_delay_ms)).await;
            }
        }
        Ok(summary)
    }

    /// Resolves, persists and delivers one claimed notification. Successful
    /// when at least one recipient was delivered to.
    async fn process_one(&self, item: &notification::Model) -> Result<(), DispatchError> {
        let recipients = resolver::resolve(&self.db, item).await?;
        recipient_service::create_for_notification(&self.db, item.id, &recipients).await?;

        let message = OutgoingMessage {
            subject: item.subject.clone(),
            body: item.body.clone(),
        };
        let sender: &dyn ChannelSender = match item.channel_type {
            ChannelType::Email => self.email.as_ref(),
            ChannelType::Push => self.push.as_ref(),
        };
        let outcomes = sender.send(&message, &recipients).await?;

        let mut delivered = 0usize;
        let mut first_error: Option<String> = None;
        for outcome in &outcomes {
            let status = if outcome.is_ok() {
                delivered += 1;
                DeliveryStatus::Sent
            } else {
                if first_error.is_none() {
                    first_error.clone_from(&outcome.error);
                }
                DeliveryStatus::Failed
            };
            recipient_service::mark_delivery(&self.db, item.id, outcome.customer_id, status)
                .await?;
        }

        if delivered == 0 {
            let reason =
                first_error.unwrap_or_else(|| "no recipient could be delivered to".to_owned());
            return Err(DispatchError::Sender(SenderError::SendFailed(reason)));
        }
        if delivered < outcomes.len() {
            warn!(
                notification_id = item.id,
                delivered,
                total = outcomes.len(),
                "Partial delivery."
            );
        }

        if !notification_service::mark_as_sent(&self.db, item.id).await? {
            // Another actor moved the row out of Pending while we held the
            // lease. Drop our claim and leave their transition in place.
            debug!(
                notification_id = item.id,
                "Notification no longer pending when marking sent."
            );
            notification_service::release(&self.db, item.id, &self.owner).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{customer, notification_recipient};
    use crate::notifications::models::{DeliveryOutcome, RecipientAddress};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    struct FakeSender {
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ChannelSender for FakeSender {
        async fn send(
            &self,
            _message: &OutgoingMessage,
            recipients: &[RecipientAddress],
        ) -> Result<Vec<DeliveryOutcome>, SenderError> {
            if let Some(reason) = &self.fail_with {
                return Err(SenderError::SendFailed(reason.clone()));
            }
            Ok(recipients.iter().map(DeliveryOutcome::ok).collect())
        }
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            interval_seconds: 300,
            max_retries: 3,
            item_delay_ms: 0,
            lease_seconds: 600,
        }
    }

    fn engine(db: DatabaseConnection, fail_with: Option<String>) -> DispatchEngine {
        let sender = Arc::new(FakeSender { fail_with });
        DispatchEngine::new(Arc::new(db), sender.clone(), sender, settings())
    }

    fn customer(id: i32) -> customer::Model {
        let now = Utc::now();
        customer::Model {
            id,
            name: format!("Cliente {id}"),
            email: format!("cliente{id}@example.com"),
            phone: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn due_notification(id: i32, customer_id: Option<i32>, attempts: i32) -> notification::Model {
        let now = Utc::now();
        notification::Model {
            id,
            subject: "Hola".to_owned(),
            body: "Texto".to_owned(),
            channel_type: ChannelType::Email,
            status: NotificationStatus::Pending,
            scheduled_at: now,
            sent_at: None,
            attempts,
            template_id: None,
            customer_id,
            last_error: None,
            claimed_at: None,
            claimed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn recipient_row(id: i32, notification_id: i32, customer_id: i32) -> notification_recipient::Model {
        notification_recipient::Model {
            id,
            notification_id,
            customer_id,
            email: format!("cliente{customer_id}@example.com"),
            phone: None,
            delivery_status: DeliveryStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn broadcast_pass_delivers_and_marks_sent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![due_notification(10, None, 0)]])
            .append_query_results([vec![customer(1), customer(2), customer(3)]])
            .append_query_results([vec![recipient_row(1, 10, 1)]])
            .append_query_results([vec![recipient_row(2, 10, 2)]])
            .append_query_results([vec![recipient_row(3, 10, 3)]])
            .append_exec_results([
                exec(1), // claim
                exec(1), // delivery result, customer 1
                exec(1), // delivery result, customer 2
                exec(1), // delivery result, customer 3
                exec(1), // mark as sent
            ])
            .into_connection();

        let summary = engine(db, None).run_dispatch_pass().await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn sender_failure_records_the_attempt() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![due_notification(10, Some(4), 0)]])
            .append_query_results([vec![customer(4)]])
            .append_query_results([vec![recipient_row(1, 10, 4)]])
            .append_exec_results([
                exec(1), // claim
                exec(0), // not yet at the retry ceiling
                exec(1), // back to pending
            ])
            .into_connection();

        let summary = engine(db, Some("relay down".to_owned()))
            .run_dispatch_pass()
            .await
            .unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn contested_claim_skips_the_item() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![due_notification(10, Some(4), 0)]])
            .append_exec_results([exec(0)])
            .into_connection();

        let summary = engine(db, None).run_dispatch_pass().await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn empty_queue_is_an_empty_summary() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();

        let summary = engine(db, None).run_dispatch_pass().await.unwrap();
        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.sent, 0);
    }
}
