use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::enums::{ChannelType, TemplateStatus};

// --- Template DTOs ---

/// A template row enriched for consumers: the composite stored name is
/// split into base/module and the legacy active flag is canonicalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDto {
    pub id: i32,
    pub name: String,
    pub base_name: String,
    pub module: String,
    pub channel_type: ChannelType,
    pub subject: String,
    pub body: String,
    pub status: TemplateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Active-flag representations accepted at the boundary: booleans,
/// numerics, or legacy free text such as "Activo"/"Inactivo".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActiveFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub base_name: String,
    pub module: Option<String>,
    pub channel_type: ChannelType,
    pub subject: String,
    pub body: String,
    pub active: Option<ActiveFlag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplate {
    pub base_name: Option<String>,
    pub module: Option<String>,
    pub channel_type: Option<ChannelType>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub active: Option<ActiveFlag>,
}

// --- Notification DTOs ---

/// External create payload. Two historical naming conventions are accepted
/// for the same columns; the aliases fold the old Spanish field names into
/// the canonical shape at the boundary, so the ambiguity never propagates
/// past deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[serde(alias = "asunto")]
    pub subject: String,
    #[serde(alias = "mensaje")]
    pub body: String,
    #[serde(alias = "tipo")]
    pub channel_type: ChannelType,
    #[serde(default, alias = "fecha_programada")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "cliente_id")]
    pub customer_id: Option<i32>,
    #[serde(default, alias = "plantilla_id")]
    pub template_id: Option<i32>,
}

/// Canonical internal row shape for a new notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub subject: String,
    pub body: String,
    pub channel_type: ChannelType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub customer_id: Option<i32>,
    pub template_id: Option<i32>,
}

impl CreateNotificationRequest {
    pub fn into_canonical(self) -> NewNotification {
        NewNotification {
            subject: self.subject,
            body: self.body,
            channel_type: self.channel_type,
            scheduled_at: self.scheduled_at,
            customer_id: self.customer_id,
            template_id: self.template_id,
        }
    }
}

/// Distinguishes an absent key from an explicit `null`: absent leaves the
/// column untouched, `null` clears it.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Mutable-column whitelist for notification edits. Fields not listed here
/// cannot be touched through `update`; unknown payload keys are dropped by
/// serde during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotification {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub channel_type: Option<ChannelType>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub customer_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub template_id: Option<Option<i32>>,
}

/// Ordering/limit options for notification listings: the admin view wants
/// most-recent-first with a cap, the dispatch engine wants everything.
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub order_by: NotificationOrder,
    pub direction: SortDirection,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationOrder {
    ScheduledAt,
    CreatedAt,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Default for ListOptions {
    fn default() -> Self {
        ListOptions {
            order_by: NotificationOrder::ScheduledAt,
            direction: SortDirection::Desc,
            limit: None,
        }
    }
}

/// A notification joined with its template, substituting a placeholder when
/// the template has been deleted out from under it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationWithTemplate {
    #[serde(flatten)]
    pub notification: crate::db::entities::notification::Model,
    pub template: Option<TemplateDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_null_clears_a_reference() {
        let cleared: UpdateNotification =
            serde_json::from_value(json!({ "customerId": null })).unwrap();
        assert_eq!(cleared.customer_id, Some(None));
        assert_eq!(cleared.template_id, None);
    }

    #[test]
    fn absent_reference_keys_leave_columns_untouched() {
        let untouched: UpdateNotification = serde_json::from_value(json!({})).unwrap();
        assert_eq!(untouched.customer_id, None);
        assert_eq!(untouched.template_id, None);

        let reassigned: UpdateNotification =
            serde_json::from_value(json!({ "customerId": 7 })).unwrap();
        assert_eq!(reassigned.customer_id, Some(Some(7)));
    }
}
