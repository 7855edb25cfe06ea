use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{ChannelType, NotificationStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub subject: String,
    /// Copied from a template at creation/edit time, never a live reference.
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub channel_type: ChannelType,
    pub status: NotificationStatus,
    pub scheduled_at: ChronoDateTimeUtc,
    /// Set exactly once, when the status transitions to Sent.
    pub sent_at: Option<ChronoDateTimeUtc>,
    pub attempts: i32,
    pub template_id: Option<i32>,
    /// None means broadcast to every active customer at processing time.
    pub customer_id: Option<i32>,
    pub last_error: Option<String>,
    /// Dispatch lease: a pass claims a row before processing it so that
    /// overlapping passes skip it. Stale claims are reclaimable.
    pub claimed_at: Option<ChronoDateTimeUtc>,
    pub claimed_by: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_delete = "NoAction",
        on_update = "Cascade"
    )]
    Template,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "SetNull",
        on_update = "Cascade"
    )]
    Customer,
    #[sea_orm(has_many = "super::notification_recipient::Entity")]
    Recipients,
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::notification_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
