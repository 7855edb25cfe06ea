use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customers are owned by a separate module; only name/email/phone are read
/// here, by the recipient resolver.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
    #[sea_orm(has_many = "super::notification_recipient::Entity")]
    NotificationRecipients,
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl Related<super::notification_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NotificationRecipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
