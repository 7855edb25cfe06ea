use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::ChannelType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Composite stored name: `base::module`. Unique.
    #[sea_orm(unique)]
    pub name: String,
    pub channel_type: ChannelType,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// Legacy free-form active flag ("Activo", "1", "true", ...).
    pub active: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    // Deleting a template must NOT cascade into notifications; readers
    // tolerate the orphaned reference instead.
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
