use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::db::entities::customer;
use crate::db::entities::prelude::*;

// Customers belong to a separate module; the dispatch side only reads them.

pub async fn get_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<customer::Model>, DbErr> {
    Customer::find_by_id(id).one(db).await
}

/// All active customers, the audience of a broadcast notification.
pub async fn get_all_active(db: &DatabaseConnection) -> Result<Vec<customer::Model>, DbErr> {
    Customer::find()
        .filter(CustomerColumn::Active.eq(true))
        .order_by_asc(CustomerColumn::Id)
        .all(db)
        .await
}
