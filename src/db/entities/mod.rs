//! SeaORM Entity Modules
//!
//! Defines the SeaORM entities that map to database tables.
//! Each entity is defined in its own module.

pub mod customer;
pub mod notification;
pub mod notification_recipient;
pub mod template;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::template::Entity as Template;
    pub use super::template::Model as TemplateModel;
    pub use super::template::ActiveModel as TemplateActiveModel;
    pub use super::template::Column as TemplateColumn;

    pub use super::notification::Entity as Notification;
    pub use super::notification::Model as NotificationModel;
    pub use super::notification::ActiveModel as NotificationActiveModel;
    pub use super::notification::Column as NotificationColumn;

    pub use super::notification_recipient::Entity as NotificationRecipient;
    pub use super::notification_recipient::Model as NotificationRecipientModel;
    pub use super::notification_recipient::ActiveModel as NotificationRecipientActiveModel;
    pub use super::notification_recipient::Column as NotificationRecipientColumn;

    pub use super::customer::Entity as Customer;
    pub use super::customer::Model as CustomerModel;
    pub use super::customer::ActiveModel as CustomerActiveModel;
    pub use super::customer::Column as CustomerColumn;
}
