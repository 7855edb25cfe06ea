pub mod customer_service;
pub mod notification_service;
pub mod recipient_service;
pub mod template_service;
