pub mod models;
pub mod senders;
