pub mod config;
pub mod db;
pub mod dispatch;
pub mod notifications;
pub mod session;
pub mod web;
