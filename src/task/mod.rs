//! Background tasks for alert polling and inbound commands.

pub mod alert_publisher;
pub mod update_listener;
