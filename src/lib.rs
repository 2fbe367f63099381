//! alert-relay - forwards rows of a shared alerts spreadsheet to Telegram subscribers.
//!
//! This crate provides:
//! - A flat-file subscription registry keyed by phone number
//! - Google Drive polling for new versions of the alerts file
//! - Per-row dispatch of alerts through the Telegram Bot API
//! - A command handler letting users subscribe and unsubscribe themselves

pub mod bot;
pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod messenger;
pub mod model;
pub mod repository;
pub mod service;
pub mod storage;
pub mod task;
