//! User-facing command layer over the messaging transport.

pub mod commands;
pub mod error;
