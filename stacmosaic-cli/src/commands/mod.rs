//! CLI command handlers.

pub mod collections;
pub mod config;
pub mod search;
