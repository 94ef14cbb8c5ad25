//! Application layer for the Action Board context.

pub mod command_handlers;
pub mod query_handlers;
