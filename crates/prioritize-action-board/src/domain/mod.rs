//! Domain layer for the Action Board context.

pub mod aggregates;
pub mod commands;
pub mod repository;
