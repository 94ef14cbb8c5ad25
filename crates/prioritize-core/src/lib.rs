//! Prioritize Core — shared event-engine abstractions.
//!
//! This crate defines the event and listener records, the store and consumer
//! traits, configuration, and the clock every expiry decision reads from.
//! It contains no infrastructure code.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod listener;
pub mod repository;
