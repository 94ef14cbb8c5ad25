//! Prioritize — Action Board context.
//!
//! Boards collect posted entries. Users subscribe to a board and are notified
//! through the event registry whenever a new entry is posted.

pub mod application;
pub mod domain;
pub mod infrastructure;
