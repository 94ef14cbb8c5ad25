//! Repository implementations for the Action Board context.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryActionBoardRepository;
pub use postgres::PgActionBoardRepository;
