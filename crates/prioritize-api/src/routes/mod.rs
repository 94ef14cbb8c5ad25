pub mod action_board;
pub mod events;
pub mod health;
pub mod listeners;
