// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

pub mod bonus_roles;
pub mod checks;
pub mod daily_messages;
pub mod error_handler;
pub mod gamenight_events;

// Re-export command types for convenience
pub use commands::scores::{Context, Data, Error};
