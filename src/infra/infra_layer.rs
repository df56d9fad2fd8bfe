// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

pub mod db;

#[path = "scores/scores_store.rs"]
pub mod scores;

#[path = "dailies/sqlite_store.rs"]
pub mod dailies;

#[path = "gamenights/sqlite_store.rs"]
pub mod gamenights;

#[path = "lottery/sqlite_store.rs"]
pub mod lottery;
