// The core module contains all business logic.
// Each feature gets its own submodule; nothing here may import serenity
// or poise.

#[path = "scores/mod.rs"]
pub mod scores;

#[path = "bonus_roles/role_sync.rs"]
pub mod bonus_roles;

#[path = "dailies/daily_service.rs"]
pub mod dailies;

#[path = "gamenights/gamenight_service.rs"]
pub mod gamenights;

#[path = "lottery/lottery_service.rs"]
pub mod lottery;

pub mod schedule;
