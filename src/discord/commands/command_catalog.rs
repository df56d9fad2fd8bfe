// Discord commands module.
// Each feature gets its own command file.

pub mod scores;

pub mod dailies;

pub mod gamenights;

pub mod lottery;

pub mod eightball;
