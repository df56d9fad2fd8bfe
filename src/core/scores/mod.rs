// Score ledger - the heart of the bot.
// Everything else (bonus roles, dailies, game nights, the lottery) reads
// from or writes to this module through `ScoreService`.

mod pager;
mod score_service;

pub use pager::{LeaderboardPager, PAGE_SIZE};
pub use score_service::{
    place_of, ScoreError, ScoreIncrement, ScoreRow, ScoreService, ScoreStore, Standings,
};
