// Weekly lottery core.
//
// Stakes accumulate over the week; the Sunday draw groups them by guild,
// picks one winner per guild, pays out half the pot and clears the table.
// Debiting stakes and crediting prizes is left to the caller since those are
// ledger operations.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// Minimum score needed to buy a ticket.
pub const MIN_ENTRY_SCORE: i64 = 100;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One purchased ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotteryStake {
    pub guild_id: u64,
    pub user_id: u64,
    pub stake: i64,
}

/// Outcome of one guild's draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawResult {
    pub guild_id: u64,
    pub winner: u64,
    pub prize: i64,
    pub entrants: usize,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("score too low to enter: {available} points")]
    InsufficientPoints { available: i64 },

    #[error("already entered this week's lottery")]
    AlreadyEntered,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait LotteryStore: Send + Sync {
    /// Returns false if the user already holds a ticket this round.
    async fn insert_stake(&self, stake: LotteryStake) -> Result<bool, LotteryError>;
    async fn all_stakes(&self) -> Result<Vec<LotteryStake>, LotteryError>;
    async fn clear(&self) -> Result<(), LotteryError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct LotteryService<S: LotteryStore> {
    store: S,
}

/// Ticket price for a given score: 5% of it, rounded down.
pub fn stake_for(score: i64) -> i64 {
    score / 20
}

impl<S: LotteryStore> LotteryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Buy a ticket for the current round. `score` is the buyer's current
    /// ledger score; on success the stake to debit is returned.
    pub async fn buy_ticket(
        &self,
        guild_id: u64,
        user_id: u64,
        score: i64,
    ) -> Result<i64, LotteryError> {
        if score < MIN_ENTRY_SCORE {
            return Err(LotteryError::InsufficientPoints { available: score });
        }

        let stake = stake_for(score);
        if !self
            .store
            .insert_stake(LotteryStake {
                guild_id,
                user_id,
                stake,
            })
            .await?
        {
            return Err(LotteryError::AlreadyEntered);
        }

        tracing::info!(guild_id, user_id, stake, "lottery ticket bought");
        Ok(stake)
    }

    /// Run the weekly draw across every guild with tickets, then clear the
    /// table for the next round. Guilds are returned in ascending order.
    pub async fn draw(&self) -> Result<Vec<DrawResult>, LotteryError> {
        let stakes = self.store.all_stakes().await?;
        if stakes.is_empty() {
            return Ok(Vec::new());
        }

        // StdRng instead of thread_rng so the future stays Send.
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut guilds: Vec<u64> = stakes.iter().map(|s| s.guild_id).collect();
        guilds.sort_unstable();
        guilds.dedup();

        let mut results = Vec::with_capacity(guilds.len());
        for guild_id in guilds {
            let entrants: Vec<&LotteryStake> =
                stakes.iter().filter(|s| s.guild_id == guild_id).collect();
            let pot: i64 = entrants.iter().map(|s| s.stake).sum();
            let winner = entrants
                .choose(&mut rng)
                .map(|s| s.user_id)
                .unwrap_or_default();

            results.push(DrawResult {
                guild_id,
                winner,
                prize: pot / 2,
                entrants: entrants.len(),
            });
        }

        self.store.clear().await?;
        tracing::info!(draws = results.len(), "lottery drawn");
        Ok(results)
    }
}

// ============================================================================
// TESTS
// ============================================================================
