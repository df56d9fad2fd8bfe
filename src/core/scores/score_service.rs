// Score ledger core - business logic for per-guild point scores.
// Notice how this module has NO Discord-specific code (no serenity, no poise
// imports). It works with primitive ids so the discord layer stays a thin
// translation shim.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One row of the ledger: a user's score inside a single guild.
///
/// Scores are plain signed integers. They can go negative (admins can take
/// more points than a user has) and are never floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRow {
    pub user_id: u64,
    pub score: i64,
}

/// A pending score change, used for bulk updates (game night payouts,
/// lottery winnings) so a whole batch hits the store in one call.
#[derive(Debug, Clone, Copy)]
pub struct ScoreIncrement {
    pub guild_id: u64,
    pub user_id: u64,
    pub delta: i64,
}

/// A user's score together with everyone scoring at least as much,
/// ordered by the ledger's total order. The caller filters out members
/// who have left the guild before computing a place with [`place_of`].
#[derive(Debug, Clone)]
pub struct Standings {
    pub user_score: i64,
    pub rows: Vec<ScoreRow>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid user or guild id")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting the score ledger.
///
/// All ordered queries use the ledger's single total order:
/// `score DESC, user_id DESC`. The secondary key makes ties deterministic so
/// `/rank` and leaderboard pagination always agree.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Get a user's score. `None` means the user has no ledger row yet
    /// (reads treat that as 0; writes insert).
    async fn get_score(&self, guild_id: u64, user_id: u64) -> Result<Option<i64>, ScoreError>;

    /// Absolute overwrite, upserting the row.
    async fn set_score(&self, guild_id: u64, user_id: u64, score: i64) -> Result<(), ScoreError>;

    /// Apply a batch of deltas, upserting from zero where rows are absent.
    /// Must be atomic per row (`INSERT .. ON CONFLICT DO UPDATE SET
    /// score = score + delta` or equivalent).
    async fn add_scores(&self, increments: &[ScoreIncrement]) -> Result<(), ScoreError>;

    /// Sum of all scores in a guild, `None` if the guild has no rows.
    async fn guild_total(&self, guild_id: u64) -> Result<Option<i64>, ScoreError>;

    /// The top `limit` rows of a guild.
    async fn top_scores(&self, guild_id: u64, limit: usize) -> Result<Vec<ScoreRow>, ScoreError>;

    /// Every row scoring at least `score`, ordered.
    async fn scores_at_or_above(
        &self,
        guild_id: u64,
        score: i64,
    ) -> Result<Vec<ScoreRow>, ScoreError>;

    /// An ordered slice of a guild's ledger, for pagination.
    async fn page(
        &self,
        guild_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoreRow>, ScoreError>;
}

// ============================================================================
// RANK MATH
// ============================================================================

/// 1-based place of `user_id` inside already-filtered, ordered standings.
///
/// Places are positional under the ledger order, so tied users get distinct
/// but deterministic places (the higher user id comes first).
pub fn place_of(rows: &[ScoreRow], user_id: u64) -> Option<usize> {
    rows.iter()
        .position(|row| row.user_id == user_id)
        .map(|idx| idx + 1)
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The main service for ledger operations.
///
/// Score changes are announced on an optional mpsc channel (one guild id per
/// affected guild). The bonus role synchronizer subscribes to that channel
/// instead of the ledger calling into role code directly, which keeps the
/// dependency one-directional. The `_quiet` variant skips the announcement;
/// it exists so the entry bonus granted *by* the role sync can't re-trigger
/// another sync.
pub struct ScoreService<S: ScoreStore> {
    store: S,
    score_changed: Option<UnboundedSender<u64>>,
}

impl<S: ScoreStore> ScoreService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            score_changed: None,
        }
    }

    /// Create a service that announces changed guilds on `score_changed`.
    pub fn with_notifier(store: S, score_changed: UnboundedSender<u64>) -> Self {
        Self {
            store,
            score_changed: Some(score_changed),
        }
    }

    /// Borrow the underlying store, e.g. for the leaderboard pager.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn validate_ids(guild_id: u64, user_id: u64) -> Result<(), ScoreError> {
        if guild_id == 0 || user_id == 0 {
            Err(ScoreError::InvalidId)
        } else {
            Ok(())
        }
    }

    fn notify(&self, guild_id: u64) {
        if let Some(tx) = &self.score_changed {
            // A closed receiver just means nobody is syncing roles right now.
            let _ = tx.send(guild_id);
        }
    }

    /// Get a user's score, treating an absent row as 0.
    pub async fn get_score(&self, guild_id: u64, user_id: u64) -> Result<i64, ScoreError> {
        Self::validate_ids(guild_id, user_id)?;
        Ok(self.store.get_score(guild_id, user_id).await?.unwrap_or(0))
    }

    /// Absolute overwrite of a user's score. Announces the change.
    pub async fn set_score(
        &self,
        guild_id: u64,
        user_id: u64,
        score: i64,
    ) -> Result<(), ScoreError> {
        Self::validate_ids(guild_id, user_id)?;
        self.store.set_score(guild_id, user_id, score).await?;
        tracing::debug!(guild_id, user_id, score, "score set");
        self.notify(guild_id);
        Ok(())
    }

    /// Add `delta * multiplier` to a single user's score.
    ///
    /// The event multiplier is an explicit parameter rather than ambient
    /// process state; callers thread it through from the config.
    pub async fn increment(
        &self,
        guild_id: u64,
        user_id: u64,
        delta: i64,
        multiplier: i64,
        reason: &str,
    ) -> Result<(), ScoreError> {
        self.bulk_increment(
            vec![ScoreIncrement {
                guild_id,
                user_id,
                delta,
            }],
            multiplier,
            reason,
        )
        .await
    }

    /// Apply a batch of score changes, each scaled by `multiplier`, then
    /// announce every affected guild exactly once.
    pub async fn bulk_increment(
        &self,
        increments: Vec<ScoreIncrement>,
        multiplier: i64,
        reason: &str,
    ) -> Result<(), ScoreError> {
        if increments.is_empty() {
            return Ok(());
        }
        for inc in &increments {
            Self::validate_ids(inc.guild_id, inc.user_id)?;
        }

        let scaled: Vec<ScoreIncrement> = increments
            .into_iter()
            .map(|inc| ScoreIncrement {
                delta: inc.delta * multiplier,
                ..inc
            })
            .collect();

        self.store.add_scores(&scaled).await?;

        let mut guilds: Vec<u64> = scaled.iter().map(|inc| inc.guild_id).collect();
        guilds.sort_unstable();
        guilds.dedup();

        for guild_id in guilds {
            let affected: Vec<String> = scaled
                .iter()
                .filter(|inc| inc.guild_id == guild_id)
                .map(|inc| format!("{} -> {:+} points", inc.user_id, inc.delta))
                .collect();
            tracing::debug!(guild_id, reason, "scores updated: {}", affected.join(", "));
            self.notify(guild_id);
        }

        Ok(())
    }

    /// Add points without announcing the change. Only used for the bonus
    /// role entry bonus; everything else should go through [`increment`].
    ///
    /// [`increment`]: Self::increment
    pub async fn increment_quiet(
        &self,
        guild_id: u64,
        user_id: u64,
        delta: i64,
    ) -> Result<(), ScoreError> {
        Self::validate_ids(guild_id, user_id)?;
        self.store
            .add_scores(&[ScoreIncrement {
                guild_id,
                user_id,
                delta,
            }])
            .await
    }

    /// Sum of all scores in a guild, `None` when nobody has points.
    pub async fn guild_total(&self, guild_id: u64) -> Result<Option<i64>, ScoreError> {
        self.store.guild_total(guild_id).await
    }

    /// The guild's top `limit` rows.
    pub async fn top_scores(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<ScoreRow>, ScoreError> {
        self.store.top_scores(guild_id, limit).await
    }

    /// Everything needed to compute a user's rank: their score and the
    /// ordered rows scoring at least as much. `None` if the user has no
    /// ledger row yet.
    pub async fn standings(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<Standings>, ScoreError> {
        Self::validate_ids(guild_id, user_id)?;

        let Some(user_score) = self.store.get_score(guild_id, user_id).await? else {
            return Ok(None);
        };
        let rows = self.store.scores_at_or_above(guild_id, user_score).await?;

        Ok(Some(Standings { user_score, rows }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scores::InMemoryScoreStore;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn increment_roundtrip_restores_score() {
        let service = ScoreService::new(InMemoryScoreStore::new());

        service.set_score(1, 10, 40).await.unwrap();
        service.increment(1, 10, 7, 1, "test").await.unwrap();
        service.increment(1, 10, -7, 1, "test").await.unwrap();

        assert_eq!(service.get_score(1, 10).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn absent_row_reads_as_zero_and_upserts_on_write() {
        let service = ScoreService::new(InMemoryScoreStore::new());

        assert_eq!(service.get_score(1, 10).await.unwrap(), 0);
        service.increment(1, 10, 5, 1, "test").await.unwrap();
        assert_eq!(service.get_score(1, 10).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn multiplier_scales_increments_but_not_sets() {
        let service = ScoreService::new(InMemoryScoreStore::new());

        service.increment(1, 10, 3, 2, "double points").await.unwrap();
        assert_eq!(service.get_score(1, 10).await.unwrap(), 6);

        service.set_score(1, 10, 3).await.unwrap();
        assert_eq!(service.get_score(1, 10).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn sole_member_ranks_first() {
        let service = ScoreService::new(InMemoryScoreStore::new());

        service.set_score(1, 10, 100).await.unwrap();
        let standings = service.standings(1, 10).await.unwrap().unwrap();

        assert_eq!(standings.user_score, 100);
        assert_eq!(place_of(&standings.rows, 10), Some(1));
    }

    #[tokio::test]
    async fn ties_order_by_user_id_descending() {
        let service = ScoreService::new(InMemoryScoreStore::new());

        service.set_score(1, 10, 50).await.unwrap();
        service.set_score(1, 11, 50).await.unwrap();
        service.set_score(1, 12, 80).await.unwrap();

        // Repeated calls must produce the same order.
        for _ in 0..3 {
            let standings = service.standings(1, 10).await.unwrap().unwrap();
            let ids: Vec<u64> = standings.rows.iter().map(|r| r.user_id).collect();
            assert_eq!(ids, vec![12, 11, 10]);
            assert_eq!(place_of(&standings.rows, 11), Some(2));
            assert_eq!(place_of(&standings.rows, 10), Some(3));
        }
    }

    #[tokio::test]
    async fn no_row_means_no_standings() {
        let service = ScoreService::new(InMemoryScoreStore::new());
        assert!(service.standings(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn changes_announce_each_guild_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = ScoreService::with_notifier(InMemoryScoreStore::new(), tx);

        service
            .bulk_increment(
                vec![
                    ScoreIncrement {
                        guild_id: 1,
                        user_id: 10,
                        delta: 2,
                    },
                    ScoreIncrement {
                        guild_id: 1,
                        user_id: 11,
                        delta: 2,
                    },
                    ScoreIncrement {
                        guild_id: 2,
                        user_id: 10,
                        delta: 2,
                    },
                ],
                1,
                "test",
            )
            .await
            .unwrap();

        let mut announced = vec![rx.try_recv().unwrap(), rx.try_recv().unwrap()];
        announced.sort_unstable();
        assert_eq!(announced, vec![1, 2]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn quiet_increment_does_not_announce() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = ScoreService::with_notifier(InMemoryScoreStore::new(), tx);

        service.increment_quiet(1, 10, 5).await.unwrap();

        assert_eq!(service.get_score(1, 10).await.unwrap(), 5);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn zero_ids_are_rejected() {
        let service = ScoreService::new(InMemoryScoreStore::new());
        assert!(matches!(
            service.set_score(0, 10, 1).await,
            Err(ScoreError::InvalidId)
        ));
        assert!(matches!(
            service.get_score(1, 0).await,
            Err(ScoreError::InvalidId)
        ));
    }
}
