// In-memory implementation of the score ledger.
//
// Used by the core service tests so the business logic can be exercised
// without a database file. It must honor the same total order as the
// SQLite store (`score DESC, user_id DESC`) or the pager tests would pass
// here and fail in production.

use crate::core::scores::{ScoreError, ScoreIncrement, ScoreRow, ScoreStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// Composite key: users can hold scores in multiple guilds.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct GuildUserKey {
    guild_id: u64,
    user_id: u64,
}

pub struct InMemoryScoreStore {
    data: DashMap<GuildUserKey, i64>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// All rows of a guild in ledger order.
    fn ordered_rows(&self, guild_id: u64) -> Vec<ScoreRow> {
        let mut rows: Vec<ScoreRow> = self
            .data
            .iter()
            .filter(|entry| entry.key().guild_id == guild_id)
            .map(|entry| ScoreRow {
                user_id: entry.key().user_id,
                score: *entry.value(),
            })
            .collect();

        rows.sort_by(|a, b| b.score.cmp(&a.score).then(b.user_id.cmp(&a.user_id)));
        rows
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn get_score(&self, guild_id: u64, user_id: u64) -> Result<Option<i64>, ScoreError> {
        let key = GuildUserKey { guild_id, user_id };
        Ok(self.data.get(&key).map(|entry| *entry))
    }

    async fn set_score(&self, guild_id: u64, user_id: u64, score: i64) -> Result<(), ScoreError> {
        self.data.insert(GuildUserKey { guild_id, user_id }, score);
        Ok(())
    }

    async fn add_scores(&self, increments: &[ScoreIncrement]) -> Result<(), ScoreError> {
        for inc in increments {
            let key = GuildUserKey {
                guild_id: inc.guild_id,
                user_id: inc.user_id,
            };
            *self.data.entry(key).or_insert(0) += inc.delta;
        }
        Ok(())
    }

    async fn guild_total(&self, guild_id: u64) -> Result<Option<i64>, ScoreError> {
        let rows = self.ordered_rows(guild_id);
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.iter().map(|row| row.score).sum()))
    }

    async fn top_scores(&self, guild_id: u64, limit: usize) -> Result<Vec<ScoreRow>, ScoreError> {
        let mut rows = self.ordered_rows(guild_id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn scores_at_or_above(
        &self,
        guild_id: u64,
        score: i64,
    ) -> Result<Vec<ScoreRow>, ScoreError> {
        Ok(self
            .ordered_rows(guild_id)
            .into_iter()
            .filter(|row| row.score >= score)
            .collect())
    }

    async fn page(
        &self,
        guild_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoreRow>, ScoreError> {
        Ok(self
            .ordered_rows(guild_id)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_scores_upserts_and_accumulates() {
        let store = InMemoryScoreStore::new();

        store
            .add_scores(&[ScoreIncrement {
                guild_id: 1,
                user_id: 10,
                delta: 4,
            }])
            .await
            .unwrap();
        store
            .add_scores(&[ScoreIncrement {
                guild_id: 1,
                user_id: 10,
                delta: -1,
            }])
            .await
            .unwrap();

        assert_eq!(store.get_score(1, 10).await.unwrap(), Some(3));
        assert_eq!(store.get_score(2, 10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn guilds_are_isolated() {
        let store = InMemoryScoreStore::new();
        store.set_score(1, 10, 5).await.unwrap();
        store.set_score(2, 10, 50).await.unwrap();

        assert_eq!(store.guild_total(1).await.unwrap(), Some(5));
        assert_eq!(store.guild_total(2).await.unwrap(), Some(50));
        assert_eq!(store.guild_total(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn page_respects_ledger_order() {
        let store = InMemoryScoreStore::new();
        store.set_score(1, 10, 5).await.unwrap();
        store.set_score(1, 11, 5).await.unwrap();
        store.set_score(1, 12, 9).await.unwrap();

        let page = store.page(1, 1, 2).await.unwrap();
        let ids: Vec<u64> = page.iter().map(|row| row.user_id).collect();
        assert_eq!(ids, vec![11, 10]);
    }
}
