use crate::core::lottery::{LotteryError, LotteryStake, LotteryStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed lottery ticket table. One row per entrant per round; the
/// whole table is cleared by the weekly draw.
pub struct SqliteLotteryStore {
    pool: Pool<Sqlite>,
}

impl SqliteLotteryStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lottery (
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                stake INTEGER NOT NULL,
                PRIMARY KEY (guild, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LotteryStore for SqliteLotteryStore {
    async fn insert_stake(&self, stake: LotteryStake) -> Result<bool, LotteryError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO lottery (guild, userid, stake) VALUES (?, ?, ?)")
                .bind(stake.guild_id as i64)
                .bind(stake.user_id as i64)
                .bind(stake.stake)
                .execute(&self.pool)
                .await
                .map_err(|e| LotteryError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn all_stakes(&self) -> Result<Vec<LotteryStake>, LotteryError> {
        let rows = sqlx::query("SELECT guild, userid, stake FROM lottery ORDER BY guild, userid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LotteryError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| LotteryStake {
                guild_id: row.get::<i64, _>("guild") as u64,
                user_id: row.get::<i64, _>("userid") as u64,
                stake: row.get("stake"),
            })
            .collect())
    }

    async fn clear(&self) -> Result<(), LotteryError> {
        sqlx::query("DELETE FROM lottery")
            .execute(&self.pool)
            .await
            .map_err(|e| LotteryError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db;

    #[tokio::test]
    async fn stakes_are_unique_per_user_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("test.db").display().to_string();
        let pool = db::connect(&url).await.unwrap();
        let store = SqliteLotteryStore::new(pool);
        store.migrate().await.unwrap();

        let stake = LotteryStake {
            guild_id: 1,
            user_id: 10,
            stake: 5,
        };
        assert!(store.insert_stake(stake).await.unwrap());
        assert!(!store.insert_stake(stake).await.unwrap());
        assert!(store
            .insert_stake(LotteryStake {
                guild_id: 2,
                user_id: 10,
                stake: 7,
            })
            .await
            .unwrap());

        let all = store.all_stakes().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].guild_id, 1);

        store.clear().await.unwrap();
        assert!(store.all_stakes().await.unwrap().is_empty());
        assert!(store.insert_stake(stake).await.unwrap());
    }
}
