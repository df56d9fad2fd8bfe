use crate::core::dailies::{ChannelBonus, DailyError, DailyStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed daily claim tracking. Idempotency of every claim insert
/// comes from `INSERT OR IGNORE` against a UNIQUE constraint; the affected
/// row count tells the core whether the claim was fresh.
pub struct SqliteDailyStore {
    pool: Pool<Sqlite>,
}

impl SqliteDailyStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_bonuses (
                channel INTEGER PRIMARY KEY,
                guild INTEGER NOT NULL,
                bonus INTEGER NOT NULL,
                attachment BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_claims (
                channel INTEGER NOT NULL,
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                UNIQUE (channel, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_claims (
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                UNIQUE (guild, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS door_claims (
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                UNIQUE (guild, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_bonus(row: &sqlx::sqlite::SqliteRow) -> ChannelBonus {
    ChannelBonus {
        channel_id: row.get::<i64, _>("channel") as u64,
        guild_id: row.get::<i64, _>("guild") as u64,
        bonus: row.get("bonus"),
        requires_attachment: row.get("attachment"),
    }
}

#[async_trait]
impl DailyStore for SqliteDailyStore {
    async fn insert_daily_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError> {
        let result = sqlx::query("INSERT OR IGNORE INTO daily_claims (guild, userid) VALUES (?, ?)")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_daily_claims(&self) -> Result<(), DailyError> {
        sqlx::query("DELETE FROM daily_claims")
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn channel_bonus(&self, channel_id: u64) -> Result<Option<ChannelBonus>, DailyError> {
        let row = sqlx::query("SELECT * FROM channel_bonuses WHERE channel = ?")
            .bind(channel_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(row.as_ref().map(row_to_bonus))
    }

    async fn guild_channel_bonuses(&self, guild_id: u64) -> Result<Vec<ChannelBonus>, DailyError> {
        let rows = sqlx::query("SELECT * FROM channel_bonuses WHERE guild = ? ORDER BY channel")
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(rows.iter().map(row_to_bonus).collect())
    }

    async fn attach_channel_bonus(&self, bonus: ChannelBonus) -> Result<bool, DailyError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO channel_bonuses (channel, guild, bonus, attachment)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(bonus.channel_id as i64)
        .bind(bonus.guild_id as i64)
        .bind(bonus.bonus)
        .bind(bonus.requires_attachment)
        .execute(&self.pool)
        .await
        .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_channel_bonus(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<bool, DailyError> {
        sqlx::query("DELETE FROM channel_claims WHERE channel = ?")
            .bind(channel_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        let result = sqlx::query("DELETE FROM channel_bonuses WHERE guild = ? AND channel = ?")
            .bind(guild_id as i64)
            .bind(channel_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_channel_claim(
        &self,
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
    ) -> Result<bool, DailyError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO channel_claims (channel, guild, userid) VALUES (?, ?, ?)",
        )
        .bind(channel_id as i64)
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_channel_claims(&self) -> Result<(), DailyError> {
        sqlx::query("DELETE FROM channel_claims")
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn insert_door_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError> {
        let result = sqlx::query("INSERT OR IGNORE INTO door_claims (guild, userid) VALUES (?, ?)")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_door_claims(&self) -> Result<(), DailyError> {
        sqlx::query("DELETE FROM door_claims")
            .execute(&self.pool)
            .await
            .map_err(|e| DailyError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteDailyStore {
        let url = dir.path().join("test.db").display().to_string();
        let pool = db::connect(&url).await.unwrap();
        let store = SqliteDailyStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn claim_inserts_report_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert!(store.insert_daily_claim(1, 10).await.unwrap());
        assert!(!store.insert_daily_claim(1, 10).await.unwrap());
        assert!(store.insert_daily_claim(1, 11).await.unwrap());

        store.clear_daily_claims().await.unwrap();
        assert!(store.insert_daily_claim(1, 10).await.unwrap());
    }

    #[tokio::test]
    async fn bonus_rows_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let bonus = ChannelBonus {
            channel_id: 50,
            guild_id: 1,
            bonus: 2,
            requires_attachment: true,
        };
        assert!(store.attach_channel_bonus(bonus).await.unwrap());
        assert!(!store.attach_channel_bonus(bonus).await.unwrap());

        assert_eq!(store.channel_bonus(50).await.unwrap(), Some(bonus));
        assert_eq!(store.guild_channel_bonuses(1).await.unwrap(), vec![bonus]);

        assert!(store.remove_channel_bonus(1, 50).await.unwrap());
        assert!(!store.remove_channel_bonus(1, 50).await.unwrap());
        assert_eq!(store.channel_bonus(50).await.unwrap(), None);
    }

    #[tokio::test]
    async fn removing_a_bonus_drops_its_claims() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let bonus = ChannelBonus {
            channel_id: 50,
            guild_id: 1,
            bonus: 2,
            requires_attachment: false,
        };
        store.attach_channel_bonus(bonus).await.unwrap();
        assert!(store.insert_channel_claim(50, 1, 10).await.unwrap());

        store.remove_channel_bonus(1, 50).await.unwrap();
        store.attach_channel_bonus(bonus).await.unwrap();

        // Fresh bonus, fresh claims.
        assert!(store.insert_channel_claim(50, 1, 10).await.unwrap());
    }
}
