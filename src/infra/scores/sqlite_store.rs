use crate::core::scores::{ScoreError, ScoreIncrement, ScoreRow, ScoreStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed score ledger. Rows are never deleted, even when members
/// leave; the discord layer filters departed members at read time.
pub struct SqliteScoreStore {
    pool: Pool<Sqlite>,
}

impl SqliteScoreStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                UNIQUE (guild, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn get_score(&self, guild_id: u64, user_id: u64) -> Result<Option<i64>, ScoreError> {
        let row = sqlx::query("SELECT score FROM scores WHERE guild = ? AND userid = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScoreError::Storage(e.to_string()))?;

        Ok(row.map(|row| row.get::<i64, _>(0)))
    }

    async fn set_score(&self, guild_id: u64, user_id: u64, score: i64) -> Result<(), ScoreError> {
        sqlx::query(
            r#"
            INSERT INTO scores (guild, userid, score)
            VALUES (?, ?, ?)
            ON CONFLICT(guild, userid) DO UPDATE SET
            score = excluded.score
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(|e| ScoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn add_scores(&self, increments: &[ScoreIncrement]) -> Result<(), ScoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ScoreError::Storage(e.to_string()))?;

        for inc in increments {
            sqlx::query(
                r#"
                INSERT INTO scores (guild, userid, score)
                VALUES (?, ?, ?)
                ON CONFLICT(guild, userid) DO UPDATE SET
                score = score + excluded.score
                "#,
            )
            .bind(inc.guild_id as i64)
            .bind(inc.user_id as i64)
            .bind(inc.delta)
            .execute(&mut *tx)
            .await
            .map_err(|e| ScoreError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ScoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn guild_total(&self, guild_id: u64) -> Result<Option<i64>, ScoreError> {
        let row = sqlx::query("SELECT SUM(score) FROM scores WHERE guild = ?")
            .bind(guild_id as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScoreError::Storage(e.to_string()))?;

        // SUM over zero rows is NULL.
        Ok(row.get::<Option<i64>, _>(0))
    }

    async fn top_scores(&self, guild_id: u64, limit: usize) -> Result<Vec<ScoreRow>, ScoreError> {
        self.page(guild_id, 0, limit).await
    }

    async fn scores_at_or_above(
        &self,
        guild_id: u64,
        score: i64,
    ) -> Result<Vec<ScoreRow>, ScoreError> {
        let rows = sqlx::query(
            r#"
            SELECT userid, score FROM scores
            WHERE guild = ? AND score >= ?
            ORDER BY score DESC, userid DESC
            "#,
        )
        .bind(guild_id as i64)
        .bind(score)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScoreError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| ScoreRow {
                user_id: row.get::<i64, _>("userid") as u64,
                score: row.get("score"),
            })
            .collect())
    }

    async fn page(
        &self,
        guild_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoreRow>, ScoreError> {
        let rows = sqlx::query(
            r#"
            SELECT userid, score FROM scores
            WHERE guild = ?
            ORDER BY score DESC, userid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScoreError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| ScoreRow {
                user_id: row.get::<i64, _>("userid") as u64,
                score: row.get("score"),
            })
            .collect())
    }
}
