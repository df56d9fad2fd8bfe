use crate::core::gamenights::{GamenightError, GamenightSession, GamenightStore, VoiceDuration};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed game night sessions and voice attendance log.
///
/// `voice_logs` keeps one row per (channel, user). An open interval is a row
/// with a non-NULL `join_time`; closing it folds the elapsed seconds into
/// `duration_secs`. The log covers every voice channel so a session can be
/// started in a channel people already occupy; rows for sessionless channels
/// get swept daily.
pub struct SqliteGamenightStore {
    pool: Pool<Sqlite>,
}

impl SqliteGamenightStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gamenights (
                voice_channel INTEGER NOT NULL UNIQUE,
                guild INTEGER NOT NULL,
                host INTEGER NOT NULL,
                start_channel INTEGER NOT NULL,
                UNIQUE (guild, host)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voice_logs (
                channel INTEGER NOT NULL,
                guild INTEGER NOT NULL,
                userid INTEGER NOT NULL,
                duration_secs INTEGER NOT NULL DEFAULT 0,
                join_time TEXT,
                UNIQUE (channel, userid)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl GamenightStore for SqliteGamenightStore {
    async fn create_session(&self, session: GamenightSession) -> Result<bool, GamenightError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO gamenights (voice_channel, guild, host, start_channel)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session.voice_channel as i64)
        .bind(session.guild_id as i64)
        .bind(session.host as i64)
        .bind(session.start_channel as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn session_for_channel(
        &self,
        voice_channel: u64,
    ) -> Result<Option<GamenightSession>, GamenightError> {
        let row = sqlx::query("SELECT * FROM gamenights WHERE voice_channel = ?")
            .bind(voice_channel as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(row.map(|row| GamenightSession {
            voice_channel: row.get::<i64, _>("voice_channel") as u64,
            guild_id: row.get::<i64, _>("guild") as u64,
            host: row.get::<i64, _>("host") as u64,
            start_channel: row.get::<i64, _>("start_channel") as u64,
        }))
    }

    async fn delete_session(&self, voice_channel: u64) -> Result<(), GamenightError> {
        sqlx::query("DELETE FROM gamenights WHERE voice_channel = ?")
            .bind(voice_channel as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| GamenightError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_join(
        &self,
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), GamenightError> {
        sqlx::query(
            r#"
            INSERT INTO voice_logs (channel, guild, userid, join_time)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(channel, userid) DO UPDATE SET
            join_time = excluded.join_time
            "#,
        )
        .bind(channel_id as i64)
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn record_leave(
        &self,
        channel_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), GamenightError> {
        let row = sqlx::query(
            "SELECT join_time FROM voice_logs WHERE channel = ? AND userid = ?",
        )
        .bind(channel_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        let Some(joined) = row.and_then(|row| row.get::<Option<DateTime<Utc>>, _>("join_time"))
        else {
            // Leave without an open interval, e.g. the user was already
            // in the channel when the process started.
            return Ok(());
        };

        let elapsed = (at - joined).num_seconds().max(0);
        sqlx::query(
            r#"
            UPDATE voice_logs
            SET duration_secs = duration_secs + ?, join_time = NULL
            WHERE channel = ? AND userid = ?
            "#,
        )
        .bind(elapsed)
        .bind(channel_id as i64)
        .bind(user_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn drain_channel_durations(
        &self,
        channel_id: u64,
    ) -> Result<Vec<VoiceDuration>, GamenightError> {
        let rows = sqlx::query(
            r#"
            SELECT userid, duration_secs FROM voice_logs
            WHERE channel = ?
            ORDER BY duration_secs DESC, userid DESC
            "#,
        )
        .bind(channel_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM voice_logs WHERE channel = ?")
            .bind(channel_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| VoiceDuration {
                user_id: row.get::<i64, _>("userid") as u64,
                seconds: row.get("duration_secs"),
            })
            .collect())
    }

    async fn clear_idle_voice_logs(&self) -> Result<(), GamenightError> {
        sqlx::query(
            "DELETE FROM voice_logs WHERE channel NOT IN (SELECT voice_channel FROM gamenights)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GamenightError::Storage(e.to_string()))?;

        Ok(())
    }
}
