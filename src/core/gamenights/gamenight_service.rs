// Game night core - voice attendance sessions and the payout math.
//
// A session binds one voice channel to a host and the text channel the event
// was started from. Voice joins and leaves accumulate per-user durations;
// when the channel empties, the session resolves into a summary and each
// participant's minutes are scored against the guild's threshold table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Flat points the host receives when their game night ends, on top of any
/// participation award they earn by attending.
pub const HOST_BONUS: i64 = 17;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// An active game night, keyed by its voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamenightSession {
    pub voice_channel: u64,
    pub guild_id: u64,
    pub host: u64,
    /// Text channel the summary is posted to.
    pub start_channel: u64,
}

/// Accumulated voice time for one user in one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceDuration {
    pub user_id: u64,
    pub seconds: i64,
}

/// A resolved participant, minutes rounded down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: u64,
    pub minutes: i64,
    /// Attendance as "HH:MM" for the summary embed.
    pub formatted: String,
}

/// Everything the discord layer needs to close out a game night.
#[derive(Debug, Clone)]
pub struct GamenightSummary {
    pub guild_id: u64,
    pub host: u64,
    pub start_channel: u64,
    /// Longest attendance first.
    pub participants: Vec<Participant>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GamenightError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("a game night is already running for this channel or host")]
    AlreadyRunning,

    #[error("no game night is running in this channel")]
    NotRunning,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for sessions and the voice attendance log.
///
/// The voice log tracks every channel, not just ones with sessions, so a
/// game night can be hosted in a channel people already sit in. Rows for
/// sessionless channels are swept by the daily reset.
#[async_trait]
pub trait GamenightStore: Send + Sync {
    /// Returns false if the channel or host already has a session.
    async fn create_session(&self, session: GamenightSession) -> Result<bool, GamenightError>;
    async fn session_for_channel(
        &self,
        voice_channel: u64,
    ) -> Result<Option<GamenightSession>, GamenightError>;
    async fn delete_session(&self, voice_channel: u64) -> Result<(), GamenightError>;

    /// Mark a user present in a channel from `at`, upserting their log row.
    async fn record_join(
        &self,
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), GamenightError>;

    /// Close the user's open interval, folding it into their duration.
    /// A leave without a recorded join is ignored.
    async fn record_leave(
        &self,
        channel_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), GamenightError>;

    /// Accumulated durations for a channel, longest first. Also deletes
    /// the channel's log rows.
    async fn drain_channel_durations(
        &self,
        channel_id: u64,
    ) -> Result<Vec<VoiceDuration>, GamenightError>;

    /// Drop voice log rows for channels without an active session.
    async fn clear_idle_voice_logs(&self) -> Result<(), GamenightError>;
}

// ============================================================================
// PAYOUT MATH
// ============================================================================

/// Points for attending `minutes`, from the guild's threshold table
/// (minimum minutes -> points). The highest threshold not exceeding the
/// attendance wins; below every threshold earns nothing.
pub fn participation_award(minutes: i64, thresholds: &BTreeMap<u32, i64>) -> Option<i64> {
    thresholds
        .iter()
        .rev()
        .find(|(min, _)| i64::from(**min) <= minutes)
        .map(|(_, points)| *points)
}

fn format_attendance(seconds: i64) -> String {
    let minutes = seconds / 60;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct GamenightService<S: GamenightStore> {
    store: S,
}

impl<S: GamenightStore> GamenightService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Start a game night. The host is counted as joined immediately since
    /// they must already be sitting in the voice channel.
    pub async fn host(
        &self,
        session: GamenightSession,
        now: DateTime<Utc>,
    ) -> Result<(), GamenightError> {
        if !self.store.create_session(session).await? {
            return Err(GamenightError::AlreadyRunning);
        }
        self.store
            .record_join(session.voice_channel, session.guild_id, session.host, now)
            .await?;
        tracing::info!(
            guild_id = session.guild_id,
            voice_channel = session.voice_channel,
            host = session.host,
            "game night started"
        );
        Ok(())
    }

    pub async fn handle_join(
        &self,
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(), GamenightError> {
        self.store
            .record_join(channel_id, guild_id, user_id, now)
            .await
    }

    /// Record a leave. Returns true when the channel has an active game
    /// night, so the caller knows to check whether the channel emptied.
    pub async fn handle_leave(
        &self,
        channel_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, GamenightError> {
        self.store.record_leave(channel_id, user_id, now).await?;
        Ok(self.store.session_for_channel(channel_id).await?.is_some())
    }

    pub async fn session_for_channel(
        &self,
        voice_channel: u64,
    ) -> Result<Option<GamenightSession>, GamenightError> {
        self.store.session_for_channel(voice_channel).await
    }

    /// Close out the session for an emptied voice channel and produce the
    /// attendance summary, longest attendance first.
    pub async fn end_session(
        &self,
        voice_channel: u64,
        now: DateTime<Utc>,
    ) -> Result<GamenightSummary, GamenightError> {
        let Some(session) = self.store.session_for_channel(voice_channel).await? else {
            return Err(GamenightError::NotRunning);
        };

        // The host's interval may still be open if the session is being
        // force-closed; a leave with no open interval is ignored.
        self.store.record_leave(voice_channel, session.host, now).await?;
        let durations = self.store.drain_channel_durations(voice_channel).await?;
        self.store.delete_session(voice_channel).await?;

        let participants = durations
            .into_iter()
            .map(|d| Participant {
                user_id: d.user_id,
                minutes: d.seconds / 60,
                formatted: format_attendance(d.seconds),
            })
            .collect();

        tracing::info!(
            guild_id = session.guild_id,
            voice_channel,
            "game night ended"
        );

        Ok(GamenightSummary {
            guild_id: session.guild_id,
            host: session.host,
            start_channel: session.start_channel,
            participants,
        })
    }

    /// Daily sweep of voice log rows for channels without a session.
    pub async fn clear_idle_voice_logs(&self) -> Result<(), GamenightError> {
        self.store.clear_idle_voice_logs().await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct LogRow {
        seconds: i64,
        joined_at: Option<DateTime<Utc>>,
    }

    #[derive(Default)]
    struct InMemoryGamenightStore {
        sessions: Mutex<HashMap<u64, GamenightSession>>,
        logs: Mutex<HashMap<(u64, u64), LogRow>>,
    }

    #[async_trait]
    impl GamenightStore for InMemoryGamenightStore {
        async fn create_session(
            &self,
            session: GamenightSession,
        ) -> Result<bool, GamenightError> {
            let mut sessions = self.sessions.lock().unwrap();
            let conflict = sessions.contains_key(&session.voice_channel)
                || sessions
                    .values()
                    .any(|s| s.guild_id == session.guild_id && s.host == session.host);
            if conflict {
                return Ok(false);
            }
            sessions.insert(session.voice_channel, session);
            Ok(true)
        }

        async fn session_for_channel(
            &self,
            voice_channel: u64,
        ) -> Result<Option<GamenightSession>, GamenightError> {
            Ok(self.sessions.lock().unwrap().get(&voice_channel).copied())
        }

        async fn delete_session(&self, voice_channel: u64) -> Result<(), GamenightError> {
            self.sessions.lock().unwrap().remove(&voice_channel);
            Ok(())
        }

        async fn record_join(
            &self,
            channel_id: u64,
            _guild_id: u64,
            user_id: u64,
            at: DateTime<Utc>,
        ) -> Result<(), GamenightError> {
            let mut logs = self.logs.lock().unwrap();
            let row = logs.entry((channel_id, user_id)).or_default();
            row.joined_at = Some(at);
            Ok(())
        }

        async fn record_leave(
            &self,
            channel_id: u64,
            user_id: u64,
            at: DateTime<Utc>,
        ) -> Result<(), GamenightError> {
            let mut logs = self.logs.lock().unwrap();
            if let Some(row) = logs.get_mut(&(channel_id, user_id)) {
                if let Some(joined) = row.joined_at.take() {
                    row.seconds += (at - joined).num_seconds();
                }
            }
            Ok(())
        }

        async fn drain_channel_durations(
            &self,
            channel_id: u64,
        ) -> Result<Vec<VoiceDuration>, GamenightError> {
            let mut logs = self.logs.lock().unwrap();
            let mut durations: Vec<VoiceDuration> = logs
                .iter()
                .filter(|((ch, _), _)| *ch == channel_id)
                .map(|((_, user), row)| VoiceDuration {
                    user_id: *user,
                    seconds: row.seconds,
                })
                .collect();
            logs.retain(|(ch, _), _| *ch != channel_id);
            durations.sort_by(|a, b| b.seconds.cmp(&a.seconds));
            Ok(durations)
        }

        async fn clear_idle_voice_logs(&self) -> Result<(), GamenightError> {
            let sessions = self.sessions.lock().unwrap();
            self.logs
                .lock()
                .unwrap()
                .retain(|(ch, _), _| sessions.contains_key(ch));
            Ok(())
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 20, minute, 0).unwrap()
    }

    fn session() -> GamenightSession {
        GamenightSession {
            voice_channel: 100,
            guild_id: 1,
            host: 10,
            start_channel: 200,
        }
    }

    fn thresholds() -> BTreeMap<u32, i64> {
        BTreeMap::from([(15, 3), (30, 7), (60, 12)])
    }

    #[test]
    fn participation_award_picks_highest_reached_threshold() {
        let t = thresholds();
        assert_eq!(participation_award(5, &t), None);
        assert_eq!(participation_award(15, &t), Some(3));
        assert_eq!(participation_award(29, &t), Some(3));
        assert_eq!(participation_award(45, &t), Some(7));
        assert_eq!(participation_award(200, &t), Some(12));
        assert_eq!(participation_award(200, &BTreeMap::new()), None);
    }

    #[tokio::test]
    async fn double_host_is_rejected() {
        let service = GamenightService::new(InMemoryGamenightStore::default());
        service.host(session(), at(0)).await.unwrap();

        // Same channel, different host.
        let mut other = session();
        other.host = 11;
        assert!(matches!(
            service.host(other, at(1)).await,
            Err(GamenightError::AlreadyRunning)
        ));

        // Same host, different channel.
        let mut elsewhere = session();
        elsewhere.voice_channel = 101;
        assert!(matches!(
            service.host(elsewhere, at(1)).await,
            Err(GamenightError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn session_resolves_into_ordered_summary() {
        let service = GamenightService::new(InMemoryGamenightStore::default());
        service.host(session(), at(0)).await.unwrap();

        service.handle_join(100, 1, 20, at(10)).await.unwrap();
        service.handle_join(100, 1, 30, at(20)).await.unwrap();
        assert!(service.handle_leave(100, 30, at(50)).await.unwrap());
        assert!(service.handle_leave(100, 20, at(55)).await.unwrap());

        let summary = service.end_session(100, at(59)).await.unwrap();
        assert_eq!(summary.host, 10);
        assert_eq!(summary.start_channel, 200);

        let order: Vec<(u64, i64)> = summary
            .participants
            .iter()
            .map(|p| (p.user_id, p.minutes))
            .collect();
        // Host sat the full 59 minutes, then 20 with 45, then 30 with 30.
        assert_eq!(order, vec![(10, 59), (20, 45), (30, 30)]);
        assert_eq!(summary.participants[0].formatted, "00:59");

        assert!(service.session_for_channel(100).await.unwrap().is_none());
        assert!(matches!(
            service.end_session(100, at(59)).await,
            Err(GamenightError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn leave_reports_whether_a_session_is_active() {
        let service = GamenightService::new(InMemoryGamenightStore::default());

        service.handle_join(300, 1, 20, at(0)).await.unwrap();
        assert!(!service.handle_leave(300, 20, at(5)).await.unwrap());

        service.host(session(), at(0)).await.unwrap();
        assert!(service.handle_leave(100, 10, at(5)).await.unwrap());
    }

    #[tokio::test]
    async fn idle_sweep_keeps_only_session_channels() {
        let service = GamenightService::new(InMemoryGamenightStore::default());
        service.host(session(), at(0)).await.unwrap();
        service.handle_join(300, 1, 20, at(0)).await.unwrap();
        service.handle_leave(300, 20, at(30)).await.unwrap();

        service.clear_idle_voice_logs().await.unwrap();

        // The session channel survives the sweep with its durations intact.
        let summary = service.end_session(100, at(40)).await.unwrap();
        assert_eq!(summary.participants.len(), 1);

        // The idle channel's rows are gone.
        service.host(
            GamenightSession {
                voice_channel: 300,
                guild_id: 1,
                host: 11,
                start_channel: 200,
            },
            at(41),
        )
        .await
        .unwrap();
        let summary = service.end_session(300, at(41)).await.unwrap();
        let users: Vec<u64> = summary.participants.iter().map(|p| p.user_id).collect();
        assert_eq!(users, vec![11]);
    }

    #[test]
    fn attendance_formats_as_hours_and_minutes() {
        assert_eq!(format_attendance(59), "00:00");
        assert_eq!(format_attendance(60 * 61), "01:01");
        assert_eq!(format_attendance(60 * 60 * 10 + 60 * 5), "10:05");
    }
}
