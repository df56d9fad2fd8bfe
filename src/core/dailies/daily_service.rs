// Daily bonus core - every reward here is a time-gated idempotent claim.
//
// Three claim families share the same shape: a claim table records that a
// reward was already granted this period, and the daily reset clears the
// tables so rewards become claimable again. The service only decides
// whether a claim is fresh and how many points it is worth; the caller is
// responsible for actually crediting the ledger.

use async_trait::async_trait;
use thiserror::Error;

/// Points for `/daily claim`.
pub const DAILY_REWARD: i64 = 3;

/// Points for the door-to-darkness easter egg.
pub const DOOR_REWARD: i64 = 1;

/// Phrase a message must contain (case-insensitively) to count as a
/// door-to-darkness attempt.
pub const DOOR_PHRASE: &str = "door to darkness";

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A channel-attached daily message bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBonus {
    pub channel_id: u64,
    pub guild_id: u64,
    pub bonus: i64,
    /// When set, only messages carrying an attachment or embed qualify.
    pub requires_attachment: bool,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DailyError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("the daily reward was already claimed this period")]
    AlreadyClaimed,

    #[error("channel already has a daily bonus attached")]
    BonusExists,

    #[error("channel has no daily bonus attached")]
    NoSuchBonus,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for channel bonus definitions and the three claim tables.
///
/// Claim inserts must be idempotent (`INSERT OR IGNORE` or equivalent) and
/// report whether a row was actually created; that single bit is the whole
/// once-per-period guarantee.
#[async_trait]
pub trait DailyStore: Send + Sync {
    async fn insert_daily_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError>;
    async fn clear_daily_claims(&self) -> Result<(), DailyError>;

    async fn channel_bonus(&self, channel_id: u64) -> Result<Option<ChannelBonus>, DailyError>;
    async fn guild_channel_bonuses(&self, guild_id: u64) -> Result<Vec<ChannelBonus>, DailyError>;
    /// Returns false if the channel already has a bonus.
    async fn attach_channel_bonus(&self, bonus: ChannelBonus) -> Result<bool, DailyError>;
    /// Returns false if the channel had no bonus. Also drops the channel's
    /// outstanding claims.
    async fn remove_channel_bonus(&self, guild_id: u64, channel_id: u64)
        -> Result<bool, DailyError>;
    async fn insert_channel_claim(
        &self,
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
    ) -> Result<bool, DailyError>;
    async fn clear_channel_claims(&self) -> Result<(), DailyError>;

    async fn insert_door_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError>;
    async fn clear_door_claims(&self) -> Result<(), DailyError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct DailyService<S: DailyStore> {
    store: S,
}

impl<S: DailyStore> DailyService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Claim the `/daily claim` reward. Returns the points to credit, or
    /// [`DailyError::AlreadyClaimed`] if this user already claimed in the
    /// current period.
    pub async fn claim_daily(&self, guild_id: u64, user_id: u64) -> Result<i64, DailyError> {
        if self.store.insert_daily_claim(guild_id, user_id).await? {
            Ok(DAILY_REWARD)
        } else {
            Err(DailyError::AlreadyClaimed)
        }
    }

    /// Evaluate a message against its channel's daily bonus.
    ///
    /// Returns the points to credit when the channel has a bonus attached,
    /// the attachment gate passes, and the user hasn't claimed in this
    /// channel yet this period. `None` in every other case - an unclaimed
    /// message is not an error.
    pub async fn message_bonus(
        &self,
        guild_id: u64,
        channel_id: u64,
        user_id: u64,
        has_attachment: bool,
    ) -> Result<Option<i64>, DailyError> {
        let Some(bonus) = self.store.channel_bonus(channel_id).await? else {
            return Ok(None);
        };

        if bonus.requires_attachment && !has_attachment {
            tracing::debug!(user_id, channel_id, "message missing required attachment");
            return Ok(None);
        }

        if self
            .store
            .insert_channel_claim(channel_id, guild_id, user_id)
            .await?
        {
            Ok(Some(bonus.bonus))
        } else {
            tracing::debug!(user_id, channel_id, "channel daily already claimed");
            Ok(None)
        }
    }

    /// Claim the door-to-darkness point. Returns the points to credit, or
    /// `None` if already claimed today.
    pub async fn claim_door(&self, guild_id: u64, user_id: u64) -> Result<Option<i64>, DailyError> {
        if self.store.insert_door_claim(guild_id, user_id).await? {
            Ok(Some(DOOR_REWARD))
        } else {
            Ok(None)
        }
    }

    pub async fn attach_bonus(&self, bonus: ChannelBonus) -> Result<(), DailyError> {
        if self.store.attach_channel_bonus(bonus).await? {
            Ok(())
        } else {
            Err(DailyError::BonusExists)
        }
    }

    pub async fn remove_bonus(&self, guild_id: u64, channel_id: u64) -> Result<(), DailyError> {
        if self.store.remove_channel_bonus(guild_id, channel_id).await? {
            Ok(())
        } else {
            Err(DailyError::NoSuchBonus)
        }
    }

    pub async fn list_bonuses(&self, guild_id: u64) -> Result<Vec<ChannelBonus>, DailyError> {
        self.store.guild_channel_bonuses(guild_id).await
    }

    /// The daily reset: clear every claim table so rewards become
    /// claimable again. Bonus definitions are untouched.
    pub async fn reset_claims(&self) -> Result<(), DailyError> {
        self.store.clear_daily_claims().await?;
        self.store.clear_channel_claims().await?;
        self.store.clear_door_claims().await?;
        tracing::info!("cleared all daily claim tables");
        Ok(())
    }
}

/// Does this message text talk about the door to darkness?
pub fn mentions_door(content: &str) -> bool {
    content.to_lowercase().contains(DOOR_PHRASE)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryDailyStore {
        daily_claims: Mutex<HashSet<(u64, u64)>>,
        bonuses: Mutex<HashMap<u64, ChannelBonus>>,
        channel_claims: Mutex<HashSet<(u64, u64)>>,
        door_claims: Mutex<HashSet<(u64, u64)>>,
    }

    #[async_trait]
    impl DailyStore for InMemoryDailyStore {
        async fn insert_daily_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError> {
            Ok(self.daily_claims.lock().unwrap().insert((guild_id, user_id)))
        }

        async fn clear_daily_claims(&self) -> Result<(), DailyError> {
            self.daily_claims.lock().unwrap().clear();
            Ok(())
        }

        async fn channel_bonus(&self, channel_id: u64) -> Result<Option<ChannelBonus>, DailyError> {
            Ok(self.bonuses.lock().unwrap().get(&channel_id).copied())
        }

        async fn guild_channel_bonuses(
            &self,
            guild_id: u64,
        ) -> Result<Vec<ChannelBonus>, DailyError> {
            let mut bonuses: Vec<ChannelBonus> = self
                .bonuses
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.guild_id == guild_id)
                .copied()
                .collect();
            bonuses.sort_by_key(|b| b.channel_id);
            Ok(bonuses)
        }

        async fn attach_channel_bonus(&self, bonus: ChannelBonus) -> Result<bool, DailyError> {
            let mut bonuses = self.bonuses.lock().unwrap();
            if bonuses.contains_key(&bonus.channel_id) {
                return Ok(false);
            }
            bonuses.insert(bonus.channel_id, bonus);
            Ok(true)
        }

        async fn remove_channel_bonus(
            &self,
            _guild_id: u64,
            channel_id: u64,
        ) -> Result<bool, DailyError> {
            self.channel_claims
                .lock()
                .unwrap()
                .retain(|(ch, _)| *ch != channel_id);
            Ok(self.bonuses.lock().unwrap().remove(&channel_id).is_some())
        }

        async fn insert_channel_claim(
            &self,
            channel_id: u64,
            _guild_id: u64,
            user_id: u64,
        ) -> Result<bool, DailyError> {
            Ok(self
                .channel_claims
                .lock()
                .unwrap()
                .insert((channel_id, user_id)))
        }

        async fn clear_channel_claims(&self) -> Result<(), DailyError> {
            self.channel_claims.lock().unwrap().clear();
            Ok(())
        }

        async fn insert_door_claim(&self, guild_id: u64, user_id: u64) -> Result<bool, DailyError> {
            Ok(self.door_claims.lock().unwrap().insert((guild_id, user_id)))
        }

        async fn clear_door_claims(&self) -> Result<(), DailyError> {
            self.door_claims.lock().unwrap().clear();
            Ok(())
        }
    }

    fn picture_bonus() -> ChannelBonus {
        ChannelBonus {
            channel_id: 50,
            guild_id: 1,
            bonus: 2,
            requires_attachment: true,
        }
    }

    #[tokio::test]
    async fn second_daily_claim_is_rejected_until_reset() {
        let service = DailyService::new(InMemoryDailyStore::default());

        assert_eq!(service.claim_daily(1, 10).await.unwrap(), DAILY_REWARD);
        assert!(matches!(
            service.claim_daily(1, 10).await,
            Err(DailyError::AlreadyClaimed)
        ));

        service.reset_claims().await.unwrap();
        assert_eq!(service.claim_daily(1, 10).await.unwrap(), DAILY_REWARD);
    }

    #[tokio::test]
    async fn channel_bonus_claims_once_per_period() {
        let service = DailyService::new(InMemoryDailyStore::default());
        service.attach_bonus(picture_bonus()).await.unwrap();

        assert_eq!(service.message_bonus(1, 50, 10, true).await.unwrap(), Some(2));
        assert_eq!(service.message_bonus(1, 50, 10, true).await.unwrap(), None);

        service.reset_claims().await.unwrap();
        assert_eq!(service.message_bonus(1, 50, 10, true).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn attachment_gate_blocks_bare_messages() {
        let service = DailyService::new(InMemoryDailyStore::default());
        service.attach_bonus(picture_bonus()).await.unwrap();

        assert_eq!(service.message_bonus(1, 50, 10, false).await.unwrap(), None);
        // The failed attempt must not consume the claim.
        assert_eq!(service.message_bonus(1, 50, 10, true).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn unbonused_channel_awards_nothing() {
        let service = DailyService::new(InMemoryDailyStore::default());
        assert_eq!(service.message_bonus(1, 99, 10, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_attach_and_missing_remove_are_errors() {
        let service = DailyService::new(InMemoryDailyStore::default());
        service.attach_bonus(picture_bonus()).await.unwrap();

        assert!(matches!(
            service.attach_bonus(picture_bonus()).await,
            Err(DailyError::BonusExists)
        ));
        assert!(matches!(
            service.remove_bonus(1, 51).await,
            Err(DailyError::NoSuchBonus)
        ));

        service.remove_bonus(1, 50).await.unwrap();
        assert!(service.list_bonuses(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn door_claim_is_daily_idempotent() {
        let service = DailyService::new(InMemoryDailyStore::default());

        assert_eq!(service.claim_door(1, 10).await.unwrap(), Some(DOOR_REWARD));
        assert_eq!(service.claim_door(1, 10).await.unwrap(), None);

        service.reset_claims().await.unwrap();
        assert_eq!(service.claim_door(1, 10).await.unwrap(), Some(DOOR_REWARD));
    }

    #[test]
    fn door_phrase_matching_is_case_insensitive() {
        assert!(mentions_door("have you heard of the Door To Darkness?"));
        assert!(mentions_door("DOOR TO DARKNESS"));
        assert!(!mentions_door("a door, to darkness"));
    }
}
