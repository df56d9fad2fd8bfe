// Bot configuration, loaded once at startup from a TOML file.
//
// Per-guild settings are keyed by the guild id as a string (TOML table keys
// are always strings). Everything is optional; a guild with no entry simply
// has no admins, no bonus role and no game night thresholds.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// IANA timezone for the daily reset and lottery draw clocks.
    /// Defaults to America/Los_Angeles.
    pub timezone: Option<String>,

    /// Multiplier applied to every earned score increment, for double point
    /// events and the like. Admin `/score set` is exempt.
    pub event_multiplier: Option<i64>,

    #[serde(default)]
    pub guilds: HashMap<String, GuildConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GuildConfig {
    #[serde(default)]
    pub admins: AdminConfig,

    /// Role granted to the top scorers.
    pub bonus_role: Option<u64>,

    /// Channel lottery results are announced in. The lottery is disabled
    /// for the guild when unset.
    pub lottery_channel: Option<u64>,

    /// Member whose mention opens the door to darkness.
    pub door_member: Option<u64>,

    /// Game night participation awards: minimum attendance minutes
    /// (as a string key) to points. Game nights are disabled when empty.
    #[serde(default)]
    pub thresholds: HashMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    #[serde(default)]
    pub users: Vec<u64>,
    #[serde(default)]
    pub roles: Vec<u64>,
}

impl BotConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: BotConfig =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn guild(&self, guild_id: u64) -> Option<&GuildConfig> {
        self.guilds.get(&guild_id.to_string())
    }

    pub fn timezone(&self) -> chrono_tz::Tz {
        self.timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::America::Los_Angeles)
    }

    pub fn event_multiplier(&self) -> i64 {
        self.event_multiplier.unwrap_or(1)
    }
}

impl GuildConfig {
    /// Threshold table in the form the payout math wants. Keys that don't
    /// parse as minutes are dropped.
    pub fn threshold_map(&self) -> BTreeMap<u32, i64> {
        self.thresholds
            .iter()
            .filter_map(|(minutes, points)| Some((minutes.parse().ok()?, *points)))
            .collect()
    }
}
