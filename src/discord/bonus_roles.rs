// Keeps the configured bonus role on the guild's top scorers.
//
// Syncs are driven by the ledger's score-changed channel: any score change
// announces the guild id, and the loop in main funnels those here. The
// entry bonus for newly promoted members goes through the ledger's quiet
// increment, so granting it can't queue another sync.

use crate::config::BotConfig;
use crate::core::bonus_roles::{plan_sync, BONUS_ROLE_SLOTS, ENTRY_BONUS};
use crate::core::scores::{ScoreService, ScoreStore};
use crate::discord::Error;
use crate::infra::scores::SqliteScoreStore;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;

pub async fn sync_bonus_roles(
    ctx: &serenity::Context,
    config: &BotConfig,
    scores: &ScoreService<SqliteScoreStore>,
    guild_id: u64,
) -> Result<(), Error> {
    let Some(role_id) = config.guild(guild_id).and_then(|guild| guild.bonus_role) else {
        tracing::debug!(guild_id, "no bonus role configured, skipping sync");
        return Ok(());
    };
    let role_id_s = serenity::RoleId::new(role_id);

    // Cache reads in a sync block so the guard drops before any await.
    let cached = {
        ctx.cache
            .guild(serenity::GuildId::new(guild_id))
            .map(|guild| {
                let role_exists = guild.roles.contains_key(&role_id_s);
                let present: HashSet<u64> = guild
                    .members
                    .iter()
                    .filter(|(_, member)| !member.user.bot)
                    .map(|(id, _)| id.get())
                    .collect();
                let holders: HashSet<u64> = guild
                    .members
                    .iter()
                    .filter(|(_, member)| member.roles.contains(&role_id_s))
                    .map(|(id, _)| id.get())
                    .collect();
                (role_exists, present, holders)
            })
    };
    let Some((role_exists, present, holders)) = cached else {
        tracing::warn!(guild_id, "guild not cached, skipping bonus role sync");
        return Ok(());
    };
    if !role_exists {
        tracing::warn!(guild_id, role_id, "configured bonus role does not exist");
        return Ok(());
    }

    // The top slots count only members still in the guild, so walk the
    // ledger in chunks until the slots fill or the ledger runs out.
    let store = scores.store();
    let mut top: Vec<u64> = Vec::with_capacity(BONUS_ROLE_SLOTS);
    let mut offset = 0;
    'fill: loop {
        let rows = store.page(guild_id, offset, 30).await?;
        let fetched = rows.len();
        for row in rows {
            if present.contains(&row.user_id) {
                top.push(row.user_id);
                if top.len() == BONUS_ROLE_SLOTS {
                    break 'fill;
                }
            }
        }
        if fetched < 30 {
            break;
        }
        offset += fetched;
    }

    let plan = plan_sync(&top, &holders);
    if plan.is_noop() {
        return Ok(());
    }

    let guild_id_s = serenity::GuildId::new(guild_id);
    for user_id in &plan.grant {
        ctx.http
            .add_member_role(
                guild_id_s,
                serenity::UserId::new(*user_id),
                role_id_s,
                Some("Entered the top scorers"),
            )
            .await?;
        scores.increment_quiet(guild_id, *user_id, ENTRY_BONUS).await?;
    }
    for user_id in &plan.revoke {
        ctx.http
            .remove_member_role(
                guild_id_s,
                serenity::UserId::new(*user_id),
                role_id_s,
                Some("Dropped out of the top scorers"),
            )
            .await?;
    }

    tracing::info!(
        guild_id,
        granted = plan.grant.len(),
        revoked = plan.revoke.len(),
        "bonus role synced"
    );

    Ok(())
}
