// Voice state plumbing for game nights.
//
// Every voice channel is tracked, not just ones with a session, so a game
// night can be started in a channel people already occupy and still count
// their time from when they joined. A session resolves the moment its voice
// channel empties.

use crate::core::gamenights::{participation_award, GamenightSummary, HOST_BONUS};
use crate::core::scores::ScoreIncrement;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::collections::HashSet;

pub async fn handle_voice_state_update(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) -> Result<(), Error> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let user_id = new.user_id.get();

    let old_channel = old.and_then(|state| state.channel_id);
    let new_channel = new.channel_id;
    if old_channel == new_channel {
        // Mute/deafen/stream toggles, not a move.
        return Ok(());
    }

    let now = chrono::Utc::now();

    if let Some(left) = old_channel {
        let has_session = data
            .gamenights
            .handle_leave(left.get(), user_id, now)
            .await?;
        if has_session && channel_is_empty(ctx, guild_id, left) {
            let summary = data.gamenights.end_session(left.get(), now).await?;
            settle_gamenight(ctx, data, summary).await?;
        }
    }

    if let Some(joined) = new_channel {
        data.gamenights
            .handle_join(joined.get(), guild_id.get(), user_id, now)
            .await?;
    }

    Ok(())
}

fn channel_is_empty(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
) -> bool {
    ctx.cache.guild(guild_id).is_some_and(|guild| {
        guild
            .voice_states
            .values()
            .all(|state| state.channel_id != Some(channel_id))
    })
}

/// Pay out a finished game night and post the attendance summary.
async fn settle_gamenight(
    ctx: &serenity::Context,
    data: &Data,
    summary: GamenightSummary,
) -> Result<(), Error> {
    let thresholds = data
        .config
        .guild(summary.guild_id)
        .map(|guild| guild.threshold_map())
        .unwrap_or_default();

    // Bots and members who left the guild mid-event earn nothing.
    let eligible: HashSet<u64> = {
        ctx.cache
            .guild(serenity::GuildId::new(summary.guild_id))
            .map(|guild| {
                guild
                    .members
                    .iter()
                    .filter(|(_, member)| !member.user.bot)
                    .map(|(id, _)| id.get())
                    .collect()
            })
            .unwrap_or_default()
    };

    let participants: Vec<_> = summary
        .participants
        .iter()
        .filter(|p| eligible.contains(&p.user_id))
        .collect();

    let mut increments = Vec::new();
    let mut lines = Vec::new();
    for (index, participant) in participants.iter().enumerate() {
        let is_host = participant.user_id == summary.host;
        let mut points = participation_award(participant.minutes, &thresholds).unwrap_or(0);
        if is_host {
            points += HOST_BONUS;
        }
        if points > 0 {
            increments.push(ScoreIncrement {
                guild_id: summary.guild_id,
                user_id: participant.user_id,
                delta: points,
            });
        }

        lines.push(format!(
            "{}. <@{}>{} ({})",
            index + 1,
            participant.user_id,
            if is_host { " (host)" } else { "" },
            participant.formatted
        ));
    }

    data.scores
        .bulk_increment(
            increments,
            data.config.event_multiplier(),
            "game night participation",
        )
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("Game night summary")
        .description(if lines.is_empty() {
            "Nobody stuck around long enough to count!".to_string()
        } else {
            lines.join("\n")
        })
        .color(0x9b59b6);

    serenity::ChannelId::new(summary.start_channel)
        .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
        .await?;

    Ok(())
}
