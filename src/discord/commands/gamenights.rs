// Discord commands for game nights.

use crate::core::gamenights::{GamenightError, GamenightSession};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Game night commands.
#[poise::command(slash_command, guild_only, subcommands("host"))]
pub async fn gamenight(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start a game night in the host's current voice channel.
#[poise::command(slash_command, guild_only)]
pub async fn host(
    ctx: Context<'_>,
    #[description = "Host (defaults to you)"] host: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let thresholds = ctx
        .data()
        .config
        .guild(guild_id)
        .map(|guild| guild.threshold_map())
        .unwrap_or_default();
    if thresholds.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("Game nights aren't configured for this server.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let host_user = host.as_ref().unwrap_or_else(|| ctx.author());
    if host_user.bot {
        ctx.say("Bots can't host game nights.").await?;
        return Ok(());
    }
    let host_id = host_user.id.get();

    // The host must already be sitting in voice. Cache lookup in its own
    // block so the guard is dropped before we await.
    let voice_channel = {
        ctx.serenity_context()
            .cache
            .guild(serenity::GuildId::new(guild_id))
            .and_then(|guild| {
                guild
                    .voice_states
                    .get(&serenity::UserId::new(host_id))
                    .and_then(|state| state.channel_id)
            })
    };
    let Some(voice_channel) = voice_channel else {
        ctx.send(
            poise::CreateReply::default()
                .content("The host needs to be in a voice channel to start a game night.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let session = GamenightSession {
        voice_channel: voice_channel.get(),
        guild_id,
        host: host_id,
        start_channel: ctx.channel_id().get(),
    };

    match ctx
        .data()
        .gamenights
        .host(session, chrono::Utc::now())
        .await
    {
        Ok(()) => {
            ctx.say(format!(
                "Game night started in <#{}>, hosted by {}! Attendance counts until the channel empties.",
                voice_channel, host_user.name
            ))
            .await?;
        }
        Err(GamenightError::AlreadyRunning) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("A game night is already running for that channel or host.")
                    .ephemeral(true),
            )
            .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
