// Discord commands for the daily reward system.

use crate::core::dailies::{ChannelBonus, DailyError};
use crate::discord::checks::admin_check;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Daily reward commands.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("claim", "attach", "remove", "list")
)]
pub async fn daily(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Claim your daily points.
#[poise::command(slash_command, guild_only)]
pub async fn claim(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx.data().dailies.claim_daily(guild_id, user_id).await {
        Ok(reward) => {
            ctx.data()
                .scores
                .increment(
                    guild_id,
                    user_id,
                    reward,
                    ctx.data().config.event_multiplier(),
                    "daily claim",
                )
                .await?;
            ctx.say(format!(
                "You claimed your **{}** daily points! Come back tomorrow for more.",
                reward * ctx.data().config.event_multiplier()
            ))
            .await?;
        }
        Err(DailyError::AlreadyClaimed) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("You've already claimed today's daily reward!")
                    .ephemeral(true),
            )
            .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Attach a daily message bonus to a channel (admin only).
#[poise::command(slash_command, guild_only, check = "admin_check")]
pub async fn attach(
    ctx: Context<'_>,
    #[description = "Channel to attach the bonus to"] channel: serenity::GuildChannel,
    #[description = "Points per daily message (default 1)"] bonus: Option<i64>,
    #[description = "Require an attachment or embed"] requires_attachment: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    if channel.kind != serenity::ChannelType::Text {
        ctx.send(
            poise::CreateReply::default()
                .content("Daily bonuses can only go on text channels.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let bonus = bonus.unwrap_or(1);
    match ctx
        .data()
        .dailies
        .attach_bonus(ChannelBonus {
            channel_id: channel.id.get(),
            guild_id,
            bonus,
            requires_attachment: requires_attachment.unwrap_or(false),
        })
        .await
    {
        Ok(()) => {
            ctx.say(format!(
                "Attached a **{}** point daily bonus to <#{}>.",
                bonus, channel.id
            ))
            .await?;
        }
        Err(DailyError::BonusExists) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("That channel already has a daily bonus. Remove it first.")
                    .ephemeral(true),
            )
            .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Remove a channel's daily message bonus (admin only).
#[poise::command(slash_command, guild_only, check = "admin_check")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Channel to remove the bonus from"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx
        .data()
        .dailies
        .remove_bonus(guild_id, channel.id.get())
        .await
    {
        Ok(()) => {
            ctx.say(format!("Removed the daily bonus from <#{}>.", channel.id))
                .await?;
        }
        Err(DailyError::NoSuchBonus) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("That channel doesn't have a daily bonus.")
                    .ephemeral(true),
            )
            .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// List the server's channel daily bonuses (admin only).
#[poise::command(slash_command, guild_only, check = "admin_check")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let bonuses = ctx.data().dailies.list_bonuses(guild_id).await?;
    if bonuses.is_empty() {
        ctx.say("No channels have daily bonuses yet.").await?;
        return Ok(());
    }

    let lines: Vec<String> = bonuses
        .iter()
        .map(|b| {
            let gate = if b.requires_attachment {
                " (attachment required)"
            } else {
                ""
            };
            format!("<#{}> - {} points{}", b.channel_id, b.bonus, gate)
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("Channel daily bonuses")
        .description(lines.join("\n"))
        .color(0x00ff00);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
