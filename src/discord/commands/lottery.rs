// Discord command for the weekly lottery.

use crate::core::lottery::{LotteryError, MIN_ENTRY_SCORE};
use crate::core::schedule;
use crate::discord::{Context, Error};

/// Buy a ticket for this week's lottery.
#[poise::command(slash_command, guild_only)]
pub async fn buyticket(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let lottery_enabled = ctx
        .data()
        .config
        .guild(guild_id)
        .and_then(|guild| guild.lottery_channel)
        .is_some();
    if !lottery_enabled {
        ctx.send(
            poise::CreateReply::default()
                .content("The lottery isn't set up for this server.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let score = ctx.data().scores.get_score(guild_id, user_id).await?;

    match ctx.data().lottery.buy_ticket(guild_id, user_id, score).await {
        Ok(stake) => {
            // The stake is a flat price, never multiplied.
            ctx.data()
                .scores
                .increment(guild_id, user_id, -stake, 1, "lottery stake")
                .await?;

            let draw_at = next_draw_timestamp(&ctx);
            ctx.send(
                poise::CreateReply::default()
                    .content(format!(
                        "You bet **{}** points on this week's lottery. The drawing is at {}. Good luck!",
                        stake, draw_at
                    ))
                    .ephemeral(true),
            )
            .await?;
        }
        Err(LotteryError::InsufficientPoints { available }) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!(
                        "You need at least **{}** points to enter the lottery. You have **{}**.",
                        MIN_ENTRY_SCORE, available
                    ))
                    .ephemeral(true),
            )
            .await?;
        }
        Err(LotteryError::AlreadyEntered) => {
            let draw_at = next_draw_timestamp(&ctx);
            ctx.send(
                poise::CreateReply::default()
                    .content(format!(
                        "You already have a ticket for this week! The drawing is at {}.",
                        draw_at
                    ))
                    .ephemeral(true),
            )
            .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Discord-formatted timestamp of the next draw, e.g. `<t:1700000000:F>`.
fn next_draw_timestamp(ctx: &Context<'_>) -> String {
    let tz = ctx.data().config.timezone();
    let now = chrono::Utc::now().with_timezone(&tz);
    match schedule::next_weekly_draw(&now) {
        Some((draw, _)) => format!("<t:{}:F>", draw.timestamp()),
        None => "Sunday noon".to_string(),
    }
}
