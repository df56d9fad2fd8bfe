// Discord commands for the score ledger.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::config::BotConfig;
use crate::core::dailies::DailyService;
use crate::core::gamenights::GamenightService;
use crate::core::lottery::LotteryService;
use crate::core::scores::{place_of, LeaderboardPager, ScoreService};
use crate::discord::checks::admin_check;
use crate::infra::dailies::SqliteDailyStore;
use crate::infra::gamenights::SqliteGamenightStore;
use crate::infra::lottery::SqliteLotteryStore;
use crate::infra::scores::SqliteScoreStore;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;

/// Show the server's score leaderboard.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    // Defer since filling pages may need several ledger queries
    ctx.defer().await?;

    // Departed members keep their ledger rows but are hidden from the
    // leaderboard. Cache-only membership check; if the guild isn't cached
    // we show everyone rather than nobody.
    let present = present_members(&ctx, guild_id);
    let keep = |user_id: u64| present.as_ref().map_or(true, |m| m.contains(&user_id));

    let store = ctx.data().scores.store();
    let mut pager = LeaderboardPager::init(store, guild_id, &keep).await?;

    if pager.entries().is_empty() {
        ctx.say("Nobody has any points yet!").await?;
        return Ok(());
    }

    let msg = ctx
        .send(
            poise::CreateReply::default()
                .embed(leaderboard_embed(&ctx, guild_id, &pager))
                .components(leaderboard_buttons(&pager)),
        )
        .await?;
    let msg_id = msg.message().await?.id;

    // Interaction loop
    while let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .timeout(std::time::Duration::from_secs(60 * 2))
        .filter(move |mci| mci.message.id == msg_id)
        .await
    {
        match mci.data.custom_id.as_str() {
            "prev" => pager.prev_page(store, &keep).await?,
            "next" => pager.next_page(store, &keep).await?,
            _ => {}
        }

        if let Err(e) = mci.defer(&ctx.http()).await {
            tracing::warn!("Error deferring interaction: {e:?}");
            continue;
        }

        if let Err(e) = msg
            .edit(
                ctx,
                poise::CreateReply::default()
                    .embed(leaderboard_embed(&ctx, guild_id, &pager))
                    .components(leaderboard_buttons(&pager)),
            )
            .await
        {
            tracing::warn!("Error updating leaderboard: {e:?}");
        }
    }

    // Remove components after timeout
    let _ = msg
        .edit(ctx, poise::CreateReply::default().components(vec![]))
        .await;

    Ok(())
}

fn leaderboard_embed(
    ctx: &Context<'_>,
    guild_id: u64,
    pager: &LeaderboardPager,
) -> serenity::CreateEmbed {
    let mut description = String::new();
    for (index, row) in pager.entries().iter().enumerate() {
        let place = pager.first_place() + index;
        let name = resolve_display_name_cached(ctx, guild_id, row.user_id);
        description.push_str(&format!("{}: {} - {}\n", place, name, row.score));
    }

    serenity::CreateEmbed::new()
        .title("Leaderboard")
        .description(description)
        .color(0xffd700)
}

fn leaderboard_buttons(pager: &LeaderboardPager) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("prev")
            .label("◀ Previous")
            .style(serenity::ButtonStyle::Primary)
            .disabled(!pager.has_prev()),
        serenity::CreateButton::new("next")
            .label("Next ▶")
            .style(serenity::ButtonStyle::Primary)
            .disabled(!pager.has_next()),
    ])]
}

/// Show a member's place on the leaderboard.
#[poise::command(slash_command, guild_only)]
pub async fn rank(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    if target_user.bot {
        ctx.say("Bots can't get points silly :)").await?;
        return Ok(());
    }

    let user_id = target_user.id.get();
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let Some(standings) = ctx.data().scores.standings(guild_id, user_id).await? else {
        ctx.say(format!("{} doesn't have any points yet!", target_user.name))
            .await?;
        return Ok(());
    };

    // Ranks only count members still in the guild.
    let present = present_members(&ctx, guild_id);
    let rows: Vec<_> = standings
        .rows
        .into_iter()
        .filter(|row| present.as_ref().map_or(true, |m| m.contains(&row.user_id)))
        .collect();

    let name = resolve_display_name_cached(&ctx, guild_id, user_id);
    match place_of(&rows, user_id) {
        Some(place) => {
            ctx.say(format!(
                "{} is in **{} place** with **{}** points.",
                name,
                make_ordinal(place),
                standings.user_score
            ))
            .await?;
        }
        None => {
            ctx.say(format!("{} doesn't have any points yet!", name))
                .await?;
        }
    }

    Ok(())
}

/// Show the total points earned by the whole server.
#[poise::command(slash_command, guild_only)]
pub async fn total(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx.data().scores.guild_total(guild_id).await? {
        Some(total) => {
            ctx.say(format!(
                "Everyone here has earned a total of **{}** points!",
                total
            ))
            .await?;
        }
        None => {
            ctx.say("Nobody has any points yet!").await?;
        }
    }

    Ok(())
}

/// Admin commands for editing scores directly.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("set", "adjust"),
    check = "admin_check"
)]
pub async fn score(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Overwrite a member's score.
#[poise::command(slash_command, guild_only, check = "admin_check")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Member whose score to set"] user: serenity::User,
    #[description = "New score"] score: i64,
) -> Result<(), Error> {
    if user.bot {
        ctx.say("Bots can't get points silly :)").await?;
        return Ok(());
    }

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    ctx.data()
        .scores
        .set_score(guild_id, user.id.get(), score)
        .await?;
    ctx.say(format!("Set {}'s score to **{}**.", user.name, score))
        .await?;

    Ok(())
}

/// Give points to (or take points from) a member.
#[poise::command(slash_command, guild_only, check = "admin_check")]
pub async fn adjust(
    ctx: Context<'_>,
    #[description = "Member to adjust"] user: serenity::User,
    #[description = "Points to add (negative to take)"] points: i64,
) -> Result<(), Error> {
    if user.bot {
        ctx.say("Bots can't get points silly :)").await?;
        return Ok(());
    }

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    ctx.data()
        .scores
        .increment(
            guild_id,
            user.id.get(),
            points,
            ctx.data().config.event_multiplier(),
            "admin adjustment",
        )
        .await?;

    if points >= 0 {
        ctx.say(format!("Gave {} **{}** points.", user.name, points))
            .await?;
    } else {
        ctx.say(format!("Took **{}** points from {}.", -points, user.name))
            .await?;
    }

    Ok(())
}

/// Member ids currently in the guild, from cache only. `None` when the
/// guild isn't cached.
pub fn present_members(ctx: &Context<'_>, guild_id: u64) -> Option<HashSet<u64>> {
    ctx.serenity_context()
        .cache
        .guild(serenity::GuildId::new(guild_id))
        .map(|guild| guild.members.keys().map(|id| id.get()).collect())
}

/// Resolve a human-friendly display name for a user.
///
/// Cache ONLY - no HTTP calls, a leaderboard page would make up to 15 of
/// them. Falls back to a mention, which Discord renders fine.
pub fn resolve_display_name_cached(ctx: &Context<'_>, guild_id: u64, user_id: u64) -> String {
    let guild_id_s = serenity::GuildId::new(guild_id);
    let user_id_s = serenity::UserId::new(user_id);

    if let Some(guild) = ctx.serenity_context().cache.guild(guild_id_s) {
        if let Some(member) = guild.members.get(&user_id_s) {
            // display_name() prefers nick over username
            return member.display_name().to_string();
        }
    }

    if let Some(user) = ctx.serenity_context().cache.user(user_id_s) {
        return user.name.clone();
    }

    format!("<@{}>", user_id)
}

pub fn make_ordinal(place: usize) -> String {
    let suffix = match (place % 10, place % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", place, suffix)
}

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
/// This is where we store our services and configuration.
use std::sync::Arc;

pub struct Data {
    pub config: Arc<BotConfig>,
    pub scores: Arc<ScoreService<SqliteScoreStore>>,
    pub dailies: Arc<DailyService<SqliteDailyStore>>,
    pub gamenights: Arc<GamenightService<SqliteGamenightStore>>,
    pub lottery: Arc<LotteryService<SqliteLotteryStore>>,
}
