// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers and background loops

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::dailies::DailyService;
use crate::core::gamenights::GamenightService;
use crate::core::lottery::LotteryService;
use crate::core::schedule;
use crate::core::scores::ScoreService;
use crate::discord::{bonus_roles, daily_messages, error_handler, gamenight_events};
use crate::discord::{Data, Error};
use crate::infra::dailies::SqliteDailyStore;
use crate::infra::gamenights::SqliteGamenightStore;
use crate::infra::lottery::SqliteLotteryStore;
use crate::infra::scores::SqliteScoreStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events: message-driven daily
/// rewards and voice tracking for game nights.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            daily_messages::handle_message(ctx, data, new_message).await?;
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            gamenight_events::handle_voice_state_update(ctx, data, old.as_ref(), new).await?;
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Arc::new(match BotConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load {config_path} ({e:#}); starting with defaults");
            BotConfig::default()
        }
    });

    // Keep the runtime database in a dedicated folder so the repo root
    // stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let db_path = format!("{}/scorekeeper.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = infra::db::connect(&db_path)
        .await
        .expect("Failed to open SQLite database");

    let score_store = SqliteScoreStore::new(pool.clone());
    score_store
        .migrate()
        .await
        .expect("Failed to migrate scores tables");
    let daily_store = SqliteDailyStore::new(pool.clone());
    daily_store
        .migrate()
        .await
        .expect("Failed to migrate daily tables");
    let gamenight_store = SqliteGamenightStore::new(pool.clone());
    gamenight_store
        .migrate()
        .await
        .expect("Failed to migrate game night tables");
    let lottery_store = SqliteLotteryStore::new(pool.clone());
    lottery_store
        .migrate()
        .await
        .expect("Failed to migrate lottery table");

    // Score changes announce their guild here; a background task resyncs
    // the bonus role for each announced guild.
    let (score_changed_tx, mut score_changed_rx) = tokio::sync::mpsc::unbounded_channel();
    let startup_sync_tx = score_changed_tx.clone();

    let scores_service = Arc::new(ScoreService::with_notifier(score_store, score_changed_tx));
    let dailies_service = Arc::new(DailyService::new(daily_store));
    let gamenights_service = Arc::new(GamenightService::new(gamenight_store));
    let lottery_service = Arc::new(LotteryService::new(lottery_store));

    // Create the data structure that will be shared across all commands
    let data = Data {
        config: Arc::clone(&config),
        scores: Arc::clone(&scores_service),
        dailies: Arc::clone(&dailies_service),
        gamenights: Arc::clone(&gamenights_service),
        lottery: Arc::clone(&lottery_service),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required for the door phrase
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::scores::leaderboard(),
                discord::commands::scores::rank(),
                discord::commands::scores::total(),
                discord::commands::scores::score(),
                discord::commands::dailies::daily(),
                discord::commands::gamenights::gamenight(),
                discord::commands::lottery::buyticket(),
                discord::commands::eightball::ask(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(error_handler::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up");

                // Register slash commands globally (can take up to an hour
                // to propagate). For faster development, use
                // register_in_guild instead.
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                // Background bonus role synchronizer, fed by the ledger's
                // score-changed channel.
                let sync_ctx = ctx.clone();
                let sync_config = Arc::clone(&data.config);
                let sync_scores = Arc::clone(&data.scores);
                tokio::spawn(async move {
                    while let Some(guild_id) = score_changed_rx.recv().await {
                        if let Err(e) = bonus_roles::sync_bonus_roles(
                            &sync_ctx,
                            &sync_config,
                            &sync_scores,
                            guild_id,
                        )
                        .await
                        {
                            tracing::error!(guild_id, "bonus role sync failed: {e:?}");
                        }
                    }
                });

                // Roles may have drifted while the bot was offline, so
                // queue a sync for every guild we're in.
                for guild_id in ctx.cache.guilds() {
                    let _ = startup_sync_tx.send(guild_id.get());
                }

                // Daily reset loop: clear the claim tables at 23:58 local
                // and sweep voice logs for channels without a session.
                let reset_config = Arc::clone(&data.config);
                let reset_dailies = Arc::clone(&data.dailies);
                let reset_gamenights = Arc::clone(&data.gamenights);
                tokio::spawn(async move {
                    let tz = reset_config.timezone();
                    loop {
                        let now = chrono::Utc::now().with_timezone(&tz);
                        let Some(next) = schedule::next_daily_reset(&now) else {
                            tracing::error!("could not compute the next daily reset, giving up");
                            return;
                        };
                        let wait = (next - now).to_std().unwrap_or_default();
                        tokio::time::sleep(wait).await;

                        if let Err(e) = reset_dailies.reset_claims().await {
                            tracing::error!("daily reset failed: {e}");
                        }
                        if let Err(e) = reset_gamenights.clear_idle_voice_logs().await {
                            tracing::error!("voice log sweep failed: {e}");
                        }
                    }
                });

                // Weekly lottery loop. If the process slept through this
                // week's draw, run a make-up draw right away.
                let lottery_ctx = ctx.clone();
                let lottery_config = Arc::clone(&data.config);
                let lottery_service = Arc::clone(&data.lottery);
                let lottery_scores = Arc::clone(&data.scores);
                tokio::spawn(async move {
                    let tz = lottery_config.timezone();

                    let now = chrono::Utc::now().with_timezone(&tz);
                    if let Some((_, missed)) = schedule::next_weekly_draw(&now) {
                        if missed {
                            tracing::info!("missed a lottery draw while offline, drawing now");
                            run_lottery_draw(
                                &lottery_ctx,
                                &lottery_config,
                                &lottery_service,
                                &lottery_scores,
                            )
                            .await;
                        }
                    }

                    loop {
                        let now = chrono::Utc::now().with_timezone(&tz);
                        let Some((next, _)) = schedule::next_weekly_draw(&now) else {
                            tracing::error!("could not compute the next lottery draw, giving up");
                            return;
                        };
                        let wait = (next - now).to_std().unwrap_or_default();
                        tokio::time::sleep(wait).await;

                        run_lottery_draw(
                            &lottery_ctx,
                            &lottery_config,
                            &lottery_service,
                            &lottery_scores,
                        )
                        .await;
                    }
                });

                tracing::info!("Bot is ready");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}

/// Run the weekly draw for every guild with tickets, credit the winners
/// and announce results in each guild's configured lottery channel.
async fn run_lottery_draw(
    ctx: &serenity::Context,
    config: &BotConfig,
    lottery: &LotteryService<SqliteLotteryStore>,
    scores: &ScoreService<SqliteScoreStore>,
) {
    let results = match lottery.draw().await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("lottery draw failed: {e}");
            return;
        }
    };

    let tz = config.timezone();
    for result in results {
        if let Err(e) = scores
            .increment(
                result.guild_id,
                result.winner,
                result.prize,
                config.event_multiplier(),
                "lottery winnings",
            )
            .await
        {
            tracing::error!(
                guild_id = result.guild_id,
                winner = result.winner,
                "failed to credit lottery prize: {e}"
            );
            continue;
        }

        let Some(channel) = config
            .guild(result.guild_id)
            .and_then(|guild| guild.lottery_channel)
        else {
            continue;
        };

        let entrants_text = if result.entrants == 1 {
            "1 person entered".to_string()
        } else {
            format!("{} people entered", result.entrants)
        };
        let mut text = format!(
            "<@{}> just won **{}** points in the lottery! ({} this round)",
            result.winner, result.prize, entrants_text
        );
        let now = chrono::Utc::now().with_timezone(&tz);
        if let Some((next, _)) = schedule::next_weekly_draw(&now) {
            text.push_str(&format!(
                "\nThe next drawing will be at <t:{}:F>. Buy a ticket with /buyticket!",
                next.timestamp()
            ));
        }

        if let Err(e) = serenity::ChannelId::new(channel)
            .say(&ctx.http, text)
            .await
        {
            tracing::warn!(
                guild_id = result.guild_id,
                "failed to announce lottery result: {e}"
            );
        }
    }
}
