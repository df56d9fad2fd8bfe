// Picture 8-ball: answers come from a per-guild folder of images that
// admins curate on the bot host. No database involved.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;

const ANSWERS_DIR: &str = "8ball";

/// Ask the magic 8-ball a question.
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let Some(answer) = pick_answer(guild_id) else {
        ctx.send(
            poise::CreateReply::default()
                .content("The 8-ball has no answers for this server yet.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    ctx.defer().await?;
    let attachment = serenity::CreateAttachment::path(&answer).await?;
    ctx.send(
        poise::CreateReply::default()
            .content(format!("> {}", question))
            .attachment(attachment),
    )
    .await?;

    Ok(())
}

fn pick_answer(guild_id: u64) -> Option<PathBuf> {
    let dir = PathBuf::from(ANSWERS_DIR).join(guild_id.to_string());
    let files: Vec<PathBuf> = std::fs::read_dir(&dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);
    files.choose(&mut rng).cloned()
}
