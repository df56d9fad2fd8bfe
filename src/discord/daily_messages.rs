// Message-driven daily rewards: channel bonuses and the door to darkness.

use crate::core::dailies::mentions_door;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<(), Error> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let guild_id = guild_id.get();
    let user_id = msg.author.id.get();
    let multiplier = data.config.event_multiplier();

    // Channel daily bonus. Embeds count as attachments so links to images
    // qualify in picture channels.
    let has_attachment = !msg.attachments.is_empty() || !msg.embeds.is_empty();
    if let Some(points) = data
        .dailies
        .message_bonus(guild_id, msg.channel_id.get(), user_id, has_attachment)
        .await?
    {
        data.scores
            .increment(guild_id, user_id, points, multiplier, "channel daily bonus")
            .await?;
    }

    // The door to darkness: mention the configured member together with
    // the magic phrase, once per day.
    let door_member = data.config.guild(guild_id).and_then(|g| g.door_member);
    if let Some(door_member) = door_member {
        let mentions_member = msg.mentions.iter().any(|user| user.id.get() == door_member);
        if mentions_member && mentions_door(&msg.content) {
            if let Some(points) = data.dailies.claim_door(guild_id, user_id).await? {
                data.scores
                    .increment(guild_id, user_id, points, multiplier, "door to darkness")
                    .await?;
                let _ = msg.react(&ctx.http, '🚪').await;
            }
        }
    }

    Ok(())
}
