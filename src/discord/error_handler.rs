// Central poise error handler.

use crate::discord::{Data, Error};
use poise::FrameworkError;

pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to start bot: {error:?}");
        }
        FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(command = %ctx.command().name, "Command failed: {error:?}");
            let _ = ctx
                .say("Something went wrong running that command, sorry!")
                .await;
        }
        FrameworkError::CommandCheckFailed { ctx, .. } => {
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("Hey, you don't have permission to do that :)")
                        .ephemeral(true),
                )
                .await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {e}");
            }
        }
    }
}
