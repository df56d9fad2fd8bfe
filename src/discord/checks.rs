// Admin gate for the moderation-flavored commands.
//
// Admins are configured per guild, either by user id or by role id. This is
// deliberately separate from Discord's own permission system so server
// owners can hand out score administration without Manage Server.

use crate::discord::{Context, Error};

pub async fn admin_check(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let Some(guild) = ctx.data().config.guild(guild_id.get()) else {
        return Ok(false);
    };

    let author_id = ctx.author().id.get();
    if guild.admins.users.contains(&author_id) {
        return Ok(true);
    }

    if let Some(member) = ctx.author_member().await {
        let is_admin = member
            .roles
            .iter()
            .any(|role| guild.admins.roles.contains(&role.get()));
        return Ok(is_admin);
    }

    Ok(false)
}
