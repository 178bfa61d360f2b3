// `/roblox` - resolve a Roblox account by username or id.

use crate::core::roblox::RobloxUser;
use crate::discord::checks::staff_only;
use crate::discord::{embeds, reject, Context, Error, OrReject};
use poise::serenity_prelude as serenity;

/// Roblox tools
#[poise::command(slash_command, guild_only, subcommands("lookup", "id"))]
pub async fn roblox(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn profile_embed(user: &RobloxUser) -> serenity::CreateEmbed {
    embeds::info(format!("🎮 {}", user.display_name), format!("@{}", user.name))
        .url(user.profile_url())
        .field("User ID", user.id.to_string(), true)
        .field("Profile", format!("[Open]({})", user.profile_url()), true)
}

/// Look up a Roblox account
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 5)]
pub async fn lookup(
    ctx: Context<'_>,
    #[description = "Roblox username"] username: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let Some(user) = ctx.data().roblox.lookup(&username).await.or_reject()? else {
        return reject(format!("No Roblox account is named **{}**.", username.trim()));
    };

    ctx.send(poise::CreateReply::default().embed(profile_embed(&user)))
        .await?;
    Ok(())
}

/// Look up a Roblox account by its numeric id
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 5)]
pub async fn id(
    ctx: Context<'_>,
    #[description = "Roblox user id"] user_id: u64,
) -> Result<(), Error> {
    ctx.defer().await?;
    let Some(user) = ctx.data().roblox.get_user(user_id).await.or_reject()? else {
        return reject(format!("No Roblox account has id **{}**.", user_id));
    };

    ctx.send(poise::CreateReply::default().embed(profile_embed(&user)))
        .await?;
    Ok(())
}
