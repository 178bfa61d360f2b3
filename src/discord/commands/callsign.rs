// `/callsign` - unit callsign registry.

use crate::core::formatting::truncate;
use crate::discord::checks::{management_only, staff_only};
use crate::discord::{embeds, Context, Error, OrReject};
use poise::serenity_prelude as serenity;

/// Unit callsigns
#[poise::command(
    slash_command,
    guild_only,
    subcommands("assign", "release", "view", "list")
)]
pub async fn callsign(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Give a member a callsign (replaces their old one)
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn assign(
    ctx: Context<'_>,
    #[description = "Member"] member: serenity::User,
    #[description = "Callsign, e.g. 2A-14"] callsign: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let assigned = ctx
        .data()
        .callsigns
        .assign(guild_id, member.id.get(), &callsign)
        .await
        .or_reject()?;

    ctx.send(poise::CreateReply::default().embed(embeds::success(
        "Callsign assigned",
        format!("<@{}> is now **{}**.", assigned.user_id, assigned.callsign),
    )))
    .await?;
    Ok(())
}

/// Take a member's callsign away
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn release(
    ctx: Context<'_>,
    #[description = "Member"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    ctx.data()
        .callsigns
        .release(guild_id, member.id.get())
        .await
        .or_reject()?;

    ctx.send(poise::CreateReply::default().embed(embeds::success(
        "Callsign released",
        format!("<@{}> no longer has a callsign.", member.id),
    )))
    .await?;
    Ok(())
}

/// Show a member's callsign
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn view(
    ctx: Context<'_>,
    #[description = "Member (defaults to you)"] member: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = member
        .as_ref()
        .map(|u| u.id.get())
        .unwrap_or_else(|| ctx.author().id.get());

    let description = match ctx
        .data()
        .callsigns
        .for_user(guild_id, user_id)
        .await
        .or_reject()?
    {
        Some(c) => format!(
            "<@{}> is **{}** (since {}).",
            user_id,
            c.callsign,
            embeds::timestamp(c.assigned_at, 'D')
        ),
        None => format!("<@{}> has no callsign.", user_id),
    };
    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::info("📻 Callsign", description))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// List every callsign in use
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let callsigns = ctx.data().callsigns.list(guild_id).await.or_reject()?;

    let description = if callsigns.is_empty() {
        "No callsigns have been assigned.".to_string()
    } else {
        truncate(
            &callsigns
                .iter()
                .map(|c| format!("`{}` <@{}>", c.callsign, c.user_id))
                .collect::<Vec<_>>()
                .join("\n"),
            4096,
        )
    };

    ctx.send(poise::CreateReply::default().embed(embeds::info(
        format!("📻 Callsigns ({})", callsigns.len()),
        description,
    )))
    .await?;
    Ok(())
}
