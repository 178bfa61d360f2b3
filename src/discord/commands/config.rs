// `/config` - per-guild setup. Management only.

use crate::core::guild_settings::{GuildSettings, LogChannelKind, RoleListKind};
use crate::discord::checks::management_only;
use crate::discord::commands::shift::autocomplete_shift_type;
use crate::discord::{embeds, Context, Error, OrReject};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RoleListChoice {
    Management,
    Staff,
}

impl From<RoleListChoice> for RoleListKind {
    fn from(value: RoleListChoice) -> Self {
        match value {
            RoleListChoice::Management => RoleListKind::Management,
            RoleListChoice::Staff => RoleListKind::Staff,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LogChannelChoice {
    #[name = "Shift log"]
    Shifts,
    #[name = "LOA log"]
    Leave,
    #[name = "Records log"]
    Records,
}

impl From<LogChannelChoice> for LogChannelKind {
    fn from(value: LogChannelChoice) -> Self {
        match value {
            LogChannelChoice::Shifts => LogChannelKind::Shifts,
            LogChannelChoice::Leave => LogChannelKind::Leave,
            LogChannelChoice::Records => LogChannelKind::Records,
        }
    }
}

/// Configure the bot for this server
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "view",
        "roles",
        "shift_type_add",
        "shift_type_remove",
        "shift_type_default",
        "log_channel",
        "leave_role",
        "timezone",
        "quota"
    )
)]
pub async fn config(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn mention_roles(roles: &[u64]) -> String {
    if roles.is_empty() {
        "None".to_string()
    } else {
        roles
            .iter()
            .map(|r| format!("<@&{}>", r))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn mention_channel(channel: Option<u64>) -> String {
    channel
        .map(|c| format!("<#{}>", c))
        .unwrap_or_else(|| "Not set".to_string())
}

fn settings_embed(settings: &GuildSettings) -> serenity::CreateEmbed {
    let shift_types = if settings.shift_types.is_empty() {
        "None (everyone uses `Default`)".to_string()
    } else {
        settings
            .shift_types
            .iter()
            .map(|t| {
                let marker = if t.is_default { " ⭐" } else { "" };
                format!("• **{}**{} · {}", t.name, marker, mention_roles(&t.access_roles))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let quota = settings
        .shift_quota_minutes
        .map(|m| format!("{} minutes / week", m))
        .unwrap_or_else(|| "None".to_string());

    embeds::info("⚙️ Server configuration", "Current settings for this server.")
        .field("Management roles", mention_roles(&settings.management_roles), false)
        .field("Staff roles", mention_roles(&settings.staff_roles), false)
        .field("Shift types", shift_types, false)
        .field("Shift log", mention_channel(settings.shift_log_channel), true)
        .field("LOA log", mention_channel(settings.leave_log_channel), true)
        .field("Records log", mention_channel(settings.record_log_channel), true)
        .field(
            "LOA role",
            settings
                .leave_role
                .map(|r| format!("<@&{}>", r))
                .unwrap_or_else(|| "Not set".to_string()),
            true,
        )
        .field("Timezone", &settings.timezone, true)
        .field("Shift quota", quota, true)
}

async fn reply(ctx: Context<'_>, embed: serenity::CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Show the current configuration
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn view(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let settings = ctx.data().settings.get(guild_id).await.or_reject()?;
    reply(ctx, settings_embed(&settings)).await
}

/// Set the management or staff roles (leave every role empty to clear)
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn roles(
    ctx: Context<'_>,
    #[description = "Which role list to set"] kind: RoleListChoice,
    #[description = "Role"] role_1: Option<serenity::Role>,
    #[description = "Role"] role_2: Option<serenity::Role>,
    #[description = "Role"] role_3: Option<serenity::Role>,
    #[description = "Role"] role_4: Option<serenity::Role>,
    #[description = "Role"] role_5: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let roles: Vec<u64> = [role_1, role_2, role_3, role_4, role_5]
        .into_iter()
        .flatten()
        .map(|r| r.id.get())
        .collect();

    let settings = ctx
        .data()
        .settings
        .set_role_list(guild_id, kind.into(), roles)
        .await
        .or_reject()?;
    tracing::info!(guild_id, kind = ?kind, "Role list updated");

    let (label, list) = match RoleListKind::from(kind) {
        RoleListKind::Management => ("Management", &settings.management_roles),
        RoleListKind::Staff => ("Staff", &settings.staff_roles),
    };
    reply(
        ctx,
        embeds::success(format!("{} roles updated", label), mention_roles(list)),
    )
    .await
}

/// Create a shift type
#[poise::command(
    slash_command,
    guild_only,
    rename = "shift-type-add",
    check = "management_only"
)]
pub async fn shift_type_add(
    ctx: Context<'_>,
    #[description = "Shift type name"] name: String,
    #[description = "Only members with this role may start it"] access_role: Option<
        serenity::Role,
    >,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let access_roles = access_role.map(|r| vec![r.id.get()]).unwrap_or_default();

    let shift_type = ctx
        .data()
        .settings
        .add_shift_type(guild_id, &name, access_roles)
        .await
        .or_reject()?;

    let mut description = format!("Access: {}", mention_roles(&shift_type.access_roles));
    if shift_type.is_default {
        description.push_str("\nThis is now the default shift type.");
    }
    reply(
        ctx,
        embeds::success(format!("Shift type {} created", shift_type.name), description),
    )
    .await
}

/// Delete a shift type
#[poise::command(
    slash_command,
    guild_only,
    rename = "shift-type-remove",
    check = "management_only"
)]
pub async fn shift_type_remove(
    ctx: Context<'_>,
    #[description = "Shift type to delete"]
    #[autocomplete = "autocomplete_shift_type"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    ctx.data()
        .settings
        .remove_shift_type(guild_id, &name)
        .await
        .or_reject()?;
    reply(
        ctx,
        embeds::success(
            "Shift type deleted",
            format!("**{}** can no longer be started. Recorded shifts are kept.", name),
        ),
    )
    .await
}

/// Choose the shift type `/shift start` uses when none is given
#[poise::command(
    slash_command,
    guild_only,
    rename = "shift-type-default",
    check = "management_only"
)]
pub async fn shift_type_default(
    ctx: Context<'_>,
    #[description = "Shift type"]
    #[autocomplete = "autocomplete_shift_type"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    ctx.data()
        .settings
        .set_default_shift_type(guild_id, &name)
        .await
        .or_reject()?;
    reply(
        ctx,
        embeds::success("Default shift type set", format!("**{}** is now the default.", name)),
    )
    .await
}

/// Set or clear a log channel
#[poise::command(
    slash_command,
    guild_only,
    rename = "log-channel",
    check = "management_only"
)]
pub async fn log_channel(
    ctx: Context<'_>,
    #[description = "Which log"] kind: LogChannelChoice,
    #[description = "Channel (leave empty to turn the log off)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let channel_id = channel.map(|c| c.id.get());
    let kind = LogChannelKind::from(kind);

    ctx.data()
        .settings
        .set_channel(guild_id, kind, channel_id)
        .await
        .or_reject()?;
    tracing::info!(guild_id, kind = %kind, channel_id = ?channel_id, "Log channel updated");

    reply(
        ctx,
        embeds::success(format!("{} updated", kind), mention_channel(channel_id)),
    )
    .await
}

/// Set or clear the role given to members on leave
#[poise::command(
    slash_command,
    guild_only,
    rename = "leave-role",
    check = "management_only"
)]
pub async fn leave_role(
    ctx: Context<'_>,
    #[description = "Role (leave empty to clear)"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let role_id = role.map(|r| r.id.get());
    ctx.data()
        .settings
        .set_leave_role(guild_id, role_id)
        .await
        .or_reject()?;

    let description = role_id
        .map(|r| format!("Members on approved leave get <@&{}>.", r))
        .unwrap_or_else(|| "No role is given for leave.".to_string());
    reply(ctx, embeds::success("LOA role updated", description)).await
}

/// Set the timezone used for dates (e.g. America/New_York)
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn timezone(
    ctx: Context<'_>,
    #[description = "IANA timezone name"] name: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let settings = ctx
        .data()
        .settings
        .set_timezone(guild_id, &name)
        .await
        .or_reject()?;
    reply(
        ctx,
        embeds::success("Timezone updated", format!("Dates now use **{}**.", settings.timezone)),
    )
    .await
}

/// Set the weekly on-duty quota in minutes (leave empty or 0 to clear)
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn quota(
    ctx: Context<'_>,
    #[description = "Minutes per week"] minutes: Option<u32>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let settings = ctx
        .data()
        .settings
        .set_shift_quota(guild_id, minutes)
        .await
        .or_reject()?;

    let description = match settings.shift_quota_minutes {
        Some(m) => format!("Members are expected to log **{}** minutes per week.", m),
        None => "Shift quota removed.".to_string(),
    };
    reply(ctx, embeds::success("Shift quota updated", description)).await
}
