// `/loa` - leave of absence requests and their review.

use crate::core::formatting::parse_duration;
use crate::core::guild_settings::LogChannelKind;
use crate::core::leave::{LeaveNotice, LeaveStatus};
use crate::discord::checks::{management_only, staff_only};
use crate::discord::embeds::{self, COLOR_ERROR, COLOR_INFO, COLOR_WARNING};
use crate::discord::leave_tasks::{leave_finished, leave_started};
use crate::discord::members::notify;
use crate::discord::{reject, Context, Error, OrReject};
use chrono::Utc;
use poise::serenity_prelude as serenity;

const RECENT_NOTICES: usize = 5;

/// Leave of absence
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "request",
        "cancel",
        "end",
        "status",
        "list",
        "approve",
        "deny",
        "extend",
        "admin_end"
    )
)]
pub async fn loa(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn parse_length(raw: &str) -> Result<std::time::Duration, Error> {
    parse_duration(raw).ok_or_else(|| {
        crate::discord::UserError::boxed(format!(
            "'{}' isn't a length I understand. Try `5d`, `2w` or `10 days`.",
            raw
        ))
    })
}

async fn post_leave_log(ctx: Context<'_>, guild_id: u64, embed: serenity::CreateEmbed) {
    match ctx.data().settings.get(guild_id).await {
        Ok(settings) => {
            embeds::send_log(ctx.http(), settings.log_channel(LogChannelKind::Leave), embed).await
        }
        Err(e) => tracing::warn!(guild_id, error = %e, "Could not load settings for LOA log"),
    }
}

fn summary_line(notice: &LeaveNotice) -> String {
    let when = match (notice.status, notice.ends_at) {
        (LeaveStatus::Approved, Some(end)) => format!("ends {}", embeds::timestamp(end, 'R')),
        _ => format!("requested {}", embeds::timestamp(notice.requested_at, 'R')),
    };
    format!(
        "`#{}` <@{}> · {} · {}",
        notice.id,
        notice.user_id,
        embeds::chrono_duration(notice.duration()),
        when
    )
}

/// Request a leave of absence
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 30)]
pub async fn request(
    ctx: Context<'_>,
    #[description = "How long (e.g. 5d, 2w)"] length: String,
    #[description = "Why you'll be away"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let duration = parse_length(&length)?;

    let notice = ctx
        .data()
        .leave
        .request(guild_id, ctx.author().id.get(), &reason, duration)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(
                embeds::leave_notice("📨 LOA requested", &notice, COLOR_INFO).footer(
                    serenity::CreateEmbedFooter::new(
                        "Management will review it. Your leave starts once it's approved.",
                    ),
                ),
            )
            .ephemeral(true),
    )
    .await?;

    post_leave_log(
        ctx,
        guild_id,
        embeds::leave_notice("📨 LOA requested", &notice, COLOR_INFO),
    )
    .await;
    Ok(())
}

/// Withdraw your pending request
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let notice = ctx
        .data()
        .leave
        .cancel(guild_id, ctx.author().id.get())
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success(
                "Request withdrawn",
                format!("LOA request #{} was cancelled.", notice.id),
            ))
            .ephemeral(true),
    )
    .await?;

    post_leave_log(
        ctx,
        guild_id,
        embeds::leave_notice("🚫 LOA cancelled", &notice, COLOR_WARNING),
    )
    .await;
    Ok(())
}

/// Come back from leave early
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn end(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = ctx.author().id.get();

    let Some(active) = ctx
        .data()
        .leave
        .active_for(guild_id, user_id)
        .await
        .or_reject()?
    else {
        return reject("You are not on leave.");
    };

    let notice = ctx
        .data()
        .leave
        .end_early(guild_id, active.id, user_id, false)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success("Welcome back", "Your leave has ended."))
            .ephemeral(true),
    )
    .await?;

    leave_finished(ctx.http(), &ctx.data().settings, &notice, "ended early").await;
    Ok(())
}

/// Show your (or another member's) leave status
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn status(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] member: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = member
        .as_ref()
        .map(|u| u.id.get())
        .unwrap_or_else(|| ctx.author().id.get());

    let open = ctx
        .data()
        .leave
        .open_for(guild_id, user_id)
        .await
        .or_reject()?;
    let history = ctx
        .data()
        .leave
        .history(guild_id, user_id)
        .await
        .or_reject()?;

    let mut embed = match &open {
        Some(notice) => {
            let embed = embeds::leave_notice("🏝️ Leave status", notice, COLOR_INFO);
            match notice.status {
                LeaveStatus::Approved => embed.field(
                    "Time left",
                    embeds::chrono_duration(notice.remaining(Utc::now())),
                    true,
                ),
                _ => embed,
            }
        }
        None => embeds::info("🏝️ Leave status", format!("<@{}> is not on leave.", user_id)),
    };

    let past: Vec<String> = history
        .iter()
        .filter(|n| !n.status.is_open())
        .take(RECENT_NOTICES)
        .map(|n| format!("`#{}` {} · {}", n.id, n.status, embeds::chrono_duration(n.duration())))
        .collect();
    if !past.is_empty() {
        embed = embed.field("Previous notices", past.join("\n"), false);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// List pending requests and members currently on leave
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let pending = ctx.data().leave.pending(guild_id).await.or_reject()?;
    let active = ctx.data().leave.active(guild_id).await.or_reject()?;

    let render = |notices: &[LeaveNotice]| {
        if notices.is_empty() {
            "None".to_string()
        } else {
            crate::core::formatting::truncate(
                &notices
                    .iter()
                    .map(summary_line)
                    .collect::<Vec<_>>()
                    .join("\n"),
                embeds::FIELD_LIMIT,
            )
        }
    };

    let embed = embeds::info("🏝️ Leave overview", "Approve or deny with `/loa approve` and `/loa deny`.")
        .field(format!("Pending ({})", pending.len()), render(&pending), false)
        .field(format!("On leave ({})", active.len()), render(&active), false);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Approve a leave request
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn approve(
    ctx: Context<'_>,
    #[description = "LOA ID"] id: i64,
    #[description = "Note for the member"] note: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let notice = ctx
        .data()
        .leave
        .approve(guild_id, id, ctx.author().id.get(), note)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success(
                "LOA approved",
                format!(
                    "<@{}> is on leave until {}.",
                    notice.user_id,
                    notice
                        .ends_at
                        .map(|end| embeds::timestamp(end, 'f'))
                        .unwrap_or_default()
                ),
            ))
            .ephemeral(true),
    )
    .await?;

    leave_started(ctx.http(), &ctx.data().settings, &notice).await;
    Ok(())
}

/// Deny a leave request
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn deny(
    ctx: Context<'_>,
    #[description = "LOA ID"] id: i64,
    #[description = "Reason shown to the member"] note: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let notice = ctx
        .data()
        .leave
        .deny(guild_id, id, ctx.author().id.get(), note)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success(
                "LOA denied",
                format!("Request #{} from <@{}> was denied.", notice.id, notice.user_id),
            ))
            .ephemeral(true),
    )
    .await?;

    let embed = embeds::leave_notice("❌ LOA denied", &notice, COLOR_ERROR);
    notify(ctx.http(), notice.user_id, embed.clone()).await;
    post_leave_log(ctx, guild_id, embed).await;
    Ok(())
}

/// Extend an approved leave
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn extend(
    ctx: Context<'_>,
    #[description = "LOA ID"] id: i64,
    #[description = "Extra time (e.g. 3d, 1w)"] length: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let extra = parse_length(&length)?;

    let notice = ctx
        .data()
        .leave
        .extend(guild_id, id, extra)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success(
                "LOA extended",
                format!(
                    "<@{}>'s leave now ends {}.",
                    notice.user_id,
                    notice
                        .ends_at
                        .map(|end| embeds::timestamp(end, 'f'))
                        .unwrap_or_default()
                ),
            ))
            .ephemeral(true),
    )
    .await?;

    let embed = embeds::leave_notice("⏳ LOA extended", &notice, COLOR_INFO);
    notify(ctx.http(), notice.user_id, embed.clone()).await;
    post_leave_log(ctx, guild_id, embed).await;
    Ok(())
}

/// End someone's leave now
#[poise::command(
    slash_command,
    guild_only,
    rename = "admin-end",
    check = "management_only"
)]
pub async fn admin_end(
    ctx: Context<'_>,
    #[description = "LOA ID"] id: i64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let notice = ctx
        .data()
        .leave
        .end_early(guild_id, id, ctx.author().id.get(), true)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::success(
                "LOA ended",
                format!("<@{}>'s leave is over.", notice.user_id),
            ))
            .ephemeral(true),
    )
    .await?;

    leave_finished(ctx.http(), &ctx.data().settings, &notice, "ended by management").await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notice(status: LeaveStatus) -> LeaveNotice {
        let requested = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        LeaveNotice {
            id: 7,
            guild_id: 1,
            user_id: 42,
            reason: "Exams".to_string(),
            duration_secs: 3 * 86_400,
            requested_at: requested,
            starts_at: None,
            ends_at: Some(requested + chrono::Duration::days(3)),
            status,
            reviewer_id: None,
            review_note: None,
            extensions: 0,
        }
    }

    #[test]
    fn test_summary_line_shows_end_for_active_leave() {
        let line = summary_line(&notice(LeaveStatus::Approved));
        assert!(line.starts_with("`#7` <@42> · 3d"));
        assert!(line.contains("ends <t:"));

        let pending = summary_line(&notice(LeaveStatus::Pending));
        assert!(pending.contains("requested <t:"));
    }

    #[test]
    fn test_unparseable_length_is_a_user_error() {
        let err = parse_length("soon").unwrap_err();
        assert!(crate::discord::error_handler::user_message(&err)
            .is_some_and(|m| m.contains("soon")));
        assert_eq!(
            parse_length("2w").unwrap(),
            std::time::Duration::from_secs(14 * 86_400)
        );
    }
}
