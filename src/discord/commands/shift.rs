// `/shift` - clocking in and out, breaks and time reports.

use crate::core::formatting::{format_duration, parse_duration, truncate};
use crate::core::guild_settings::LogChannelKind;
use crate::core::shifts::{Shift, ShiftFilter, ShiftStatus, ShiftSummary};
use crate::discord::checks::{management_only, staff_only};
use crate::discord::embeds::{self, chrono_duration};
use crate::discord::members::author_roles;
use crate::discord::{reject, Context, Error, OrReject};
use chrono::{DateTime, Duration, Utc};
use poise::serenity_prelude as serenity;

const HISTORY_LIMIT: usize = 10;
const LEADERBOARD_SIZE: usize = 15;
const MAX_PERIOD_DAYS: i64 = 365;

/// Track duty shifts
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "start",
        "break_toggle",
        "end",
        "void",
        "active",
        "status",
        "history",
        "leaderboard",
        "wipe"
    )
)]
pub async fn shift(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Shift type names for this guild matching what the member typed so far.
pub async fn autocomplete_shift_type<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let names: Vec<String> = match ctx.guild_id() {
        Some(guild_id) => match ctx.data().settings.get(guild_id.get()).await {
            Ok(settings) if !settings.shift_types.is_empty() => {
                settings.shift_types.into_iter().map(|t| t.name).collect()
            }
            Ok(_) => vec![crate::core::guild_settings::IMPLICIT_SHIFT_TYPE.to_string()],
            Err(e) => {
                tracing::warn!(error = %e, "Shift type autocomplete failed");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    names
        .into_iter()
        .filter(move |name| name.to_lowercase().contains(&partial.to_lowercase()))
        .take(25)
}

fn format_local(at: DateTime<Utc>, tz: chrono_tz::Tz) -> String {
    at.with_timezone(&tz).format("%b %d, %H:%M").to_string()
}

/// Minutes expected over `period` for a weekly quota, rounded down.
pub fn expected_minutes(weekly_quota: u32, period: Duration) -> i64 {
    let minutes = i128::from(weekly_quota) * i128::from(period.num_seconds())
        / i128::from(Duration::weeks(1).num_seconds());
    i64::try_from(minutes).unwrap_or(i64::MAX)
}

fn leaderboard_lines(board: &[ShiftSummary], expected: Option<i64>) -> String {
    board
        .iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, entry)| {
            let medal = match i {
                0 => "🥇",
                1 => "🥈",
                2 => "🥉",
                _ => "▫️",
            };
            let marker = match expected {
                Some(min) if entry.total.num_minutes() >= min => " ✅",
                Some(_) => " ❌",
                None => "",
            };
            format!(
                "{} **#{}** <@{}> · {} ({} shifts){}",
                medal,
                i + 1,
                entry.user_id,
                chrono_duration(entry.total),
                entry.shift_count,
                marker
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn log_shift(ctx: Context<'_>, guild_id: u64, action: &str, shift: &Shift) {
    match ctx.data().settings.get(guild_id).await {
        Ok(settings) => {
            let embed = embeds::shift_event(action, shift, Utc::now());
            embeds::send_log(ctx.http(), settings.log_channel(LogChannelKind::Shifts), embed).await;
        }
        Err(e) => tracing::warn!(guild_id, error = %e, "Could not load settings for shift log"),
    }
}

/// Go on duty
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 5)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Shift type (defaults to the server's default type)"]
    #[autocomplete = "autocomplete_shift_type"]
    shift_type: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = ctx.author().id.get();

    if let Some(notice) = ctx
        .data()
        .leave
        .active_for(guild_id, user_id)
        .await
        .or_reject()?
    {
        return reject(format!(
            "You are on leave until {}. End it with `/loa end` before starting a shift.",
            notice
                .ends_at
                .map(|end| embeds::timestamp(end, 'f'))
                .unwrap_or_else(|| "further notice".to_string())
        ));
    }

    let shift_type = ctx
        .data()
        .settings
        .resolve_shift_type(guild_id, shift_type.as_deref())
        .await
        .or_reject()?;
    let roles = author_roles(ctx).await;

    let shift = ctx
        .data()
        .shifts
        .start(guild_id, user_id, &shift_type, &roles)
        .await
        .or_reject()?;

    ctx.send(poise::CreateReply::default().embed(embeds::success(
        "On duty",
        format!(
            "Your **{}** shift started {}.",
            shift.shift_type,
            embeds::timestamp(shift.started_at, 'R')
        ),
    )))
    .await?;

    log_shift(ctx, guild_id, "started", &shift).await;
    Ok(())
}

/// Start or end a break
#[poise::command(
    slash_command,
    guild_only,
    rename = "break",
    check = "staff_only",
    user_cooldown = 5
)]
pub async fn break_toggle(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let shift = ctx
        .data()
        .shifts
        .toggle_break(guild_id, ctx.author().id.get())
        .await
        .or_reject()?;

    let now = Utc::now();
    let embed = match shift.status() {
        ShiftStatus::OnBreak => embeds::info(
            "☕ On break",
            "Run `/shift break` again when you're back.",
        ),
        _ => embeds::success(
            "Back on duty",
            format!("Total break time: {}", chrono_duration(shift.break_time(now))),
        ),
    };
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    let action = match shift.status() {
        ShiftStatus::OnBreak => "break started",
        _ => "break ended",
    };
    log_shift(ctx, guild_id, action, &shift).await;
    Ok(())
}

/// Go off duty
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 5)]
pub async fn end(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let shift = ctx
        .data()
        .shifts
        .end(guild_id, ctx.author().id.get())
        .await
        .or_reject()?;

    let now = Utc::now();
    let embed = embeds::success(
        "Off duty",
        format!(
            "Your **{}** shift lasted **{}**.",
            shift.shift_type,
            chrono_duration(shift.duty_time(now))
        ),
    )
    .field("Breaks", shift.breaks.len().to_string(), true)
    .field("Break time", chrono_duration(shift.break_time(now)), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    log_shift(ctx, guild_id, "ended", &shift).await;
    Ok(())
}

/// Cancel a member's active shift without recording it
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn void(
    ctx: Context<'_>,
    #[description = "Member whose shift to void"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = member.id.get();
    if ctx
        .data()
        .shifts
        .active(guild_id, user_id)
        .await
        .or_reject()?
        .is_none()
    {
        return reject(format!("{} is not on duty", member.name));
    }
    let shift = ctx
        .data()
        .shifts
        .void(guild_id, user_id)
        .await
        .or_reject()?;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::warning(
                "Shift voided",
                format!(
                    "<@{}>'s **{}** shift was removed and won't count.",
                    shift.user_id, shift.shift_type
                ),
            ))
            .ephemeral(true),
    )
    .await?;

    log_shift(ctx, guild_id, "voided", &shift).await;
    Ok(())
}

/// List everyone currently on duty
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn active(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let shifts = ctx
        .data()
        .shifts
        .active_in_guild(guild_id)
        .await
        .or_reject()?;

    if shifts.is_empty() {
        ctx.send(poise::CreateReply::default().embed(embeds::info(
            "🚓 Active shifts",
            "Nobody is on duty right now.",
        )))
        .await?;
        return Ok(());
    }

    let now = Utc::now();
    let lines = shifts
        .iter()
        .map(|s| {
            let icon = match s.status() {
                ShiftStatus::OnBreak => "☕",
                _ => "🟢",
            };
            format!(
                "{} <@{}> · {} · {}",
                icon,
                s.user_id,
                s.shift_type,
                chrono_duration(s.duty_time(now))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    ctx.send(poise::CreateReply::default().embed(embeds::info(
        format!("🚓 Active shifts ({})", shifts.len()),
        truncate(&lines, 4096),
    )))
    .await?;
    Ok(())
}

/// Show your (or another member's) duty status and totals
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn status(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] member: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user = member.as_ref().unwrap_or_else(|| ctx.author());
    let user_id = user.id.get();

    let current = ctx
        .data()
        .shifts
        .active(guild_id, user_id)
        .await
        .or_reject()?;
    let summary = ctx
        .data()
        .shifts
        .summary(guild_id, user_id)
        .await
        .or_reject()?;

    let now = Utc::now();
    let mut embed = match &current {
        Some(shift) => embeds::shift_event("status", shift, now),
        None => embeds::info("🚓 Shift status", format!("<@{}> is off duty.", user_id)),
    };
    embed = embed
        .field("Shifts logged", summary.shift_count.to_string(), true)
        .field("Total time", chrono_duration(summary.total), true)
        .field("Average shift", chrono_duration(summary.average()), true);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show recent shifts
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn history(
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

    let tz = ctx.data().settings.get(guild_id).await.or_reject()?.tz();
    let shifts = ctx
        .data()
        .shifts
        .history(guild_id, user_id, HISTORY_LIMIT)
        .await
        .or_reject()?;

    if shifts.is_empty() {
        ctx.send(poise::CreateReply::default().embed(embeds::info(
            "📋 Shift history",
            format!("<@{}> hasn't logged any shifts yet.", user_id),
        )))
        .await?;
        return Ok(());
    }

    let now = Utc::now();
    let lines = shifts
        .iter()
        .map(|s| {
            let end = s
                .ended_at
                .map(|e| format_local(e, tz))
                .unwrap_or_else(|| s.status().to_string());
            format!(
                "`#{}` **{}** · {} → {} · {}",
                s.id,
                s.shift_type,
                format_local(s.started_at, tz),
                end,
                chrono_duration(s.duty_time(now))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = embeds::info("📋 Shift history", lines)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Last {} shifts · times in {}",
            shifts.len(),
            tz.name()
        )));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Rank members by time on duty
#[poise::command(slash_command, guild_only, check = "staff_only", user_cooldown = 10)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Only count this shift type"]
    #[autocomplete = "autocomplete_shift_type"]
    shift_type: Option<String>,
    #[description = "Only count shifts started within this period (e.g. 1w, 30d)"]
    period: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let period = match period.as_deref() {
        Some(raw) => match parse_duration(raw).and_then(|d| Duration::from_std(d).ok()) {
            Some(d) if d <= Duration::days(MAX_PERIOD_DAYS) => Some(d),
            Some(_) => return reject(format!("Periods can be at most {} days.", MAX_PERIOD_DAYS)),
            None => return reject(format!("'{}' isn't a period I understand. Try `1w` or `30d`.", raw)),
        },
        None => None,
    };

    let settings = ctx.data().settings.get(guild_id).await.or_reject()?;
    let filter = ShiftFilter {
        shift_type: shift_type.clone(),
        since: period.and_then(|p| Utc::now().checked_sub_signed(p)),
    };
    let board = ctx
        .data()
        .shifts
        .leaderboard(guild_id, &filter)
        .await
        .or_reject()?;

    let scope = match (&shift_type, period) {
        (Some(t), Some(p)) => format!("{} shifts · last {}", t, chrono_duration(p)),
        (Some(t), None) => format!("{} shifts · all time", t),
        (None, Some(p)) => format!("All shifts · last {}", chrono_duration(p)),
        (None, None) => "All shifts · all time".to_string(),
    };

    if board.is_empty() {
        ctx.send(poise::CreateReply::default().embed(embeds::info(
            "🏆 Shift leaderboard",
            format!("No shifts recorded ({}).", scope),
        )))
        .await?;
        return Ok(());
    }

    // Quota markers only make sense over a bounded period
    let expected = settings
        .shift_quota_minutes
        .zip(period)
        .map(|(quota, p)| expected_minutes(quota, p));

    let mut embed = embeds::info("🏆 Shift leaderboard", leaderboard_lines(&board, expected))
        .footer(serenity::CreateEmbedFooter::new(scope));
    if let Some(min) = expected {
        embed = embed.field(
            "Quota",
            format!(
                "{} expected this period",
                format_duration(std::time::Duration::from_secs(min.max(0) as u64 * 60))
            ),
            false,
        );
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Delete recorded shifts for the whole server
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn wipe(
    ctx: Context<'_>,
    #[description = "Set to True to confirm. This can't be undone."] confirm: bool,
    #[description = "Only wipe this shift type"]
    #[autocomplete = "autocomplete_shift_type"]
    shift_type: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    if !confirm {
        return reject("Nothing was deleted. Run the command again with `confirm: True`.");
    }

    let removed = ctx
        .data()
        .shifts
        .wipe(guild_id, shift_type.clone())
        .await
        .or_reject()?;

    let scope = shift_type
        .map(|t| format!("**{}** shifts", t))
        .unwrap_or_else(|| "shifts".to_string());
    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::warning(
                "Shifts wiped",
                format!("Deleted {} {}.", removed, scope),
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_minutes_scales_weekly_quota() {
        assert_eq!(expected_minutes(120, Duration::weeks(1)), 120);
        assert_eq!(expected_minutes(120, Duration::weeks(2)), 240);
        assert_eq!(expected_minutes(120, Duration::days(1)), 17);
    }

    #[test]
    fn test_expected_minutes_huge_period_does_not_overflow() {
        let period = Duration::seconds(1_209_600_000_000_000);
        assert_eq!(expected_minutes(10_080, period), 20_160_000_000_000);
        assert_eq!(expected_minutes(u32::MAX, Duration::seconds(i64::MAX / 1_000)), i64::MAX);
    }

    #[test]
    fn test_leaderboard_marks_quota() {
        let board = vec![
            ShiftSummary {
                user_id: 1,
                shift_count: 3,
                total: Duration::minutes(90),
            },
            ShiftSummary {
                user_id: 2,
                shift_count: 1,
                total: Duration::minutes(30),
            },
        ];
        let text = leaderboard_lines(&board, Some(60));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("🥇 **#1** <@1>"));
        assert!(lines[0].ends_with("✅"));
        assert!(lines[1].ends_with("❌"));

        assert!(!leaderboard_lines(&board, None).contains('✅'));
    }
}
