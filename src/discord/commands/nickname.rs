// `/nickname` - bulk find-and-replace across member nicknames.
//
// The guild is claimed before members are fetched, the plan is previewed
// behind confirm/cancel buttons, and the reply message doubles as the
// progress display while batches run.

use crate::core::formatting::{camel_case, format_duration, truncate};
use crate::core::nicknames::{
    BatchConfig, ReplacementMode, ReplacementOutcome, ReplacementPlan, ReplacementReport,
};
use crate::discord::checks::management_only;
use crate::discord::embeds::{self, COLOR_ERROR, COLOR_SUCCESS, COLOR_WARNING};
use crate::discord::members::{
    fetch_all_members, to_member_nickname, DiscordNicknameEditor, ProgressMessage,
};
use crate::discord::{Context, Error, OrReject};
use poise::serenity_prelude as serenity;
use std::time::Duration;

const PREVIEW_LINES: usize = 10;
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum MatchModeChoice {
    #[name = "Exact text"]
    Literal,
    #[name = "Regular expression"]
    Regex,
}

impl From<MatchModeChoice> for ReplacementMode {
    fn from(value: MatchModeChoice) -> Self {
        match value {
            MatchModeChoice::Literal => ReplacementMode::Literal,
            MatchModeChoice::Regex => ReplacementMode::Regex,
        }
    }
}

/// Bulk nickname changes
#[poise::command(slash_command, guild_only, subcommands("replace", "cancel"))]
pub async fn nickname(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Rough wall time for a run: only the pauses between batches are counted.
pub fn estimated_duration(changes: usize, config: &BatchConfig) -> Duration {
    let batches = changes.div_ceil(config.batch_size.max(1));
    config.batch_delay * batches.saturating_sub(1) as u32
}

pub fn preview_lines(plan: &ReplacementPlan) -> String {
    let mut lines: Vec<String> = plan
        .changes
        .iter()
        .take(PREVIEW_LINES)
        .map(|c| {
            format!(
                "`{}` → `{}`",
                c.before,
                c.after.as_deref().unwrap_or("(reset)")
            )
        })
        .collect();
    if plan.changes.len() > PREVIEW_LINES {
        lines.push(format!("…and {} more", plan.changes.len() - PREVIEW_LINES));
    }
    truncate(&lines.join("\n"), embeds::FIELD_LIMIT)
}

pub fn report_embed(report: &ReplacementReport) -> serenity::CreateEmbed {
    let color = match report.outcome {
        ReplacementOutcome::Completed if report.failed.is_empty() => COLOR_SUCCESS,
        ReplacementOutcome::Completed | ReplacementOutcome::Cancelled => COLOR_WARNING,
        ReplacementOutcome::PermissionLost | ReplacementOutcome::FailureThreshold => COLOR_ERROR,
    };

    let mut embed = serenity::CreateEmbed::new()
        .title("Nickname replacement finished")
        .description(report.outcome.to_string())
        .color(color)
        .field("Updated", format!("{}/{}", report.updated, report.total), true)
        .field("Failed", report.failed.len().to_string(), true)
        .field("Not attempted", report.skipped.to_string(), true);

    if !report.failed.is_empty() {
        let failures = report
            .failed
            .iter()
            .map(|f| format!("<@{}>: {}", f.user_id, f.reason))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Failures", truncate(&failures, embeds::FIELD_LIMIT), false);
    }
    embed
}

/// Find and replace text in every member's nickname
#[poise::command(
    slash_command,
    guild_only,
    check = "management_only",
    required_bot_permissions = "MANAGE_NICKNAMES",
    user_cooldown = 30
)]
pub async fn replace(
    ctx: Context<'_>,
    #[description = "Text to find"] find: String,
    #[description = "Replacement (leave empty to remove the text)"] replace_with: Option<String>,
    #[description = "How to match (default: exact text)"] mode: Option<MatchModeChoice>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;
    let service = &ctx.data().nicknames;

    let ticket = service.begin(guild_id.get()).or_reject()?;
    ctx.defer().await?;

    let owner_id = guild_id.to_partial_guild(ctx.http()).await?.owner_id;
    let members: Vec<_> = fetch_all_members(ctx.http(), guild_id)
        .await?
        .iter()
        .filter(|m| !m.user.bot)
        .map(|m| to_member_nickname(m, owner_id))
        .collect();

    let replacement = replace_with.unwrap_or_default();
    let mode = mode.map(ReplacementMode::from).unwrap_or(ReplacementMode::Literal);
    let plan = service
        .plan(&members, &find, &replacement, mode)
        .or_reject()?;

    if plan.is_empty() {
        ctx.send(poise::CreateReply::default().embed(embeds::info(
            "Nothing to change",
            format!("No nicknames among {} members contain that text.", members.len()),
        )))
        .await?;
        return Ok(());
    }

    let confirm_id = camel_case(&format!("nickname confirm {}", ctx.id()));
    let cancel_id = camel_case(&format!("nickname cancel {}", ctx.id()));

    let mut preview = embeds::warning(
        "Confirm nickname replacement",
        format!(
            "**{}** nicknames will change. This takes about {}.",
            plan.changes.len(),
            format_duration(estimated_duration(plan.changes.len(), service.config()))
        ),
    )
    .field("Preview", preview_lines(&plan), false);
    if plan.skipped_owner > 0 {
        preview = preview.footer(serenity::CreateEmbedFooter::new(
            "The server owner matches but can't be renamed by bots.",
        ));
    }

    let buttons = vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(confirm_id.clone())
            .label("Confirm")
            .style(serenity::ButtonStyle::Danger),
        serenity::CreateButton::new(cancel_id.clone())
            .label("Cancel")
            .style(serenity::ButtonStyle::Secondary),
    ])];

    let msg = ctx
        .send(
            poise::CreateReply::default()
                .embed(preview)
                .components(buttons),
        )
        .await?;
    let message = msg.message().await?;
    let (channel_id, message_id) = (message.channel_id, message.id);

    let choice = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .channel_id(channel_id)
        .timeout(CONFIRM_TIMEOUT)
        .filter(move |mci| mci.message.id == message_id)
        .await;

    let Some(mci) = choice else {
        msg.edit(
            ctx,
            poise::CreateReply::default()
                .embed(embeds::info("Nickname replacement", "Timed out, nothing was changed."))
                .components(vec![]),
        )
        .await?;
        return Ok(());
    };

    if let Err(e) = mci.defer(ctx.http()).await {
        tracing::warn!(error = %e, "Failed to acknowledge nickname confirmation");
    }

    if mci.data.custom_id != confirm_id {
        msg.edit(
            ctx,
            poise::CreateReply::default()
                .embed(embeds::info("Nickname replacement", "Cancelled, nothing was changed."))
                .components(vec![]),
        )
        .await?;
        return Ok(());
    }

    msg.edit(
        ctx,
        poise::CreateReply::default()
            .embed(embeds::info(
                "Replacing nicknames…",
                format!("Starting on {} members. Stop with `/nickname cancel`.", plan.changes.len()),
            ))
            .components(vec![]),
    )
    .await?;

    let http = ctx.serenity_context().http.clone();
    let editor = DiscordNicknameEditor {
        http: http.clone(),
        guild_id,
        bot_id: ctx.framework().bot_id,
    };
    let progress = ProgressMessage {
        http,
        channel_id,
        message_id,
    };

    let report = service.apply(ticket, &plan, &editor, &progress).await;

    // Long runs outlive the interaction token, so the report goes through the channel
    progress.finish(report_embed(&report)).await;
    Ok(())
}

/// Stop a running nickname replacement
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let embed = if ctx.data().nicknames.cancel(guild_id) {
        embeds::success(
            "Cancelling",
            "The replacement will stop before its next batch.",
        )
    } else {
        embeds::info("Nothing to cancel", "No nickname replacement is running.")
    };
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nicknames::{FailedChange, NicknameChange};

    fn change(n: u64) -> NicknameChange {
        NicknameChange {
            user_id: n,
            before: format!("Cadet {}", n),
            after: Some(format!("Officer {}", n)),
        }
    }

    #[test]
    fn test_estimate_counts_pauses_between_batches() {
        let config = BatchConfig::default();
        assert_eq!(estimated_duration(0, &config), Duration::ZERO);
        assert_eq!(estimated_duration(5, &config), Duration::ZERO);
        assert_eq!(estimated_duration(6, &config), Duration::from_millis(1_500));
        assert_eq!(estimated_duration(16, &config), Duration::from_millis(4_500));
    }

    #[test]
    fn test_preview_is_capped() {
        let plan = ReplacementPlan {
            changes: (1..=12).map(change).collect(),
            skipped_owner: 0,
        };
        let preview = preview_lines(&plan);
        assert_eq!(preview.lines().count(), PREVIEW_LINES + 1);
        assert!(preview.starts_with("`Cadet 1` → `Officer 1`"));
        assert!(preview.ends_with("…and 2 more"));
    }

    #[test]
    fn test_preview_marks_resets() {
        let plan = ReplacementPlan {
            changes: vec![NicknameChange {
                user_id: 1,
                before: "TMP".to_string(),
                after: None,
            }],
            skipped_owner: 0,
        };
        assert_eq!(preview_lines(&plan), "`TMP` → `(reset)`");
    }

    #[test]
    fn test_report_lists_failures() {
        let report = ReplacementReport {
            outcome: ReplacementOutcome::FailureThreshold,
            total: 10,
            updated: 2,
            failed: vec![FailedChange {
                user_id: 9,
                reason: "Missing Permissions".to_string(),
            }],
            skipped: 7,
        };
        let json = serde_json::to_value(report_embed(&report)).unwrap();
        assert_eq!(json["color"], COLOR_ERROR);
        assert_eq!(json["fields"][0]["value"], "2/10");
        assert_eq!(json["fields"][3]["value"], "<@9>: Missing Permissions");
    }
}
