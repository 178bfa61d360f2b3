// `/citation`, `/arrest` and `/records` - logging and looking up cases.

use crate::core::formatting::{format_height, truncate};
use crate::core::guild_settings::LogChannelKind;
use crate::core::records::{ArrestDraft, CaseRecord, CitationDraft, CitationKind, SubjectHistory};
use crate::discord::checks::{management_only, staff_only};
use crate::discord::embeds;
use crate::discord::{reject, Context, Error, OrReject};
use poise::serenity_prelude as serenity;

const HISTORY_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum CitationKindChoice {
    Warning,
    Fine,
}

impl From<CitationKindChoice> for CitationKind {
    fn from(value: CitationKindChoice) -> Self {
        match value {
            CitationKindChoice::Warning => CitationKind::Warning,
            CitationKindChoice::Fine => CitationKind::Fine,
        }
    }
}

async fn post_record_log(ctx: Context<'_>, guild_id: u64, embed: serenity::CreateEmbed) {
    match ctx.data().settings.get(guild_id).await {
        Ok(settings) => {
            embeds::send_log(ctx.http(), settings.log_channel(LogChannelKind::Records), embed)
                .await
        }
        Err(e) => tracing::warn!(guild_id, error = %e, "Could not load settings for record log"),
    }
}

/// Prefix arrest notes with the suspect's height when one was given.
pub fn arrest_notes(height: Option<&str>, notes: Option<String>) -> Result<Option<String>, Error> {
    let Some(raw) = height else {
        return Ok(notes);
    };
    let Some(height) = format_height(raw) else {
        return reject(format!(
            "'{}' isn't a height I understand. Use feet and inches like `511` or `5'11`.",
            raw
        ));
    };
    Ok(Some(match notes {
        Some(notes) => format!("Height: {}\n{}", height, notes),
        None => format!("Height: {}", height),
    }))
}

fn history_lines(history: &SubjectHistory) -> (String, String) {
    let citations = history
        .citations
        .iter()
        .take(HISTORY_ENTRIES)
        .map(|c| {
            let fine = c.fine_amount.map(|f| format!(" · ${}", f)).unwrap_or_default();
            format!(
                "`#{}` {} · {}{} · {}",
                c.case_number,
                c.kind,
                c.violations.join(", "),
                fine,
                embeds::timestamp(c.issued_at, 'd')
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let arrests = history
        .arrests
        .iter()
        .take(HISTORY_ENTRIES)
        .map(|a| {
            format!(
                "`#{}` {} · {}",
                a.case_number,
                a.charges.join(", "),
                embeds::timestamp(a.arrested_at, 'd')
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let or_none = |s: String| {
        if s.is_empty() {
            "None".to_string()
        } else {
            truncate(&s, embeds::FIELD_LIMIT)
        }
    };
    (or_none(citations), or_none(arrests))
}

/// Citations
#[poise::command(slash_command, guild_only, subcommands("citation_log"))]
pub async fn citation(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Log a warning or fine
#[poise::command(
    slash_command,
    guild_only,
    rename = "log",
    check = "staff_only",
    user_cooldown = 10
)]
pub async fn citation_log(
    ctx: Context<'_>,
    #[description = "Roblox username of the subject"] subject: String,
    #[description = "Warning or fine"] kind: CitationKindChoice,
    #[description = "Violations, separated by commas"] violations: String,
    #[description = "Where it happened"] location: String,
    #[description = "Fine amount (fines only)"] fine: Option<u32>,
    #[description = "Extra notes"] notes: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    ctx.defer().await?;

    let subject = ctx
        .data()
        .roblox
        .resolve_subject(&subject)
        .await
        .or_reject()?;
    let citation = ctx
        .data()
        .records
        .log_citation(
            guild_id,
            CitationDraft {
                officer_id: ctx.author().id.get(),
                subject,
                kind: kind.into(),
                violations,
                fine_amount: fine,
                location,
                notes,
            },
        )
        .await
        .or_reject()?;

    let embed = embeds::citation(&citation);
    ctx.send(poise::CreateReply::default().embed(embed.clone()))
        .await?;
    post_record_log(ctx, guild_id, embed).await;
    Ok(())
}

/// Arrests
#[poise::command(slash_command, guild_only, subcommands("arrest_log"))]
pub async fn arrest(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Log an arrest
#[poise::command(
    slash_command,
    guild_only,
    rename = "log",
    check = "staff_only",
    user_cooldown = 10
)]
pub async fn arrest_log(
    ctx: Context<'_>,
    #[description = "Roblox username of the suspect"] subject: String,
    #[description = "Charges, separated by commas"] charges: String,
    #[description = "Suspect height (e.g. 511 for 5'11\")"] height: Option<String>,
    #[description = "Extra notes"] notes: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let notes = arrest_notes(height.as_deref(), notes)?;
    ctx.defer().await?;

    let subject = ctx
        .data()
        .roblox
        .resolve_subject(&subject)
        .await
        .or_reject()?;
    let arrest = ctx
        .data()
        .records
        .log_arrest(
            guild_id,
            ArrestDraft {
                officer_id: ctx.author().id.get(),
                subject,
                charges,
                notes,
            },
        )
        .await
        .or_reject()?;

    let embed = embeds::arrest(&arrest);
    ctx.send(poise::CreateReply::default().embed(embed.clone()))
        .await?;
    post_record_log(ctx, guild_id, embed).await;
    Ok(())
}

/// Look up records
#[poise::command(
    slash_command,
    guild_only,
    subcommands("history", "case", "delete", "stats")
)]
pub async fn records(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show a subject's citations and arrests
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Roblox username"] subject: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let history = ctx
        .data()
        .records
        .subject_history(guild_id, &subject)
        .await
        .or_reject()?;

    if history.is_empty() {
        ctx.send(poise::CreateReply::default().embed(embeds::info(
            "📁 Record history",
            format!("No records for **{}**.", subject.trim()),
        )))
        .await?;
        return Ok(());
    }

    let (citations, arrests) = history_lines(&history);
    let embed = embeds::info(
        format!("📁 Record history · {}", subject.trim()),
        format!(
            "**{}** citations · **{}** arrests · **${}** in fines",
            history.citations.len(),
            history.arrests.len(),
            history.total_fines()
        ),
    )
    .field("Citations", citations, false)
    .field("Arrests", arrests, false);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show one case by number
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn case(
    ctx: Context<'_>,
    #[description = "Case number"] number: u64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let record = ctx
        .data()
        .records
        .get_case(guild_id, number)
        .await
        .or_reject()?;
    ctx.send(poise::CreateReply::default().embed(embeds::case_record(&record)))
        .await?;
    Ok(())
}

/// Delete a case
#[poise::command(slash_command, guild_only, check = "management_only")]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Case number"] number: u64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let record = ctx
        .data()
        .records
        .delete_case(guild_id, number)
        .await
        .or_reject()?;
    let summary = deleted_summary(&record, ctx.author().id.get());

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::warning("Case deleted", summary.clone()))
            .ephemeral(true),
    )
    .await?;
    post_record_log(ctx, guild_id, embeds::warning("Case deleted", summary)).await;
    Ok(())
}

fn deleted_summary(record: &CaseRecord, removed_by: u64) -> String {
    let kind = match record {
        CaseRecord::Citation(_) => "Citation",
        CaseRecord::Arrest(_) => "Arrest",
    };
    format!(
        "{} `#{}` against **{}** (logged by <@{}>) was removed by <@{}>.",
        kind,
        record.case_number(),
        record.subject().username,
        record.officer_id(),
        removed_by
    )
}

/// Show how many records an officer has logged
#[poise::command(slash_command, guild_only, check = "staff_only")]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "Officer (defaults to you)"] officer: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let officer_id = officer
        .as_ref()
        .map(|u| u.id.get())
        .unwrap_or_else(|| ctx.author().id.get());

    let stats = ctx
        .data()
        .records
        .officer_stats(guild_id, officer_id)
        .await
        .or_reject()?;

    let embed = embeds::info("📊 Officer stats", format!("<@{}>", officer_id))
        .field("Fines", stats.citations.to_string(), true)
        .field("Warnings", stats.warnings.to_string(), true)
        .field("Arrests", stats.arrests.to_string(), true)
        .field("Fines issued", format!("${}", stats.fines_issued), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::{Arrest, Subject};
    use chrono::Utc;

    #[test]
    fn test_height_is_prefixed_to_notes() {
        assert_eq!(
            arrest_notes(Some("511"), Some("Fled on foot".to_string())).unwrap(),
            Some("Height: 5'11\"\nFled on foot".to_string())
        );
        assert_eq!(
            arrest_notes(Some("6 0"), None).unwrap(),
            Some("Height: 6'0\"".to_string())
        );
        assert_eq!(arrest_notes(None, None).unwrap(), None);
    }

    #[test]
    fn test_bad_height_is_rejected() {
        let err = arrest_notes(Some("tall"), None).unwrap_err();
        assert!(crate::discord::error_handler::user_message(&err).is_some());
    }

    #[test]
    fn test_deleted_summary_names_subject_and_officer() {
        let record = CaseRecord::Arrest(Arrest {
            id: 1,
            guild_id: 1,
            case_number: 12,
            officer_id: 2,
            subject: Subject {
                roblox_id: Some(156),
                username: "Builderman".to_string(),
            },
            charges: vec!["Evading".to_string()],
            notes: None,
            arrested_at: Utc::now(),
        });
        assert_eq!(
            deleted_summary(&record, 3),
            "Arrest `#12` against **Builderman** (logged by <@2>) was removed by <@3>."
        );
    }

    #[test]
    fn test_empty_history_sections_say_none() {
        let history = SubjectHistory {
            citations: Vec::new(),
            arrests: vec![Arrest {
                id: 1,
                guild_id: 1,
                case_number: 4,
                officer_id: 2,
                subject: Subject {
                    roblox_id: None,
                    username: "someone".to_string(),
                },
                charges: vec!["Evading".to_string()],
                notes: None,
                arrested_at: Utc::now(),
            }],
        };
        let (citations, arrests) = history_lines(&history);
        assert_eq!(citations, "None");
        assert!(arrests.starts_with("`#4` Evading"));
    }
}
