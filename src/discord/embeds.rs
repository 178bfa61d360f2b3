// Embed builders shared by every command.

use crate::core::formatting::{format_duration, truncate};
use crate::core::leave::LeaveNotice;
use crate::core::records::{Arrest, CaseRecord, Citation, CitationKind, Subject};
use crate::core::roblox::profile_url;
use crate::core::shifts::Shift;
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

pub const COLOR_INFO: u32 = 0x5865F2;
pub const COLOR_SUCCESS: u32 = 0x2ECC71;
pub const COLOR_WARNING: u32 = 0xF1C40F;
pub const COLOR_ERROR: u32 = 0xE74C3C;

/// Discord caps embed field values at 1024 characters.
pub const FIELD_LIMIT: usize = 1024;

pub fn info(title: impl Into<String>, description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(COLOR_INFO)
}

pub fn success(title: impl Into<String>, description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(format!("✅ {}", title.into()))
        .description(description)
        .color(COLOR_SUCCESS)
}

pub fn warning(title: impl Into<String>, description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(format!("⚠️ {}", title.into()))
        .description(description)
        .color(COLOR_WARNING)
}

pub fn error(description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("❌ Error")
        .description(description)
        .color(COLOR_ERROR)
}

/// `<t:…>` markup so every member sees their own local time.
pub fn timestamp(at: DateTime<Utc>, style: char) -> String {
    format!("<t:{}:{}>", at.timestamp(), style)
}

pub fn chrono_duration(duration: chrono::Duration) -> String {
    format_duration(duration.to_std().unwrap_or_default())
}

fn subject_line(subject: &Subject) -> String {
    match subject.roblox_id {
        Some(id) => format!("[{}]({}) (`{}`)", subject.username, profile_url(id), id),
        None => format!("{} (unverified)", subject.username),
    }
}

fn bullet_list(items: &[String]) -> String {
    let list = items
        .iter()
        .map(|i| format!("• {}", i))
        .collect::<Vec<_>>()
        .join("\n");
    truncate(&list, FIELD_LIMIT)
}

pub fn shift_event(action: &str, shift: &Shift, now: DateTime<Utc>) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🚓 Shift {}", action))
        .color(COLOR_INFO)
        .field("Member", format!("<@{}>", shift.user_id), true)
        .field("Type", &shift.shift_type, true)
        .field("Status", shift.status().to_string(), true)
        .field("Started", timestamp(shift.started_at, 'f'), true)
        .field("On duty", chrono_duration(shift.duty_time(now)), true)
        .timestamp(serenity::Timestamp::now());

    if !shift.breaks.is_empty() {
        embed = embed.field(
            "Breaks",
            format!(
                "{} ({})",
                shift.breaks.len(),
                chrono_duration(shift.break_time(now))
            ),
            true,
        );
    }
    embed
}

pub fn leave_notice(title: &str, notice: &LeaveNotice, color: u32) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("{} (#{})", title, notice.id))
        .color(color)
        .field("Member", format!("<@{}>", notice.user_id), true)
        .field("Status", notice.status.to_string(), true)
        .field(
            "Length",
            format_duration(notice.duration().to_std().unwrap_or_default()),
            true,
        )
        .field("Reason", truncate(&notice.reason, FIELD_LIMIT), false)
        .timestamp(serenity::Timestamp::now());

    if let (Some(start), Some(end)) = (notice.starts_at, notice.ends_at) {
        embed = embed.field(
            "Period",
            format!("{} → {}", timestamp(start, 'D'), timestamp(end, 'R')),
            false,
        );
    }
    if let Some(reviewer) = notice.reviewer_id {
        embed = embed.field("Reviewed by", format!("<@{}>", reviewer), true);
    }
    if let Some(note) = &notice.review_note {
        embed = embed.field("Note", truncate(note, FIELD_LIMIT), false);
    }
    if notice.extensions > 0 {
        embed = embed.field("Extensions", notice.extensions.to_string(), true);
    }
    embed
}

pub fn citation(citation: &Citation) -> serenity::CreateEmbed {
    let (icon, color) = match citation.kind {
        CitationKind::Warning => ("📝", COLOR_WARNING),
        CitationKind::Fine => ("🧾", COLOR_ERROR),
    };

    let mut embed = serenity::CreateEmbed::new()
        .title(format!(
            "{} {} · Case #{}",
            icon, citation.kind, citation.case_number
        ))
        .color(color)
        .field("Subject", subject_line(&citation.subject), true)
        .field("Officer", format!("<@{}>", citation.officer_id), true)
        .field("Location", &citation.location, true)
        .field("Violations", bullet_list(&citation.violations), false)
        .timestamp(serenity::Timestamp::from_unix_timestamp(citation.issued_at.timestamp())
            .unwrap_or_else(|_| serenity::Timestamp::now()));

    if let Some(fine) = citation.fine_amount {
        embed = embed.field("Fine", format!("${}", fine), true);
    }
    if let Some(notes) = &citation.notes {
        embed = embed.field("Notes", truncate(notes, FIELD_LIMIT), false);
    }
    embed
}

pub fn arrest(arrest: &Arrest) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🚔 Arrest · Case #{}", arrest.case_number))
        .color(0x992D22)
        .field("Subject", subject_line(&arrest.subject), true)
        .field("Officer", format!("<@{}>", arrest.officer_id), true)
        .field("Charges", bullet_list(&arrest.charges), false)
        .timestamp(serenity::Timestamp::from_unix_timestamp(arrest.arrested_at.timestamp())
            .unwrap_or_else(|_| serenity::Timestamp::now()));

    if let Some(notes) = &arrest.notes {
        embed = embed.field("Notes", truncate(notes, FIELD_LIMIT), false);
    }
    embed
}

pub fn case_record(record: &CaseRecord) -> serenity::CreateEmbed {
    match record {
        CaseRecord::Citation(c) => citation(c),
        CaseRecord::Arrest(a) => arrest(a),
    }
}

/// Post to a configured log channel. Failures are logged, never surfaced.
pub async fn send_log(
    http: impl serenity::CacheHttp,
    channel_id: Option<u64>,
    embed: serenity::CreateEmbed,
) {
    let Some(channel_id) = channel_id else {
        return;
    };

    if let Err(e) = serenity::ChannelId::new(channel_id)
        .send_message(http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        tracing::warn!(channel_id, error = %e, "Failed to post to log channel");
    }
}
