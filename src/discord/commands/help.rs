use crate::discord::{embeds, Context, Error};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;

const CATEGORY_ORDER: &[&str] = &["Duty", "Leave", "Records", "Roster", "Administration"];

fn category_emoji(category: &str) -> &'static str {
    match category {
        "Duty" => "🚓",
        "Leave" => "🏝️",
        "Records" => "📁",
        "Roster" => "📻",
        "Administration" => "⚙️",
        _ => "•",
    }
}

struct CommandMetadata {
    category: &'static str,
    priority: i32,
    description: Option<&'static str>,
    note: Option<&'static str>,
}

fn command_metadata(name: &str) -> CommandMetadata {
    match name {
        "shift" => CommandMetadata {
            category: "Duty",
            priority: 100,
            description: Some("Clock in and out, take breaks and check time on duty."),
            note: Some("start, break, end, status, history, active, leaderboard · Management: void, wipe"),
        },
        "loa" => CommandMetadata {
            category: "Leave",
            priority: 90,
            description: Some("Request a leave of absence or come back early."),
            note: Some("request, cancel, end, status · Management: list, approve, deny, extend, admin-end"),
        },
        "citation" => CommandMetadata {
            category: "Records",
            priority: 80,
            description: Some("Log a warning or fine against a Roblox user."),
            note: None,
        },
        "arrest" => CommandMetadata {
            category: "Records",
            priority: 79,
            description: Some("Log an arrest with its charges."),
            note: None,
        },
        "records" => CommandMetadata {
            category: "Records",
            priority: 70,
            description: Some("Look up a subject's history, a case, or an officer's totals."),
            note: None,
        },
        "roblox" => CommandMetadata {
            category: "Records",
            priority: 60,
            description: Some("Find a Roblox account by username or user id."),
            note: None,
        },
        "callsign" => CommandMetadata {
            category: "Roster",
            priority: 50,
            description: Some("View callsigns. Management can assign and release them."),
            note: None,
        },
        "config" => CommandMetadata {
            category: "Administration",
            priority: 40,
            description: Some("Set roles, shift types, log channels, LOA role, timezone and quota."),
            note: Some("Start with `/config roles` so staff can use the bot."),
        },
        "nickname" => CommandMetadata {
            category: "Administration",
            priority: 30,
            description: Some("Find and replace text in every member's nickname."),
            note: Some("Previewed with a confirm button; stop a run with `/nickname cancel`."),
        },
        _ => CommandMetadata {
            category: "Administration",
            priority: 0,
            description: None,
            note: None,
        },
    }
}

/// Show a categorized list of commands.
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let mut categories: HashMap<&str, Vec<(i32, String)>> = HashMap::new();

    for command in &ctx.framework().options().commands {
        if command.hide_in_help || command.name == "help" {
            continue;
        }

        let metadata = command_metadata(&command.name);
        let description = metadata
            .description
            .or(command.description.as_deref())
            .unwrap_or("No description provided.");

        let mut entry = format!("• **/{}** · {}", command.name, description);
        if let Some(note) = metadata.note {
            entry.push_str(&format!("\n  ⤷ {}", note));
        }

        categories
            .entry(metadata.category)
            .or_default()
            .push((metadata.priority, entry));
    }

    let mut embed = embeds::info(
        "Patrol Bot commands",
        "Everything runs as a slash command. Most commands need a staff or management \
        role set up with `/config roles`.",
    )
    .timestamp(serenity::Timestamp::now());

    if let Ok(user) = ctx.framework().bot_id.to_user(ctx.http()).await {
        embed = embed.thumbnail(user.face());
    }

    let mut sorted: Vec<_> = categories.keys().cloned().collect();
    sorted.sort_by(|a, b| {
        let pos_a = CATEGORY_ORDER.iter().position(|x| x == a).unwrap_or(usize::MAX);
        let pos_b = CATEGORY_ORDER.iter().position(|x| x == b).unwrap_or(usize::MAX);
        pos_a.cmp(&pos_b).then(a.cmp(b))
    });

    for category in sorted {
        if let Some(entries) = categories.get_mut(category) {
            entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            let title = format!("{} {}", category_emoji(category), category);
            let lines: Vec<String> = entries.iter().map(|(_, s)| s.clone()).collect();

            for (i, chunk) in chunk_entries(&lines).iter().enumerate() {
                let name = if i == 0 {
                    title.clone()
                } else {
                    format!("{} (cont.)", title)
                };
                embed = embed.field(name, chunk.join("\n"), false);
            }
        }
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Group entries so no field goes over Discord's 1024 character limit.
fn chunk_entries(entries: &[String]) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut length = 0;

    for entry in entries {
        let entry_len = entry.chars().count();
        if !current.is_empty() && length + entry_len + 1 > embeds::FIELD_LIMIT {
            chunks.push(std::mem::take(&mut current));
            length = 0;
        }
        current.push(entry.clone());
        length += entry_len + 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_stay_under_field_limit() {
        let entries: Vec<String> = (0..30).map(|i| format!("{:0>100}", i)).collect();
        let chunks = chunk_entries(&entries);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.join("\n").chars().count() <= embeds::FIELD_LIMIT);
        }
        assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), 30);
    }

    #[test]
    fn test_notes_list_every_subcommand() {
        for command in [
            crate::discord::commands::shift::shift(),
            crate::discord::commands::loa::loa(),
        ] {
            let note = command_metadata(&command.name).note.unwrap_or_default();
            let listed: Vec<&str> = note
                .split(['·', ','])
                .map(|part| part.trim().trim_start_matches("Management:").trim())
                .collect();
            for sub in &command.subcommands {
                assert!(
                    listed.contains(&sub.name.as_str()),
                    "/{} help is missing {}",
                    command.name,
                    sub.name
                );
            }
        }
    }

    #[test]
    fn test_every_category_has_an_emoji() {
        for category in CATEGORY_ORDER {
            assert_ne!(category_emoji(category), "•");
        }
    }
}
