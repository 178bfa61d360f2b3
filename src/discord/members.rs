// Guild member helpers: role lookups, role changes and the nickname editor
// used by bulk replacement.

use crate::core::nicknames::{BatchProgress, MemberNickname, NicknameEditor, ProgressReporter};
use crate::discord::embeds;
use crate::discord::Context;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Discord returns at most this many members per page.
const MEMBER_PAGE: u64 = 1000;

pub async fn author_roles(ctx: Context<'_>) -> Vec<u64> {
    ctx.author_member()
        .await
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default()
}

/// Interaction payloads carry the member's resolved permissions.
pub async fn author_is_admin(ctx: Context<'_>) -> bool {
    ctx.author_member()
        .await
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.administrator())
}

pub async fn set_role(
    http: &serenity::Http,
    guild_id: u64,
    user_id: u64,
    role_id: u64,
    grant: bool,
    reason: &str,
) {
    let (guild, user, role) = (
        serenity::GuildId::new(guild_id),
        serenity::UserId::new(user_id),
        serenity::RoleId::new(role_id),
    );
    let result = if grant {
        http.add_member_role(guild, user, role, Some(reason)).await
    } else {
        http.remove_member_role(guild, user, role, Some(reason)).await
    };

    if let Err(e) = result {
        tracing::warn!(guild_id, user_id, role_id, grant, error = %e, "Failed to update member role");
    }
}

/// DM a member. Members with DMs closed are common, so failure is only logged.
pub async fn notify(http: &serenity::Http, user_id: u64, embed: serenity::CreateEmbed) {
    let user = serenity::UserId::new(user_id);
    if let Err(e) = user
        .direct_message(http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        tracing::debug!(user_id, error = %e, "Could not DM member");
    }
}

pub async fn fetch_all_members(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
) -> Result<Vec<serenity::Member>, serenity::Error> {
    let mut all = Vec::new();
    let mut after = None;

    loop {
        let page = guild_id.members(http, Some(MEMBER_PAGE), after).await?;
        let len = page.len() as u64;
        after = page.last().map(|m| m.user.id);
        all.extend(page);
        if len < MEMBER_PAGE {
            break;
        }
    }

    Ok(all)
}

pub fn to_member_nickname(member: &serenity::Member, owner_id: serenity::UserId) -> MemberNickname {
    MemberNickname {
        user_id: member.user.id.get(),
        username: member
            .user
            .global_name
            .clone()
            .unwrap_or_else(|| member.user.name.clone()),
        nickname: member.nick.clone(),
        is_owner: member.user.id == owner_id,
    }
}

pub fn grants_manage_nicknames(role_permissions: &[serenity::Permissions]) -> bool {
    let combined = role_permissions
        .iter()
        .fold(serenity::Permissions::empty(), |acc, p| acc | *p);
    combined.administrator() || combined.manage_nicknames()
}

/// Applies nickname edits through the HTTP API.
pub struct DiscordNicknameEditor {
    pub http: Arc<serenity::Http>,
    pub guild_id: serenity::GuildId,
    pub bot_id: serenity::UserId,
}

#[async_trait]
impl NicknameEditor for DiscordNicknameEditor {
    async fn set_nickname(&self, user_id: u64, nickname: Option<&str>) -> Result<(), String> {
        // An empty nickname tells Discord to fall back to the username
        let builder = serenity::EditMember::new()
            .nickname(nickname.unwrap_or_default())
            .audit_log_reason("Bulk nickname replacement");
        self.guild_id
            .edit_member(&*self.http, serenity::UserId::new(user_id), builder)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn can_manage_nicknames(&self) -> bool {
        let member = match self.guild_id.member(&*self.http, self.bot_id).await {
            Ok(member) => member,
            Err(e) => {
                tracing::warn!(guild_id = %self.guild_id, error = %e, "Could not fetch bot member");
                return false;
            }
        };
        let roles = match self.guild_id.roles(&*self.http).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::warn!(guild_id = %self.guild_id, error = %e, "Could not fetch guild roles");
                return false;
            }
        };

        // @everyone shares the guild's id
        let everyone = serenity::RoleId::new(self.guild_id.get());
        let permissions: Vec<serenity::Permissions> = member
            .roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|id| roles.get(id).map(|r| r.permissions))
            .collect();

        grants_manage_nicknames(&permissions)
    }
}

/// Edits the command's reply with a progress embed after each batch.
pub struct ProgressMessage {
    pub http: Arc<serenity::Http>,
    pub channel_id: serenity::ChannelId,
    pub message_id: serenity::MessageId,
}

fn progress_edit(embed: serenity::CreateEmbed) -> serenity::EditMessage {
    serenity::EditMessage::new().embed(embed).components(vec![])
}

impl ProgressMessage {
    /// Edits with the bot token, so it keeps working after the interaction token expires.
    async fn edit(&self, embed: serenity::CreateEmbed) -> Result<(), serenity::Error> {
        self.channel_id
            .edit_message(&*self.http, self.message_id, progress_edit(embed))
            .await
            .map(|_| ())
    }

    /// Replace the progress embed with the final report.
    pub async fn finish(&self, embed: serenity::CreateEmbed) {
        if let Err(e) = self.edit(embed).await {
            tracing::warn!(
                channel_id = %self.channel_id,
                message_id = %self.message_id,
                error = %e,
                "Failed to post nickname replacement report"
            );
        }
    }
}

#[async_trait]
impl ProgressReporter for ProgressMessage {
    async fn report(&self, progress: &BatchProgress) {
        let embed = embeds::info(
            "Replacing nicknames…",
            format!(
                "Batch **{}/{}**\nProcessed **{}/{}** · updated {} · failed {}",
                progress.batch,
                progress.batch_count,
                progress.processed,
                progress.total,
                progress.updated,
                progress.failed
            ),
        );
        if let Err(e) = self.edit(embed).await {
            tracing::debug!(error = %e, "Failed to update progress message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manage_nicknames_from_any_role() {
        use poise::serenity_prelude::Permissions;

        assert!(!grants_manage_nicknames(&[]));
        assert!(!grants_manage_nicknames(&[Permissions::SEND_MESSAGES]));
        assert!(grants_manage_nicknames(&[
            Permissions::SEND_MESSAGES,
            Permissions::MANAGE_NICKNAMES
        ]));
        assert!(grants_manage_nicknames(&[Permissions::ADMINISTRATOR]));
    }

    #[test]
    fn test_progress_edit_replaces_embed_and_drops_buttons() {
        let edit = progress_edit(embeds::info("Nickname replacement finished", "Completed"));
        let json = serde_json::to_value(edit).unwrap();

        assert_eq!(json["embeds"][0]["title"], "Nickname replacement finished");
        assert_eq!(json["components"], serde_json::json!([]));
    }
}
