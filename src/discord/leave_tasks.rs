// LOA side effects on Discord (role, DM, log channel) and the background
// expiry sweep.

use crate::core::guild_settings::LogChannelKind;
use crate::core::leave::LeaveNotice;
use crate::discord::embeds::{self, COLOR_INFO, COLOR_SUCCESS};
use crate::discord::members::{notify, set_role};
use crate::discord::{Leave, Settings};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

/// Give the member the guild's LOA role (if one is configured) and tell them.
pub async fn leave_started(http: &serenity::Http, settings: &Settings, notice: &LeaveNotice) {
    let guild = match settings.get(notice.guild_id).await {
        Ok(guild) => guild,
        Err(e) => {
            tracing::warn!(guild_id = notice.guild_id, error = %e, "Could not load settings for LOA");
            return;
        }
    };

    if let Some(role_id) = guild.leave_role {
        set_role(http, notice.guild_id, notice.user_id, role_id, true, "LOA approved").await;
    }

    let embed = embeds::leave_notice("🏝️ LOA approved", notice, COLOR_SUCCESS);
    notify(http, notice.user_id, embed.clone()).await;
    embeds::send_log(http, guild.log_channel(LogChannelKind::Leave), embed).await;
}

/// Remove the LOA role and announce that the leave is over.
pub async fn leave_finished(
    http: &serenity::Http,
    settings: &Settings,
    notice: &LeaveNotice,
    how: &str,
) {
    let guild = match settings.get(notice.guild_id).await {
        Ok(guild) => guild,
        Err(e) => {
            tracing::warn!(guild_id = notice.guild_id, error = %e, "Could not load settings for LOA");
            return;
        }
    };

    if let Some(role_id) = guild.leave_role {
        set_role(http, notice.guild_id, notice.user_id, role_id, false, "LOA ended").await;
    }

    let embed = embeds::leave_notice(&format!("📅 LOA {}", how), notice, COLOR_INFO);
    notify(http, notice.user_id, embed.clone()).await;
    embeds::send_log(http, guild.log_channel(LogChannelKind::Leave), embed).await;
}

/// Close expired leave every `interval` until the process exits.
pub fn spawn_expiry_sweep(
    http: Arc<serenity::Http>,
    leave: Arc<Leave>,
    settings: Arc<Settings>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tracing::debug!("Starting LOA expiry sweep");
            match leave.expire_due(Utc::now()).await {
                Ok(expired) => {
                    for notice in &expired {
                        leave_finished(&http, &settings, notice, "expired").await;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "LOA expiry sweep failed"),
            }

            tokio::time::sleep(interval).await;
        }
    });
}
