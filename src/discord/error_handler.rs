// Framework error handler.
//
// Member-caused errors (`UserError`) are shown verbatim in an ephemeral embed.
// Everything else is logged under a short correlation id that the member is
// shown, so a report can be matched to the log line.

use crate::discord::{embeds, Context, Data, Error, UserError};
use poise::serenity_prelude as serenity;

/// The member-facing text for `error`, when it is a member-facing error.
pub fn user_message(error: &Error) -> Option<&str> {
    error.downcast_ref::<UserError>().map(|e| e.0.as_str())
}

pub fn new_error_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

async fn reply(ctx: Context<'_>, embed: serenity::CreateEmbed) {
    if let Err(e) = ctx
        .send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await
    {
        tracing::warn!(error = %e, "Failed to send error reply");
    }
}

async fn report_unexpected(ctx: Context<'_>, error: &Error) {
    let error_id = new_error_id();
    tracing::error!(
        error_id = %error_id,
        command = %ctx.command().qualified_name,
        guild_id = ?ctx.guild_id().map(|g| g.get()),
        user_id = ctx.author().id.get(),
        error = %error,
        "Command failed"
    );
    reply(
        ctx,
        embeds::error(format!(
            "Something went wrong while running this command.\nError ID: `{}`",
            error_id
        )),
    )
    .await;
}

async fn handle_command_error(ctx: Context<'_>, error: &Error) {
    match user_message(error) {
        Some(message) => reply(ctx, embeds::error(message)).await,
        None => report_unexpected(ctx, error).await,
    }
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            handle_command_error(ctx, &error).await;
        }
        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => match error {
            Some(error) => handle_command_error(ctx, &error).await,
            None => {
                reply(ctx, embeds::error("You don't have permission to use this command.")).await
            }
        },
        poise::FrameworkError::CooldownHit {
            remaining_cooldown,
            ctx,
            ..
        } => {
            reply(
                ctx,
                embeds::warning(
                    "Slow down",
                    format!(
                        "Try again in {:.1} seconds.",
                        remaining_cooldown.as_secs_f32()
                    ),
                ),
            )
            .await;
        }
        poise::FrameworkError::MissingBotPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            reply(
                ctx,
                embeds::error(format!(
                    "I need these permissions first: {}",
                    missing_permissions
                )),
            )
            .await;
        }
        poise::FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            let detail = missing_permissions
                .map(|p| format!(" (missing: {})", p))
                .unwrap_or_default();
            reply(
                ctx,
                embeds::error(format!("You don't have permission to use this command{}.", detail)),
            )
            .await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            reply(ctx, embeds::error("This command only works in servers.")).await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!(error = %e, "Error while handling framework error");
            }
        }
    }
}
