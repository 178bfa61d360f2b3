// Entry point of the patrol bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite stores, Roblox API)
// - `discord/` = Discord-specific adapters (commands, checks, embeds)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and start background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::callsigns::CallsignService;
use crate::core::guild_settings::GuildSettingsService;
use crate::core::leave::LeaveService;
use crate::core::nicknames::{BatchConfig, NicknameService};
use crate::core::records::RecordService;
use crate::core::roblox::RobloxService;
use crate::core::shifts::ShiftService;
use crate::discord::commands::presence;
use crate::discord::{error_handler, leave_tasks, Data, Error};
use crate::infra::callsigns::SqliteCallsignStore;
use crate::infra::guild_settings::SqliteSettingsStore;
use crate::infra::leave::SqliteLeaveStore;
use crate::infra::records::SqliteRecordStore;
use crate::infra::roblox::RobloxApiClient;
use crate::infra::shifts::SqliteShiftStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One pool shared by every store; each store creates its own tables.

    let pool = infra::database::connect(&config.database_url).await?;

    let settings_store = SqliteSettingsStore::new(pool.clone());
    settings_store.migrate().await?;
    let shift_store = SqliteShiftStore::new(pool.clone());
    shift_store.migrate().await?;
    let leave_store = SqliteLeaveStore::new(pool.clone());
    leave_store.migrate().await?;
    let record_store = SqliteRecordStore::new(pool.clone());
    record_store.migrate().await?;
    let callsign_store = SqliteCallsignStore::new(pool);
    callsign_store.migrate().await?;

    let roblox_client = RobloxApiClient::new(config.roblox_api_base.clone())?;

    let data = Data {
        settings: Arc::new(GuildSettingsService::new(settings_store)),
        shifts: Arc::new(ShiftService::new(shift_store)),
        leave: Arc::new(LeaveService::new(leave_store)),
        records: Arc::new(RecordService::new(record_store)),
        callsigns: Arc::new(CallsignService::new(callsign_store)),
        roblox: Arc::new(RobloxService::new(roblox_client)),
        nicknames: Arc::new(NicknameService::new(BatchConfig {
            batch_size: config.nickname_batch_size,
            batch_delay: config.nickname_batch_delay,
            ..BatchConfig::default()
        })),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MEMBERS;

    let dev_guild_id = config.dev_guild_id;
    let sweep_interval = config.loa_sweep_interval;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            on_error: |error| Box::pin(error_handler::on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::debug!(
                        command = %ctx.command().qualified_name,
                        user_id = ctx.author().id.get(),
                        guild_id = ?ctx.guild_id().map(|g| g.get()),
                        "Running command"
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");

                // Global registration can take a while to propagate
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                if let Some(guild_id) = dev_guild_id {
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        serenity::GuildId::new(guild_id),
                    )
                    .await?;
                    tracing::info!(guild_id, "Commands registered in dev guild");
                }
                tracing::info!(
                    count = framework.options().commands.len(),
                    "Commands registered"
                );

                presence::on_ready(ctx, ready);

                leave_tasks::spawn_expiry_sweep(
                    ctx.http.clone(),
                    Arc::clone(&data.leave),
                    Arc::clone(&data.settings),
                    sweep_interval,
                );

                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}
