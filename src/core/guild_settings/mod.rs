// Per-guild configuration: who counts as management/staff, which shift types
// exist, and where the bot posts its logs.

pub mod guild_settings_models;
pub mod guild_settings_service;

pub use guild_settings_models::*;
pub use guild_settings_service::*;
