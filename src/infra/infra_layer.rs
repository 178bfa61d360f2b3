// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "database.rs"]
pub mod database;

#[path = "guild_settings/sqlite_settings_store.rs"]
pub mod guild_settings;

#[path = "shifts/sqlite_shift_store.rs"]
pub mod shifts;

#[path = "leave/sqlite_leave_store.rs"]
pub mod leave;

#[path = "records/sqlite_record_store.rs"]
pub mod records;

#[path = "callsigns/sqlite_callsign_store.rs"]
pub mod callsigns;

#[path = "roblox/roblox_client.rs"]
pub mod roblox;
