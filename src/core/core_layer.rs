// The core module contains all business logic.
// Each feature gets its own submodule; nothing in here knows about Discord.

#[path = "formatting.rs"]
pub mod formatting;

#[path = "guild_settings/mod.rs"]
pub mod guild_settings;

#[path = "shifts/mod.rs"]
pub mod shifts;

#[path = "leave/mod.rs"]
pub mod leave;

#[path = "records/mod.rs"]
pub mod records;

#[path = "roblox/roblox_service.rs"]
pub mod roblox;

#[path = "callsigns/callsign_service.rs"]
pub mod callsigns;

#[path = "nicknames/mod.rs"]
pub mod nicknames;
