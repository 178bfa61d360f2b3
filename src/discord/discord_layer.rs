// Discord layer - commands, permission checks and event glue.
//
// Commands translate Discord input into primitives, call a core service and
// render the result. Errors a member can fix are wrapped in `UserError` so the
// error handler can show them as-is; anything else gets logged.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "checks.rs"]
pub mod checks;

#[path = "embeds.rs"]
pub mod embeds;

#[path = "error_handler.rs"]
pub mod error_handler;

#[path = "leave_tasks.rs"]
pub mod leave_tasks;

#[path = "members.rs"]
pub mod members;

use crate::core::callsigns::{CallsignError, CallsignService};
use crate::core::guild_settings::{GuildSettingsService, SettingsError};
use crate::core::leave::{LeaveError, LeaveService};
use crate::core::nicknames::{NicknameError, NicknameService};
use crate::core::records::{RecordError, RecordService};
use crate::core::roblox::{RobloxError, RobloxService};
use crate::core::shifts::{ShiftError, ShiftService};
use crate::infra::callsigns::SqliteCallsignStore;
use crate::infra::guild_settings::SqliteSettingsStore;
use crate::infra::leave::SqliteLeaveStore;
use crate::infra::records::SqliteRecordStore;
use crate::infra::roblox::RobloxApiClient;
use crate::infra::shifts::SqliteShiftStore;
use std::sync::Arc;

pub type Settings = GuildSettingsService<SqliteSettingsStore>;
pub type Leave = LeaveService<SqliteLeaveStore>;

/// Shared state handed to every command.
pub struct Data {
    pub settings: Arc<Settings>,
    pub shifts: Arc<ShiftService<SqliteShiftStore>>,
    pub leave: Arc<Leave>,
    pub records: Arc<RecordService<SqliteRecordStore>>,
    pub callsigns: Arc<CallsignService<SqliteCallsignStore>>,
    pub roblox: Arc<RobloxService<RobloxApiClient>>,
    pub nicknames: Arc<NicknameService>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// A failure caused by the member's input or state, shown to them verbatim.
#[derive(Debug)]
pub struct UserError(pub String);

impl UserError {
    pub fn boxed(message: impl Into<String>) -> Error {
        Box::new(UserError(message.into()))
    }
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UserError {}

/// Shorthand for bailing out of a command with a message for the member.
pub fn reject<T>(message: impl Into<String>) -> Result<T, Error> {
    Err(UserError::boxed(message))
}

/// Core errors decide which of their variants a member may see.
pub trait UserFacing: std::error::Error + Send + Sync + 'static {
    /// `None` means the error is internal and should only be logged.
    fn user_message(&self) -> Option<String>;
}

macro_rules! storage_is_internal {
    ($($error:ident),* $(,)?) => {
        $(
            impl UserFacing for $error {
                fn user_message(&self) -> Option<String> {
                    match self {
                        $error::Storage(_) => None,
                        other => Some(other.to_string()),
                    }
                }
            }
        )*
    };
}

storage_is_internal!(SettingsError, ShiftError, LeaveError, RecordError, CallsignError);

impl UserFacing for NicknameError {
    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl UserFacing for RobloxError {
    fn user_message(&self) -> Option<String> {
        match self {
            RobloxError::InvalidUsername(_) => Some(self.to_string()),
            RobloxError::Api(_) => {
                Some("Roblox isn't responding right now, try again in a minute.".to_string())
            }
        }
    }
}

pub trait OrReject<T> {
    /// Convert a core error into the command error type, marking it user-facing where it is.
    fn or_reject(self) -> Result<T, Error>;
}

impl<T, E: UserFacing> OrReject<T> for Result<T, E> {
    fn or_reject(self) -> Result<T, Error> {
        self.map_err(|e| match e.user_message() {
            Some(message) => UserError::boxed(message),
            None => Box::new(e) as Error,
        })
    }
}
