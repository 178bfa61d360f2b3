// Discord commands module.
// Each feature gets its own command file.

pub mod callsign;
pub mod config;
pub mod help;
pub mod loa;
pub mod nickname;
pub mod presence;
pub mod records;
pub mod roblox;
pub mod shift;

use crate::discord::{Data, Error};

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        shift::shift(),
        loa::loa(),
        records::citation(),
        records::arrest(),
        records::records(),
        callsign::callsign(),
        roblox::roblox(),
        nickname::nickname(),
        config::config(),
        help::help(),
    ]
}
