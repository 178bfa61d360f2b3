// Bot presence. Set once the gateway reports ready.

use poise::serenity_prelude as serenity;

/// Shown as "Watching over N departments".
pub fn status_text(guild_count: usize) -> String {
    match guild_count {
        1 => "over 1 department".to_string(),
        n => format!("over {} departments", n),
    }
}

pub fn on_ready(ctx: &serenity::Context, ready: &serenity::Ready) {
    let activity = serenity::ActivityData::watching(status_text(ready.guilds.len()));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_pluralises() {
        assert_eq!(status_text(1), "over 1 department");
        assert_eq!(status_text(4), "over 4 departments");
    }
}
