use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, EditInteractionResponse,
};

use super::{defer, failure, guild_of, notice, queue_manager};
use crate::queue::{QueueError, QueueSnapshot};

pub fn definition() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the playing track")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;
    let snapshot = manager.queue(guild_id).await?.snapshot();

    let embed = match describe(&snapshot) {
        Some(text) => notice(text),
        None => failure(QueueError::NothingPlaying.to_string()),
    };
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embeds(vec![embed]))
        .await?;
    Ok(())
}

fn describe(snapshot: &QueueSnapshot) -> Option<String> {
    if !snapshot.playing {
        return None;
    }
    let position = snapshot.settings.position?;
    let entry = snapshot.current()?;
    let state = if snapshot.paused { " (paused)" } else { "" };
    Some(format!(
        "#{:03} {}{} requested by <@{}>",
        position + 1,
        entry.playback_url(),
        state,
        entry.requester
    ))
}

#[cfg(test)]
mod tests {
    use serenity::all::{GuildId, UserId};

    use super::*;
    use crate::queue::{QueueEntry, QueueSettings, TrackType};

    fn snapshot(playing: bool, paused: bool) -> QueueSnapshot {
        QueueSnapshot {
            settings: QueueSettings {
                position: Some(1),
                ..QueueSettings::defaults(GuildId::new(1), 100)
            },
            entries: vec![
                QueueEntry::new(UserId::new(2), TrackType::YouTube, "one"),
                QueueEntry::new(UserId::new(3), TrackType::SoundCloud, "artist/two"),
            ],
            playing,
            paused,
        }
    }

    #[test]
    fn shows_the_current_entry() {
        assert_eq!(
            describe(&snapshot(true, false)).unwrap(),
            "#002 https://soundcloud.com/artist/two requested by <@3>"
        );
        assert!(describe(&snapshot(true, true)).unwrap().contains("(paused)"));
    }

    #[test]
    fn nothing_when_idle() {
        assert_eq!(describe(&snapshot(false, false)), None);
    }
}
