use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serenity::all::{ChannelId, CreateEmbed, CreateMessage, GuildId, Http};
use serenity::prelude::TypeMapKey;
use tracing::{debug, warn};

use crate::commands::{failure, notice};
use crate::playback::{Announcement, Announcer};

/// Posts announcements to the text channel a guild last drove the bot from.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channels: Mutex<HashMap<GuildId, ChannelId>>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(guild_id, channel_id);
        }
    }

    fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(&guild_id).copied())
    }
}

impl Announcer for ChannelAnnouncer {
    fn announce(&self, guild_id: GuildId, announcement: Announcement) {
        let Some(channel_id) = self.channel(guild_id) else {
            debug!("Guild {} has no announcement channel, dropping {:?}", guild_id, announcement);
            return;
        };
        let embed = render(&announcement);
        let http = self.http.clone();
        tokio::spawn(async move {
            let message = CreateMessage::new().embed(embed);
            if let Err(e) = channel_id.send_message(&http, message).await {
                warn!("Guild {} failed to post announcement: {}", guild_id, e);
            }
        });
    }
}

fn render(announcement: &Announcement) -> CreateEmbed {
    match announcement {
        Announcement::SessionFailed { .. } => failure(text(announcement)),
        _ => notice(text(announcement)),
    }
}

fn text(announcement: &Announcement) -> String {
    match announcement {
        Announcement::NowPlaying(entry) => {
            format!("Now playing {} (requested by <@{}>).", entry.playback_url(), entry.requester)
        }
        Announcement::Finished => "Reached the end of the queue. See you next time!".to_string(),
        Announcement::SessionFailed { errors } => format!(
            "{errors} tracks in a row failed to play, so I cleared the queue and left."
        ),
        Announcement::Disconnected => {
            "Everyone left, so I did too. The queue is saved; use /resume to continue.".to_string()
        }
    }
}

pub struct AnnouncerKey;

impl TypeMapKey for AnnouncerKey {
    type Value = Arc<ChannelAnnouncer>;
}
