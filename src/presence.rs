//! Leaves voice when the bot is left alone or kicked out.

use serenity::all::{ChannelId, Context as SerenityContext, GuildId, UserId, VoiceState};
use tracing::{debug, info};

use crate::announce::AnnouncerKey;
use crate::commands::queue_manager;
use crate::playback::{Announcement, Announcer};

enum Departure {
    /// Someone left the channel the bot is in and no listeners remain.
    Abandoned,
    /// The bot itself was removed from voice.
    Kicked,
}

pub async fn on_voice_state_update(
    ctx: &SerenityContext,
    old: Option<VoiceState>,
    new: &VoiceState,
) -> anyhow::Result<()> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let bot_id = ctx.cache.current_user().id;
    let Some(departure) = departure(ctx, guild_id, bot_id, old, new) else {
        return Ok(());
    };

    let manager = queue_manager(ctx).await?;
    match manager.leave(guild_id).await {
        Ok(()) => info!("Guild {} left voice: nobody is listening", guild_id),
        // Kicked: songbird may already have dropped the call.
        Err(e) => debug!("Guild {} leave after voice change: {}", guild_id, e),
    }

    if let Departure::Abandoned = departure {
        let data = ctx.data.read().await;
        if let Some(announcer) = data.get::<AnnouncerKey>() {
            announcer.announce(guild_id, Announcement::Disconnected);
        }
    }
    Ok(())
}

fn departure(
    ctx: &SerenityContext,
    guild_id: GuildId,
    bot_id: UserId,
    old: Option<VoiceState>,
    new: &VoiceState,
) -> Option<Departure> {
    let left: ChannelId = old.and_then(|o| o.channel_id)?;
    if new.channel_id == Some(left) {
        return None;
    }
    if new.user_id == bot_id {
        return new.channel_id.is_none().then_some(Departure::Kicked);
    }

    let guild = ctx.cache.guild(guild_id)?;
    let bot_channel = guild.voice_states.get(&bot_id).and_then(|vs| vs.channel_id);
    if bot_channel != Some(left) {
        return None;
    }
    let listeners = guild
        .voice_states
        .values()
        .filter(|vs| vs.channel_id == Some(left) && vs.user_id != bot_id)
        .filter(|vs| {
            let is_bot = vs
                .member
                .as_ref()
                .map(|m| m.user.bot)
                .or_else(|| guild.members.get(&vs.user_id).map(|m| m.user.bot));
            !is_bot.unwrap_or(false)
        })
        .count();
    (listeners == 0).then_some(Departure::Abandoned)
}
