use anyhow::Result;
use serenity::all::{
    ChannelId, CommandInteraction, Context as SerenityContext, CreateCommand, GuildId,
};

use super::{bind_announcements, defer, finish, guild_of, queue_manager, require_voice};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    CreateCommand::new("resume").description("Continue a paused track or the saved queue")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let Some(channel_id) = require_voice(ctx, cmd).await? else {
        return Ok(());
    };
    bind_announcements(ctx, cmd).await;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id, channel_id).await;
    finish(ctx, cmd, outcome).await
}

async fn run(
    manager: &QueueManager,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> QueueResult<String> {
    let mut queue = manager.queue(guild_id).await?;
    if queue.is_paused() {
        queue.resume().await?;
        let current = queue.snapshot();
        return Ok(match current.current() {
            Some(entry) => format!("Resumed playback of `{}`.", entry.identifier),
            None => "Resumed playback.".to_string(),
        });
    }

    // After a restart or a kick there is no voice connection to play on.
    manager.controller().connect(guild_id, channel_id).await?;
    queue.resume().await?;
    Ok(match queue.settings().position {
        Some(p) => format!("Playing from position #{}.", p + 1),
        None => "The queue is empty.".to_string(),
    })
}
