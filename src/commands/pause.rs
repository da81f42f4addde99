use anyhow::Result;
use serenity::all::{CommandInteraction, Context as SerenityContext, CreateCommand, GuildId};

use super::{defer, finish, guild_of, queue_manager};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the playing track")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id).await;
    finish(ctx, cmd, outcome).await
}

async fn run(manager: &QueueManager, guild_id: GuildId) -> QueueResult<String> {
    let mut queue = manager.queue(guild_id).await?;
    queue.pause().await?;
    let snapshot = queue.snapshot();
    Ok(match snapshot.current() {
        Some(entry) => format!("Paused playback of `{}`.", entry.identifier),
        None => "Paused.".to_string(),
    })
}
