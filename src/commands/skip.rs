use anyhow::Result;
use serenity::all::{CommandInteraction, Context as SerenityContext, CreateCommand, GuildId};

use super::{defer, finish, guild_of, queue_manager};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next queued track")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id).await;
    finish(ctx, cmd, outcome).await
}

async fn run(manager: &QueueManager, guild_id: GuildId) -> QueueResult<String> {
    manager.queue(guild_id).await?.skip().await?;
    Ok("Skipped.".to_string())
}
