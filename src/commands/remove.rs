use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, GuildId,
};

use super::{defer, finish, guild_of, queue_index, queue_manager};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::Integer, "position", "Queue position")
        .required(true)
        .min_int_value(1);
    CreateCommand::new("remove")
        .description("Remove a track from the queue")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let index = queue_index(cmd, "position")?;
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id, index).await;
    finish(ctx, cmd, outcome).await
}

async fn run(manager: &QueueManager, guild_id: GuildId, index: usize) -> QueueResult<String> {
    let removed = manager.queue(guild_id).await?.remove_at(index).await?;
    Ok(format!(
        "Removed `{}` from position #{}.",
        removed.identifier,
        index + 1
    ))
}
