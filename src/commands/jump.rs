use anyhow::Result;
use serenity::all::{
    ChannelId, CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, GuildId,
};

use super::{
    bind_announcements, defer, finish, guild_of, queue_index, queue_manager, require_voice,
};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::Integer, "position", "Queue position")
        .required(true)
        .min_int_value(1);
    CreateCommand::new("jump")
        .description("Play the queue from a position")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let index = queue_index(cmd, "position")?;
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let Some(channel_id) = require_voice(ctx, cmd).await? else {
        return Ok(());
    };
    bind_announcements(ctx, cmd).await;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id, channel_id, index).await;
    finish(ctx, cmd, outcome).await
}

async fn run(
    manager: &QueueManager,
    guild_id: GuildId,
    channel_id: ChannelId,
    index: usize,
) -> QueueResult<String> {
    manager.controller().connect(guild_id, channel_id).await?;
    manager.queue(guild_id).await?.jump(index).await?;
    Ok(format!("Playing from position #{}.", index + 1))
}
