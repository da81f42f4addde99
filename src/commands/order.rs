use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, GuildId,
};

use super::{defer, finish, guild_of, queue_manager, str_option};
use crate::queue::{QueueManager, QueueOrder, QueueResult};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::String, "mode", "Playback order")
        .add_string_choice("Normal", QueueOrder::Normal.as_str())
        .add_string_choice("Reverse", QueueOrder::Reverse.as_str())
        .add_string_choice("Random", QueueOrder::Random.as_str());
    CreateCommand::new("order")
        .description("Check or change the playback order")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id, str_option(cmd, "mode")).await;
    finish(ctx, cmd, outcome).await
}

async fn run(manager: &QueueManager, guild_id: GuildId, mode: Option<&str>) -> QueueResult<String> {
    let mut queue = manager.queue(guild_id).await?;
    match mode {
        Some(mode) => {
            let order: QueueOrder = mode.parse()?;
            queue.set_order(order)?;
            Ok(format!("Playback order set to `{order}`."))
        }
        None => Ok(format!("Playback order is `{}`.", queue.settings().order)),
    }
}
