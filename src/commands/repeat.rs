use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, GuildId,
};

use super::{defer, finish, guild_of, queue_manager, str_option};
use crate::queue::{LoopMode, QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::String, "mode", "Repeat mode")
        .add_string_choice("Off", LoopMode::Off.as_str())
        .add_string_choice("Whole queue", LoopMode::All.as_str())
        .add_string_choice("Current track", LoopMode::Track.as_str());
    CreateCommand::new("loop")
        .description("Check or change the repeat mode")
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
            let mode: LoopMode = mode.parse()?;
            queue.set_loop(mode)?;
            Ok(format!("Repeat mode set to `{mode}`."))
        }
        None => Ok(format!("Repeat mode is `{}`.", queue.settings().loop_mode)),
    }
}
