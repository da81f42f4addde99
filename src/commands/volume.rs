use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, GuildId,
};

use super::{defer, finish, guild_of, int_option, queue_manager};
use crate::queue::{QueueManager, QueueResult};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::Integer, "percent", "Volume from 0 to 100")
        .min_int_value(0)
        .max_int_value(100);
    CreateCommand::new("volume")
        .description("Check or change the playback volume")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let outcome = run(manager.as_ref(), guild_id, int_option(cmd, "percent")).await;
    finish(ctx, cmd, outcome).await
}

async fn run(
    manager: &QueueManager,
    guild_id: GuildId,
    percent: Option<i64>,
) -> QueueResult<String> {
    let mut queue = manager.queue(guild_id).await?;
    match percent {
        Some(percent) => {
            queue.set_volume(percent).await?;
            Ok(format!("Volume set to `{percent}%`."))
        }
        None => Ok(format!("The volume is set to `{}%`.", queue.settings().volume)),
    }
}
