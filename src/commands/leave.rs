use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, EditInteractionResponse,
};

use super::{defer, failure, guild_of, queue_manager, success};
use crate::queue::QueueError;
use crate::queue::error::EngineError;

pub fn definition() -> CreateCommand {
    CreateCommand::new("leave").description("Remove me from the voice channel")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;

    let embed = match manager.leave(guild_id).await {
        Ok(()) => success("Disconnected. The queue is saved; use /resume to continue."),
        Err(QueueError::Engine(EngineError::NotConnected)) => {
            failure("I am not connected to any voice channels.")
        }
        Err(e) => failure(e.to_string()),
    };
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embeds(vec![embed]))
        .await?;
    Ok(())
}
