use anyhow::Result;
use serenity::all::{
    ChannelType, CommandInteraction, CommandOptionType, Context as SerenityContext,
    CreateCommand, CreateCommandOption, EditInteractionResponse,
};

use super::{
    bind_announcements, caller_voice_channel, channel_option, defer, failure, finish, guild_of,
    queue_manager,
};
use crate::queue::QueueError;

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(
        CommandOptionType::Channel,
        "channel",
        "Channel to join; defaults to the one you are in",
    )
    .channel_types(vec![ChannelType::Voice, ChannelType::Stage]);
    CreateCommand::new("join")
        .description("Add or move me to a voice channel")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;

    let channel_id = match channel_option(cmd, "channel") {
        Some(channel_id) => Some(channel_id),
        None => caller_voice_channel(ctx, cmd)?,
    };
    let Some(channel_id) = channel_id else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().embeds(vec![failure(
                "Join a voice channel or name one for me to join.",
            )]),
        )
        .await?;
        return Ok(());
    };
    bind_announcements(ctx, cmd).await;

    let manager = queue_manager(ctx).await?;
    let outcome = manager
        .controller()
        .connect(guild_id, channel_id)
        .await
        .map(|()| format!("Connected to <#{channel_id}>."))
        .map_err(QueueError::from);
    finish(ctx, cmd, outcome).await
}
