use anyhow::{Result, anyhow};
use serenity::all::{
    ChannelId, CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, EditInteractionResponse, GuildId, UserId,
};

use super::{
    bind_announcements, defer, failure, finish, guild_of, queue_manager, require_voice, str_option,
};
use crate::queue::{QueueManager, QueueResult, TrackType};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(
        CommandOptionType::String,
        "url",
        "YouTube, YouTube Music or SoundCloud link",
    )
    .required(true);
    CreateCommand::new("play")
        .description("Add a track to the queue")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let url = str_option(cmd, "url").ok_or_else(|| anyhow!("missing url"))?;
    defer(ctx, cmd).await;

    let guild_id = guild_of(cmd)?;
    let Some((source, identifier)) = TrackType::from_url(url) else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .embeds(vec![failure("I can only play YouTube and SoundCloud links.")]),
        )
        .await?;
        return Ok(());
    };

    let Some(channel_id) = require_voice(ctx, cmd).await? else {
        return Ok(());
    };
    bind_announcements(ctx, cmd).await;

    let manager = queue_manager(ctx).await?;
    let request = PlayRequest {
        guild_id,
        channel_id,
        requester: cmd.user.id,
        source,
        identifier,
    };
    let outcome = run(manager.as_ref(), request, url).await;
    finish(ctx, cmd, outcome).await
}

struct PlayRequest {
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: UserId,
    source: TrackType,
    identifier: String,
}

async fn run(manager: &QueueManager, request: PlayRequest, url: &str) -> QueueResult<String> {
    manager
        .controller()
        .connect(request.guild_id, request.channel_id)
        .await?;
    let mut queue = manager.queue(request.guild_id).await?;
    let was_playing = queue.is_playing();
    let index = queue
        .enqueue(request.requester, request.source, request.identifier)
        .await?;
    Ok(if !was_playing && queue.settings().position == Some(index) {
        format!("Now playing {url}.")
    } else {
        format!("Added {url} to the queue at position #{}.", index + 1)
    })
}
