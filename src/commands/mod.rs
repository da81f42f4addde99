use std::sync::Arc;

use anyhow::{Result, anyhow};
use serenity::all::{
    ChannelId, CommandDataOptionValue, CommandInteraction, Context as SerenityContext,
    CreateCommand, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, GuildId,
};

use crate::announce::AnnouncerKey;
use crate::queue::{QueueManager, QueueManagerKey, QueueResult};

pub mod join;
pub mod jump;
pub mod leave;
pub mod nowplaying;
pub mod order;
pub mod pause;
pub mod play;
pub mod queue;
pub mod remove;
pub mod repeat;
pub mod resume;
pub mod shuffle;
pub mod skip;
pub mod stop;
pub mod volume;

const COLOUR_SUCCESS: u32 = 0x00FF7F; // Spring green
const COLOUR_FAILURE: u32 = 0xFF6B6B; // Red
const COLOUR_NOTICE: u32 = 0xE26682; // Pink

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        join::definition(),
        leave::definition(),
        play::definition(),
        pause::definition(),
        resume::definition(),
        skip::definition(),
        stop::definition(),
        remove::definition(),
        jump::definition(),
        queue::definition(),
        nowplaying::definition(),
        repeat::definition(),
        order::definition(),
        volume::definition(),
        shuffle::definition(),
    ]
}

/// Run the handler for `cmd`. Returns `Ok(false)` for commands we do not own.
pub async fn dispatch(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<bool> {
    match cmd.data.name.as_str() {
        "join" => join::handle(ctx, cmd).await?,
        "leave" => leave::handle(ctx, cmd).await?,
        "play" => play::handle(ctx, cmd).await?,
        "pause" => pause::handle(ctx, cmd).await?,
        "resume" => resume::handle(ctx, cmd).await?,
        "skip" => skip::handle(ctx, cmd).await?,
        "stop" => stop::handle(ctx, cmd).await?,
        "remove" => remove::handle(ctx, cmd).await?,
        "jump" => jump::handle(ctx, cmd).await?,
        "queue" => queue::handle(ctx, cmd).await?,
        "nowplaying" => nowplaying::handle(ctx, cmd).await?,
        "loop" => repeat::handle(ctx, cmd).await?,
        "order" => order::handle(ctx, cmd).await?,
        "volume" => volume::handle(ctx, cmd).await?,
        "shuffle" => shuffle::handle(ctx, cmd).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

pub(crate) async fn queue_manager(ctx: &SerenityContext) -> Result<Arc<QueueManager>> {
    let data = ctx.data.read().await;
    data.get::<QueueManagerKey>()
        .cloned()
        .ok_or_else(|| anyhow!("queue manager not registered"))
}

pub(crate) fn int_option(cmd: &CommandInteraction, name: &str) -> Option<i64> {
    cmd.data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::Integer(i) => Some(*i),
            _ => None,
        })
}

pub(crate) fn str_option<'a>(cmd: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    cmd.data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::String(s) => Some(s.as_str()),
            _ => None,
        })
}

pub(crate) fn channel_option(cmd: &CommandInteraction, name: &str) -> Option<ChannelId> {
    cmd.data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::Channel(c) => Some(*c),
            _ => None,
        })
}

/// 1-based index supplied by a user to a 0-based queue index.
pub(crate) fn queue_index(cmd: &CommandInteraction, name: &str) -> Result<usize> {
    int_option(cmd, name)
        .filter(|i| *i >= 1)
        .map(|i| (i - 1) as usize)
        .ok_or_else(|| anyhow!("missing {name}"))
}

pub(crate) fn success(message: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .description(message.into())
        .colour(COLOUR_SUCCESS)
}

pub(crate) fn notice(message: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .description(message.into())
        .colour(COLOUR_NOTICE)
}

pub(crate) fn failure(message: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .description(message.into())
        .colour(COLOUR_FAILURE)
}

/// Defer the interaction so slow queue work does not time it out.
pub(crate) async fn defer(ctx: &SerenityContext, cmd: &CommandInteraction) {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();
}

/// Edit the deferred response with the outcome of a queue operation.
pub(crate) async fn finish(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    outcome: QueueResult<String>,
) -> Result<()> {
    let embed = match outcome {
        Ok(message) => success(message),
        Err(e) => failure(e.to_string()),
    };
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embeds(vec![embed]))
        .await?;
    Ok(())
}

pub(crate) fn guild_of(cmd: &CommandInteraction) -> Result<GuildId> {
    cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))
}

/// Voice channel the invoking user is sitting in, per the cache.
pub(crate) fn caller_voice_channel(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
) -> Result<Option<ChannelId>> {
    let guild_id = guild_of(cmd)?;
    let guild = ctx
        .cache
        .guild(guild_id)
        .ok_or_else(|| anyhow!("guild not in cache"))?;
    Ok(guild
        .voice_states
        .get(&cmd.user.id)
        .and_then(|vs| vs.channel_id))
}

/// The caller's voice channel, or `None` after telling them to join one.
pub(crate) async fn require_voice(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
) -> Result<Option<ChannelId>> {
    let channel_id = caller_voice_channel(ctx, cmd)?;
    if channel_id.is_none() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .embeds(vec![failure("You must be in a voice channel.")]),
        )
        .await?;
    }
    Ok(channel_id)
}

/// Send this guild's playback announcements to the channel `cmd` came from.
pub(crate) async fn bind_announcements(ctx: &SerenityContext, cmd: &CommandInteraction) {
    let data = ctx.data.read().await;
    if let (Some(announcer), Some(guild_id)) = (data.get::<AnnouncerKey>(), cmd.guild_id) {
        announcer.bind(guild_id, cmd.channel_id);
    }
}
