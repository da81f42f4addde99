use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateEmbed,
    CreateEmbedFooter, EditInteractionResponse,
};

use super::{defer, guild_of, queue_manager};
use crate::queue::QueueSnapshot;

const MAX_LISTED: usize = 15;

pub fn definition() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let manager = queue_manager(ctx).await?;
    let snapshot = manager.queue(guild_id).await?.snapshot();

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().embeds(vec![render(&snapshot)]),
    )
    .await?;
    Ok(())
}

fn render(snapshot: &QueueSnapshot) -> CreateEmbed {
    let settings = &snapshot.settings;
    let footer = format!(
        "order: {} · loop: {} · volume: {}%",
        settings.order, settings.loop_mode, settings.volume
    );
    let mut embed = CreateEmbed::new()
        .title("🎶 Queue")
        .description(describe(snapshot))
        .footer(CreateEmbedFooter::new(footer))
        .colour(0x5865F2);
    if let Some(entry) = snapshot.current().filter(|_| snapshot.playing) {
        embed = embed.field("Now playing", entry.playback_url(), false);
    }
    embed
}

fn describe(snapshot: &QueueSnapshot) -> String {
    if snapshot.entries.is_empty() {
        return "The queue is empty.".to_string();
    }

    let current = snapshot.settings.position;
    let mut lines: Vec<String> = snapshot
        .entries
        .iter()
        .enumerate()
        .take(MAX_LISTED)
        .map(|(i, entry)| {
            let marker = match (Some(i) == current, snapshot.playing && !snapshot.paused) {
                (true, true) => "▶️ ",
                (true, false) => "⏸️ ",
                _ => "",
            };
            format!(
                "{marker}`#{}` {} (<@{}>)",
                i + 1,
                entry.playback_url(),
                entry.requester
            )
        })
        .collect();
    if snapshot.entries.len() > MAX_LISTED {
        lines.push(format!("… and {} more", snapshot.entries.len() - MAX_LISTED));
    }
    lines.join("\n")
}
