use std::sync::Arc;

use anyhow::Result;
use serenity::{
    all::{
        Command as AppCommand, Context as SerenityContext, GatewayIntents, Interaction,
        Permissions, Ready, VoiceState,
    },
    async_trait,
};
use songbird::{Config as VoiceConfig, Songbird, serenity::SerenityInit};
use tokio::sync::mpsc;
use tracing::{error, info};

mod announce;
mod commands;
mod database;
mod env;
mod playback;
mod presence;
mod queue;
mod voice;

use announce::{AnnouncerKey, ChannelAnnouncer};
use playback::PlaybackController;
use queue::{QueueManager, QueueManagerKey, SqliteQueueStore};
use voice::SongbirdEngine;

struct Handler;

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        if let Err(e) = AppCommand::set_global_commands(&ctx.http, commands::definitions()).await {
            error!("failed to register global commands: {e:?}");
        }
    }

    async fn interaction_create(&self, ctx: SerenityContext, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            match commands::dispatch(&ctx, &cmd).await {
                Ok(true) => {}
                Ok(false) => info!("Ignoring unknown command /{}", cmd.data.name),
                Err(why) => error!("/{} failed: {why:?}", cmd.data.name),
            }
        }
    }

    async fn voice_state_update(
        &self,
        ctx: SerenityContext,
        old: Option<VoiceState>,
        new: VoiceState,
    ) {
        if let Err(why) = presence::on_voice_state_update(&ctx, old, &new).await {
            error!("voice state update failed: {why:?}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = env::read_discord_token()?;
    let config = env::BotConfig::from_env();

    let conn = database::establish_connection(&config.database_url)?;
    info!("Queue database: {}", config.database_url);
    let store = Arc::new(SqliteQueueStore::new(conn));

    // One track per guild at a time; no need for a larger pool.
    let voice_cfg = VoiceConfig::default()
        .preallocated_tracks(2)
        .mix_mode(config.mix_mode);
    let songbird = Songbird::serenity_from_config(voice_cfg);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(SongbirdEngine::new(songbird.clone(), events_tx));
    let manager = Arc::new(QueueManager::new(
        store,
        PlaybackController::new(engine),
        config.queue,
    ));

    manager.clone().spawn_eviction_task(config.evict_interval);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = serenity::Client::builder(token, intents)
        .event_handler(Handler)
        .register_songbird_with(songbird)
        .type_map_insert::<QueueManagerKey>(manager.clone())
        .await?;

    let announcer = Arc::new(ChannelAnnouncer::new(client.http.clone()));
    client
        .data
        .write()
        .await
        .insert::<AnnouncerKey>(announcer.clone());
    playback::spawn_event_pump(manager, events_rx, announcer);

    let app = client.http.get_current_application_info().await?;
    let perms = Permissions::CONNECT | Permissions::SPEAK;
    let invite = format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
        app.id,
        perms.bits()
    );
    info!("Invite this bot: {} (app_id={})", invite, app.id);
    info!(
        "Commands: /join, /leave, /play, /pause, /resume, /skip, /stop, /remove, /jump, /queue, /nowplaying, /loop, /order, /volume, /shuffle"
    );

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start_autosharded().await {
        error!("Client error: {why:?}");
    }
    Ok(())
}
