use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::GuildId;
use serenity::prelude::TypeMapKey;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{EngineError, QueueResult};
use super::guild::GuildQueue;
use super::store::QueueStore;
use crate::playback::{Announcement, EngineEvent, PlaybackController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Volume a queue gets when its settings are reset.
    pub default_volume: u8,
    /// Engine errors in a row tolerated before a queue is abandoned.
    pub max_consecutive_errors: u32,
    /// How long an empty, silent queue stays in memory.
    pub idle_timeout: Duration,
    /// Most entries one guild may queue.
    pub max_queue_size: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            default_volume: 100,
            max_consecutive_errors: 5,
            idle_timeout: Duration::from_secs(600),
            max_queue_size: 500,
        }
    }
}

/// Loaded at most once; concurrent first callers wait on the same load.
type GuildSlot = OnceCell<Arc<Mutex<GuildQueue>>>;

/// Registry of loaded guild queues.
///
/// [`QueueManager::queue`] is the only way to reach a [`GuildQueue`]; the
/// guard it returns is the per-guild critical section. Different guilds
/// never wait on each other.
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    controller: PlaybackController,
    options: QueueOptions,
    guilds: Mutex<HashMap<GuildId, Arc<GuildSlot>>>,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        controller: PlaybackController,
        options: QueueOptions,
    ) -> Self {
        Self {
            store,
            controller,
            options,
            guilds: Mutex::new(HashMap::new()),
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Lock the queue of `guild_id`, loading it from the store first if
    /// needed. Callers arriving while the load runs wait for it.
    pub async fn queue(&self, guild_id: GuildId) -> QueueResult<OwnedMutexGuard<GuildQueue>> {
        loop {
            let slot = {
                let mut guilds = self.guilds.lock().await;
                guilds.entry(guild_id).or_default().clone()
            };

            let queue = slot
                .get_or_try_init(|| async {
                    GuildQueue::load(
                        guild_id,
                        self.store.clone(),
                        self.controller.clone(),
                        self.options,
                    )
                    .map(|queue| Arc::new(Mutex::new(queue)))
                })
                .await?
                .clone();

            let mut guard = queue.lock_owned().await;
            if guard.is_evicted() {
                // Evicted between the map lookup and the lock; start over.
                continue;
            }
            guard.touch();
            return Ok(guard);
        }
    }

    /// Route an engine notification to its guild.
    pub async fn handle_event(&self, event: EngineEvent) -> QueueResult<Option<Announcement>> {
        let mut queue = self.queue(event.guild_id).await?;
        queue.handle_event(event).await
    }

    /// Stop playback and leave voice, keeping the queue for later.
    pub async fn leave(&self, guild_id: GuildId) -> QueueResult<()> {
        let mut queue = self.queue(guild_id).await?;
        queue.halt().await;
        self.controller.disconnect(guild_id).await?;
        Ok(())
    }

    /// Number of guild queues held in memory.
    pub async fn loaded(&self) -> usize {
        self.guilds.lock().await.len()
    }

    /// Drop queues that are empty, silent, and untouched for the idle
    /// timeout. Busy queues are left alone. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut guilds = self.guilds.lock().await;
        let timeout = self.options.idle_timeout;
        let mut evicted = Vec::new();

        guilds.retain(|guild_id, slot| {
            let Some(queue) = slot.get() else {
                // Never loaded (or the load failed); nobody is inside.
                return Arc::strong_count(slot) > 1;
            };
            let Ok(mut queue) = queue.try_lock() else {
                return true;
            };
            if queue.is_idle() && queue.idle_for() >= timeout {
                queue.mark_evicted();
                debug!("Evicting idle queue for guild {}", guild_id);
                evicted.push(*guild_id);
                false
            } else {
                true
            }
        });

        drop(guilds);

        for guild_id in &evicted {
            match self.controller.disconnect(*guild_id).await {
                Ok(()) | Err(EngineError::NotConnected) => {}
                Err(e) => warn!("Guild {} failed to leave voice on eviction: {}", guild_id, e),
            }
        }
        if !evicted.is_empty() {
            info!("Evicted {} idle guild queues", evicted.len());
        }
        evicted.len()
    }

    /// Periodically evict idle queues.
    pub fn spawn_eviction_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.evict_idle().await;
            }
        })
    }
}

pub struct QueueManagerKey;

impl TypeMapKey for QueueManagerKey {
    type Value = Arc<QueueManager>;
}
