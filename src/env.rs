use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use songbird::driver::MixMode;
use tracing::warn;

use crate::database::models::MAX_GUILD_ENTRIES;
use crate::queue::QueueOptions;

pub fn read_discord_token() -> Result<String> {
    const CANDIDATES: &[&str] = &["DISCORD_TOKEN", "DISCORD_BOT_TOKEN", "BOT_TOKEN"];
    for key in CANDIDATES {
        if let Ok(val) = std::env::var(key)
            && !val.is_empty()
        {
            return Ok(val);
        }
    }
    Err(anyhow!(
        "Set one of DISCORD_TOKEN, DISCORD_BOT_TOKEN, or BOT_TOKEN in environment"
    ))
}

/// Runtime tunables read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub database_url: String,
    pub queue: QueueOptions,
    pub evict_interval: Duration,
    pub mix_mode: MixMode,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = QueueOptions::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "encore.db".to_string());
        let default_volume = parse_or(&lookup, "ENCORE_DEFAULT_VOLUME", defaults.default_volume, |v| {
            *v <= 100
        });
        let idle_secs = parse_or(
            &lookup,
            "ENCORE_IDLE_EVICT_SECS",
            defaults.idle_timeout.as_secs(),
            |_| true,
        );
        let evict_secs = parse_or(&lookup, "ENCORE_EVICT_INTERVAL_SECS", 60u64, |v| *v > 0);
        let max_errors = parse_or(
            &lookup,
            "ENCORE_MAX_TRACK_ERRORS",
            defaults.max_consecutive_errors,
            |_| true,
        );
        let max_queue_size = parse_or(
            &lookup,
            "ENCORE_MAX_QUEUE_SIZE",
            defaults.max_queue_size,
            |v| (1..=MAX_GUILD_ENTRIES).contains(v),
        );
        let mix_mode = match lookup("ENCORE_MIX_MODE").as_deref() {
            Some("mono") => MixMode::Mono,
            _ => MixMode::Stereo,
        };

        Self {
            database_url,
            queue: QueueOptions {
                default_volume,
                max_consecutive_errors: max_errors,
                idle_timeout: Duration::from_secs(idle_secs),
                max_queue_size,
            },
            evict_interval: Duration::from_secs(evict_secs),
            mix_mode,
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            warn!("Ignoring {}={:?}, using {:?}", key, raw, default);
            default
        }
    }
}
