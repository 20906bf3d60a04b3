use std::{env, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::{FixedOffset, NaiveTime, Offset, Utc};

use crate::scheduling::availability::SlotGrid;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub amqp: Option<AmqpConfig>,
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub url: String,
    pub outbox_poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub grid: SlotGrid,
    pub business_offset: FixedOffset,
    pub tracker_poll_interval: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            grid: SlotGrid::default(),
            business_offset: Utc.fix(),
            tracker_poll_interval: Duration::from_secs(30),
        }
    }
}

/// Reads the service configuration from the environment.
///
/// `DATABASE_URL` is mandatory. Everything else has a default.
pub fn load() -> Result<Config> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool_size = parse_var("DB_POOL_SIZE", 10u32)?;
    let port = parse_var("PORT", 3000u16)?;

    let amqp = match env::var("AMQP_URL") {
        Ok(url) if !url.trim().is_empty() => Some(AmqpConfig {
            url,
            outbox_poll_interval: Duration::from_millis(parse_var("OUTBOX_POLL_MS", 1000u64)?),
        }),
        _ => None,
    };

    Ok(Config {
        server: ServerConfig { port },
        database: DatabaseConfig { url, pool_size },
        amqp,
        scheduling: load_scheduling()?,
    })
}

fn load_scheduling() -> Result<SchedulingConfig> {
    let day_start = parse_time_var("SLOT_DAY_START", "08:00")?;
    let day_end = parse_time_var("SLOT_DAY_END", "18:00")?;
    let step_minutes = parse_var("SLOT_STEP_MINUTES", 30u32)?;
    let grid = SlotGrid::new(day_start, day_end, step_minutes)?;

    let offset_minutes = parse_var("BUSINESS_UTC_OFFSET_MINUTES", 0i32)?;
    let Some(business_offset) = FixedOffset::east_opt(offset_minutes * 60) else {
        bail!("BUSINESS_UTC_OFFSET_MINUTES is out of range: {offset_minutes}");
    };

    let tracker_poll_interval = Duration::from_secs(parse_var("TRACKER_POLL_SECS", 30u64)?);

    Ok(SchedulingConfig {
        grid,
        business_offset,
        tracker_poll_interval,
    })
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

fn parse_time_var(name: &str, default: &str) -> Result<NaiveTime> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("{name} must be HH:MM, got {value}"))
}
