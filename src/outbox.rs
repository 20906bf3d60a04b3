//! Transactional outbox. Integration events are stored next to the change
//! that caused them and relayed to the broker afterwards.

use std::time::Duration;

use anyhow::{Context, Result};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use lapin::{BasicProperties, Channel, options::BasicPublishOptions};
use serde::Serialize;
use tracing::{error, info};

use crate::{
    db::DbPool,
    models::{CreateOutboxEntity, OutboxEntity},
    schema::outbox,
};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SENT: &str = "SENT";

const RELAY_BATCH_SIZE: i64 = 100;

pub async fn publish<T: Serialize>(
    conn: &mut AsyncPgConnection,
    event_type: String,
    payload: T,
) -> Result<()> {
    let payload = serde_json::to_string(&payload).context("Failed to serialize outbox payload")?;

    diesel::insert_into(outbox::table)
        .values(CreateOutboxEntity {
            event_type,
            payload,
        })
        .execute(conn)
        .await
        .context("Failed to insert outbox event")?;

    Ok(())
}

/// Forwards pending outbox rows to the broker until the task is aborted.
pub async fn run_relay(pool: DbPool, channel: Channel, poll_interval: Duration) {
    info!("Starting outbox relay with interval {:?}", poll_interval);
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        interval.tick().await;
        match relay_pending(&pool, &channel).await {
            Ok(0) => {}
            Ok(sent) => info!("Relayed {} outbox events", sent),
            Err(err) => error!("Outbox relay failed: {:#}", err),
        }
    }
}

async fn relay_pending(pool: &DbPool, channel: &Channel) -> Result<usize> {
    let conn = &mut pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pending: Vec<OutboxEntity> = outbox::table
        .filter(outbox::status.eq(STATUS_PENDING))
        .order_by(outbox::id.asc())
        .limit(RELAY_BATCH_SIZE)
        .select(OutboxEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to load pending outbox events")?;

    let mut sent = 0;
    for event in pending {
        channel
            .basic_publish(
                "".into(),
                event.event_type.as_str().into(),
                BasicPublishOptions::default(),
                event.payload.as_bytes(),
                BasicProperties::default(),
            )
            .await
            .with_context(|| format!("Failed to publish outbox event #{}", event.id))?
            .await
            .with_context(|| format!("Broker did not confirm outbox event #{}", event.id))?;

        diesel::update(outbox::table.find(event.id))
            .set((
                outbox::status.eq(STATUS_SENT),
                outbox::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await
            .context("Failed to mark outbox event as sent")?;

        sent += 1;
    }

    Ok(sent)
}
