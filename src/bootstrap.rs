use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing};
use futures::{StreamExt, future::BoxFuture};
use lapin::{
    Channel, Connection, ConnectionProperties,
    message::Delivery,
    options::{BasicConsumeOptions, BasicNackOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, config::Config, outbox};

pub type ConsumerHandler = fn(Delivery, Arc<AppState>) -> BoxFuture<'static, Result<()>>;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn init_env() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env: {err}");
        }
    }
}

/// Wires the broker (when configured) and serves `app` until ctrl-c.
pub async fn bootstrap(
    service_name: &str,
    app: Router<AppState>,
    state: AppState,
    config: &Config,
    consumers: &[(&str, ConsumerHandler)],
) -> Result<()> {
    // Held until the server stops so broker channels stay open.
    let _amqp_connection = match &config.amqp {
        Some(amqp) => {
            let connection = Connection::connect(&amqp.url, ConnectionProperties::default())
                .await
                .context("Failed to connect to RabbitMQ")?;

            let relay_channel = connection
                .create_channel()
                .await
                .context("Failed to open outbox channel")?;
            tokio::spawn(outbox::run_relay(
                state.db_pool.clone(),
                relay_channel,
                amqp.outbox_poll_interval,
            ));

            let shared_state = Arc::new(state.clone());
            for (queue, handler) in consumers {
                let channel = connection
                    .create_channel()
                    .await
                    .with_context(|| format!("Failed to open channel for {queue}"))?;
                let queue = queue.to_string();
                let state = shared_state.clone();
                let handler = *handler;
                tokio::spawn(async move {
                    if let Err(err) = run_consumer(channel, &queue, handler, state).await {
                        error!("Consumer for {} stopped: {:#}", queue, err);
                    }
                });
            }

            Some(connection)
        }
        None => {
            warn!("AMQP_URL is not set, outbox relay and consumers are disabled");
            None
        }
    };

    let app = app
        .route("/health", routing::get(|| async { "ok" }))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server.port))?;
    info!("{} listening on {}", service_name, listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("{} stopped", service_name);
    Ok(())
}

async fn run_consumer(
    channel: Channel,
    queue: &str,
    handler: ConsumerHandler,
    state: Arc<AppState>,
) -> Result<()> {
    channel
        .queue_declare(
            queue.into(),
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to declare queue {queue}"))?;

    let consumer_tag = format!("bookingservice.{queue}");
    let mut consumer = channel
        .basic_consume(
            queue.into(),
            consumer_tag.as_str().into(),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to consume {queue}"))?;

    info!("Consuming {}", queue);
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.context("Failed to receive delivery")?;
        let delivery_tag = delivery.delivery_tag;
        if let Err(err) = handler(delivery, state.clone()).await {
            error!("Failed to handle message from {}: {:#}", queue, err);
            channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    },
                )
                .await
                .context("Failed to nack delivery")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutdown signal received");
}
