use anyhow::Result;
use axum::Router;
use petshop_bookingservice::{
    app_state::{AppState, EventBus},
    bootstrap::{self, ConsumerHandler, bootstrap},
    config, consumers, db,
    events::TENANT_SUSPENDED_QUEUE,
    routes, swagger,
};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let routes = routes::availability::routes_with_openapi()
        .merge(routes::clients::appointments::routes_with_openapi())
        .merge(routes::clients::pets::routes_with_openapi())
        .merge(routes::clients::executions::routes_with_openapi())
        .merge(routes::tenants::appointments::routes_with_openapi());

    let (routes, mut openapi) = routes.split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("PetShop BookingService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi);

    let app = Router::new().merge(routes).merge(swagger_ui);

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(&config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let state = AppState {
        db_pool: db::create_pool(&config.database).await?,
        events: EventBus::default(),
        scheduling: config.scheduling.clone(),
    };

    tracing::info!("Bootstrapping...");
    bootstrap(
        "BookingService",
        app,
        state,
        &config,
        &[(
            TENANT_SUSPENDED_QUEUE,
            consumers::tenants::tenant_suspended as ConsumerHandler,
        )],
    )
    .await?;
    Ok(())
}
