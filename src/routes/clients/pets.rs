use anyhow::Context;
use axum::{Extension, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, AuthClient},
    models::PetEntity,
    schema::pets,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/clients/pets",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_pets))
            .route_layer(axum::middleware::from_fn(middleware::clients_authorization)),
    )
}

/// Fetch the authenticated client's pets together with their next appointment.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Pets"],
    security(("clientId" = [])),
    responses(
        (status = 200, description = "List my pets", body = StdResponse<Vec<PetEntity>, String>)
    )
)]
async fn get_my_pets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthClient>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pets: Vec<PetEntity> = pets::table
        .filter(pets::client_id.eq(auth.client_id))
        .order_by(pets::name.asc())
        .select(PetEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get my pets")?;

    Ok(StdResponse {
        data: Some(pets),
        message: Some("Get my pets successfully"),
    })
}
