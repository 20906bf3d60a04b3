use std::{collections::HashSet, convert::Infallible, time::Duration};

use anyhow::Context;
use axum::{
    Extension,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use futures::{Stream, StreamExt, stream};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    events::AppointmentEvent,
    middleware::{self, AuthClient},
    models::AppointmentEntity,
    scheduling::{
        availability::day_bounds_utc,
        execution::{ExecutionBoard, ServiceExecution, partition_executions},
        status::tracked_status_strings,
    },
    schema::appointments,
    store::client_pet_ids,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Defines the client-facing execution tracker routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/clients/executions",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_executions))
            .routes(utoipa_axum::routes!(stream_execution_events))
            .route_layer(axum::middleware::from_fn(middleware::clients_authorization)),
    )
}

/// Today's and upcoming services of the client's pets, split into active
/// and recently finished.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Executions"],
    security(("clientId" = [])),
    responses(
        (status = 200, description = "Get executions successfully", body = StdResponse<ExecutionBoard, String>)
    )
)]
async fn get_executions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthClient>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet_ids = client_pet_ids(conn, auth.client_id).await?;
    if pet_ids.is_empty() {
        return Ok(StdResponse {
            data: Some(ExecutionBoard::default()),
            message: Some("Get executions successfully"),
        });
    }

    let offset = state.scheduling.business_offset;
    let today = Utc::now().with_timezone(&offset).date_naive();
    let (today_start, _) = day_bounds_utc(today, offset)
        .context("Today is outside the supported date range")?;

    let rows: Vec<AppointmentEntity> = appointments::table
        .filter(appointments::pet_id.eq_any(&pet_ids))
        .filter(appointments::start_time.ge(today_start))
        .filter(appointments::status.eq_any(tracked_status_strings()))
        .order_by(appointments::start_time.asc())
        .select(AppointmentEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get executions")?;

    let board = partition_executions(rows.iter().map(ServiceExecution::from).collect());

    Ok(StdResponse {
        data: Some(board),
        message: Some("Get executions successfully"),
    })
}

/// Live changes to the client's appointments as Server-Sent Events.
///
/// The first frame carries a `retry` hint equal to the polling interval that
/// clients should fall back to when the stream drops.
#[utoipa::path(
    get,
    path = "/events",
    tags = ["Executions"],
    security(("clientId" = [])),
    responses(
        (status = 200, description = "Event stream of appointment changes", content_type = "text/event-stream", body = AppointmentEvent)
    )
)]
async fn stream_execution_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthClient>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let pet_ids: HashSet<_> = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;
        client_pet_ids(conn, auth.client_id)
            .await?
            .into_iter()
            .collect()
    };

    let hello = Event::default()
        .retry(state.scheduling.tracker_poll_interval)
        .comment("subscribed");
    let updates = state
        .events
        .subscribe_pets(pet_ids)
        .filter_map(|event| futures::future::ready(event_frame(&event)));

    let stream = stream::once(futures::future::ready(hello))
        .chain(updates)
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

fn event_frame(event: &AppointmentEvent) -> Option<Event> {
    match Event::default().event("update").json_data(event) {
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::warn!("Failed to encode appointment event: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{middleware::CLIENT_ID_HEADER, test_support::test_router};

    #[tokio::test]
    async fn test_tracker_requires_client_identity() {
        for path in ["/clients/executions", "/clients/executions/events"] {
            let app = test_router(routes_with_openapi());
            let res = app
                .oneshot(
                    Request::get(path)
                        .header(CLIENT_ID_HEADER, "not-a-uuid")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "path {path}");
        }
    }
}
