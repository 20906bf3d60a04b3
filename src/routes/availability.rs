use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    scheduling::{
        availability::{TimeSlot, compute_slots, day_bounds_utc, unknown_slots},
        booking::parse_date,
        status::AppointmentStatus,
    },
    schema::appointments,
};

/// Public slot lookup used by the booking flow.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/availability",
        OpenApiRouter::new().routes(utoipa_axum::routes!(get_availability)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AvailabilityQuery {
    /// Business-local date, `YYYY-MM-DD`.
    date: String,
}

#[derive(Serialize, ToSchema)]
struct AvailabilityRes {
    tenant_id: Uuid,
    date: NaiveDate,
    /// False when bookings could not be read and every slot is `unknown`.
    complete: bool,
    slots: Vec<TimeSlot>,
}

/// List the bookable slots of a tenant for one day.
#[utoipa::path(
    get,
    path = "/{tenant_id}",
    tags = ["Availability"],
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant to check"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Get availability successfully", body = StdResponse<AvailabilityRes, String>),
        (status = 400, description = "Date is not a calendar date")
    )
)]
async fn get_availability(
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let date = parse_date(&query.date)
        .ok_or_else(|| AppError::BadRequest(format!("{} is not a valid date", query.date)))?;

    let scheduling = &state.scheduling;
    let bounds = day_bounds_utc(date, scheduling.business_offset).ok_or_else(|| {
        AppError::BadRequest(format!("{} is out of the supported range", query.date))
    })?;
    let (slots, complete) = match booked_starts(&state, tenant_id, bounds).await {
        Ok(bookings) => {
            let slots = compute_slots(
                &scheduling.grid,
                date,
                scheduling.business_offset,
                bookings
                    .iter()
                    .map(|(start, status)| (*start, status.as_str())),
            );
            (slots, true)
        }
        Err(err) => {
            error!(
                "Failed to load bookings of tenant {} for {}: {:#}",
                tenant_id, date, err
            );
            (unknown_slots(&scheduling.grid), false)
        }
    };

    let message = if complete {
        "Get availability successfully"
    } else {
        "Bookings could not be loaded, availability is unknown"
    };

    Ok(StdResponse {
        data: Some(AvailabilityRes {
            tenant_id,
            date,
            complete,
            slots,
        }),
        message: Some(message),
    })
}

async fn booked_starts(
    state: &AppState,
    tenant_id: Uuid,
    (day_start, day_end): (DateTime<Utc>, DateTime<Utc>),
) -> Result<Vec<(DateTime<Utc>, String)>> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    appointments::table
        .filter(appointments::tenant_id.eq(tenant_id))
        .filter(appointments::start_time.ge(day_start))
        .filter(appointments::start_time.lt(day_end))
        .filter(appointments::status.ne(AppointmentStatus::Cancelled.as_str()))
        .select((appointments::start_time, appointments::status))
        .get_results(conn)
        .await
        .context("Failed to get booked appointments")
}
