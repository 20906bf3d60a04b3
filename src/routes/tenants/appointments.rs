use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    events::{
        APPOINTMENT_STATUS_CHANGED, AppointmentEvent, AppointmentEventKind,
        AppointmentStatusChangedEvent,
    },
    middleware::{self, AuthStaff},
    models::AppointmentEntity,
    outbox,
    scheduling::{
        availability::day_bounds_utc,
        booking::parse_date,
        checklist::ChecklistEntry,
        execution::ServiceExecution,
        status::AppointmentStatus,
    },
    schema::appointments,
    store::{append_checklist_entry, refresh_next_appointment, status_swap_result},
};

/// Defines staff-facing appointment routes. Every query is scoped to the
/// staff member's tenant.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/tenants/appointments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_tenant_appointments))
            .routes(utoipa_axum::routes!(update_appointment_status))
            .routes(utoipa_axum::routes!(append_checklist))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct TenantAppointmentsQuery {
    /// Business-local date, `YYYY-MM-DD`. All dates when omitted.
    date: Option<String>,
}

/// Fetch the tenant's appointments, optionally for a single day.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Staff"],
    security(("staffTenantId" = [])),
    params(TenantAppointmentsQuery),
    responses(
        (status = 200, description = "List tenant appointments", body = StdResponse<Vec<AppointmentEntity>, String>)
    )
)]
async fn get_tenant_appointments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthStaff>,
    Query(query): Query<TenantAppointmentsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let offset = state.scheduling.business_offset;
    let day_bounds = match query.date.as_deref() {
        Some(value) => {
            let day = parse_date(value)
                .ok_or_else(|| AppError::BadRequest(format!("{} is not a valid date", value)))?;
            let bounds = day_bounds_utc(day, offset).ok_or_else(|| {
                AppError::BadRequest(format!("{} is out of the supported range", value))
            })?;
            Some(bounds)
        }
        None => None,
    };

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = appointments::table
        .filter(appointments::tenant_id.eq(auth.tenant_id))
        .order_by(appointments::start_time.asc())
        .select(AppointmentEntity::as_select())
        .into_boxed();

    if let Some((day_start, day_end)) = day_bounds {
        query = query
            .filter(appointments::start_time.ge(day_start))
            .filter(appointments::start_time.lt(day_end));
    }

    let appointments: Vec<AppointmentEntity> = query
        .get_results(conn)
        .await
        .context("Failed to get tenant appointments")?;

    Ok(StdResponse {
        data: Some(appointments),
        message: Some("Get tenant appointments successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateStatusReq {
    status: AppointmentStatus,
}

#[derive(Serialize, ToSchema)]
struct UpdateStatusRes {
    appointment: AppointmentEntity,
    previous_status: String,
}

/// Move an appointment to its next status.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Staff"],
    security(("staffTenantId" = [])),
    params(
        ("id" = Uuid, Path, description = "Appointment ID to update")
    ),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Updated status successfully", body = StdResponse<UpdateStatusRes, String>),
        (status = 404, description = "Appointment not found for this tenant"),
        (status = 409, description = "Transition is not allowed or the status changed meanwhile")
    )
)]
async fn update_appointment_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthStaff>,
    Json(body): Json<UpdateStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let tenant_id = auth.tenant_id;
    let (appointment, previous_status) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let current: AppointmentEntity = appointments::table
                    .find(id)
                    .filter(appointments::tenant_id.eq(tenant_id))
                    .select(AppointmentEntity::as_select())
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(AppError::NotFound)?;

                let from = current
                    .status
                    .parse::<AppointmentStatus>()
                    .map_err(|err| AppError::Conflict(err.to_string()))?;
                let to = from
                    .transition_to(body.status)
                    .map_err(|err| AppError::Conflict(err.to_string()))?;

                let execution_started_at = if to == AppointmentStatus::InProgress {
                    Some(Utc::now())
                } else {
                    current.execution_started_at
                };

                // Compare-and-set on the status that was read.
                let updated = diesel::update(
                    appointments::table
                        .find(id)
                        .filter(appointments::status.eq(&current.status)),
                )
                .set((
                    appointments::status.eq(to.as_str()),
                    appointments::execution_started_at.eq(execution_started_at),
                    appointments::updated_at.eq(diesel::dsl::now),
                ))
                .returning(AppointmentEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?;
                let updated = status_swap_result(updated)?;

                refresh_next_appointment(conn, updated.pet_id).await?;

                outbox::publish(
                    conn,
                    APPOINTMENT_STATUS_CHANGED.into(),
                    AppointmentStatusChangedEvent::new(&current.status, &updated),
                )
                .await?;

                Ok::<(AppointmentEntity, String), AppError>((updated, current.status))
            })
        })
        .await?;

    info!(
        "Appointment {} moved from {} to {}",
        appointment.id, previous_status, appointment.status
    );
    state.events.publish(AppointmentEvent::from_entity(
        AppointmentEventKind::StatusChanged,
        &appointment,
    ));

    Ok(StdResponse {
        data: Some(UpdateStatusRes {
            appointment,
            previous_status,
        }),
        message: Some("Updated status successfully"),
    })
}

/// Append a check-in, check-out, timer or note to an appointment's checklist.
#[utoipa::path(
    post,
    path = "/{id}/checklist",
    tags = ["Staff"],
    security(("staffTenantId" = [])),
    params(
        ("id" = Uuid, Path, description = "Appointment ID to annotate")
    ),
    request_body = ChecklistEntry,
    responses(
        (status = 200, description = "Appended checklist entry successfully", body = StdResponse<ServiceExecution, String>),
        (status = 400, description = "Entry is malformed"),
        (status = 404, description = "Appointment not found, cancelled, or owned by another tenant")
    )
)]
async fn append_checklist(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthStaff>,
    Json(body): Json<ChecklistEntry>,
) -> Result<impl IntoResponse, AppError> {
    let encoded = body
        .encode()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let appointment = append_checklist_entry(conn, id, auth.tenant_id, encoded).await?;

    state.events.publish(AppointmentEvent::from_entity(
        AppointmentEventKind::ChecklistUpdated,
        &appointment,
    ));

    Ok(StdResponse {
        data: Some(ServiceExecution::from(&appointment)),
        message: Some("Appended checklist entry successfully"),
    })
}
