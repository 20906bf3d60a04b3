use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    events::{APPOINTMENT_BOOKED, AppointmentBookedEvent, AppointmentEvent, AppointmentEventKind},
    middleware::{self, AuthClient},
    models::{AppointmentEntity, CreateAppointmentEntity},
    outbox,
    scheduling::{
        booking::{BookingInput, validate_booking},
        status::AppointmentStatus,
    },
    schema::appointments,
    store::{booking_insert_error, find_owned_pet, find_tenant, refresh_next_appointment},
};

/// Defines client-facing booking routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/clients/appointments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_appointments))
            .routes(utoipa_axum::routes!(create_appointment))
            .route_layer(axum::middleware::from_fn(middleware::clients_authorization)),
    )
}

/// Fetch all appointments of the authenticated client, latest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Appointments"],
    security(("clientId" = [])),
    responses(
        (status = 200, description = "List my appointments", body = StdResponse<Vec<AppointmentEntity>, String>)
    )
)]
async fn get_my_appointments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthClient>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let appointments: Vec<AppointmentEntity> = appointments::table
        .filter(appointments::client_id.eq(auth.client_id))
        .order_by(appointments::start_time.desc())
        .select(AppointmentEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get my appointments")?;

    Ok(StdResponse {
        data: Some(appointments),
        message: Some("Get my appointments successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateAppointmentReq {
    pet_id: Uuid,
    tenant_id: Uuid,
    /// Business-local date, `YYYY-MM-DD`.
    date: String,
    /// Slot time, `HH:MM`.
    time: String,
    service: String,
    notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct CreateAppointmentRes {
    appointment: AppointmentEntity,
    next_appointment_at: Option<DateTime<Utc>>,
}

/// Book a slot for one of the authenticated client's pets.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Appointments"],
    security(("clientId" = [])),
    request_body = CreateAppointmentReq,
    responses(
        (status = 200, description = "Created appointment successfully", body = StdResponse<CreateAppointmentRes, String>),
        (status = 400, description = "Booking request is incomplete or invalid"),
        (status = 403, description = "Pet or tenant cannot take this booking"),
        (status = 409, description = "Slot is already booked")
    )
)]
async fn create_appointment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthClient>,
    Json(body): Json<CreateAppointmentReq>,
) -> Result<impl IntoResponse, AppError> {
    let booking = validate_booking(
        BookingInput {
            date: &body.date,
            time: &body.time,
            service: &body.service,
            notes: body.notes.as_deref(),
        },
        &state.scheduling.grid,
        state.scheduling.business_offset,
        Utc::now(),
    )
    .map_err(|err| AppError::BadRequest(err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet = find_owned_pet(conn, body.pet_id, auth.client_id).await?;
    if pet.tenant_id != body.tenant_id {
        return Err(AppError::ForbiddenResource(
            "Pet is not registered with this tenant".into(),
        ));
    }

    let tenant = find_tenant(conn, body.tenant_id).await?;
    if !tenant.is_active() {
        return Err(AppError::ForbiddenResource(
            "Tenant is not accepting bookings".into(),
        ));
    }

    let client_id = auth.client_id;
    let (appointment, next_appointment_at) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let appointment = diesel::insert_into(appointments::table)
                    .values(CreateAppointmentEntity {
                        tenant_id: pet.tenant_id,
                        pet_id: pet.id,
                        client_id,
                        start_time: booking.start_time,
                        service: booking.service,
                        status: AppointmentStatus::Pending.as_str().into(),
                        notes: booking.notes,
                        checklist_state: vec![],
                    })
                    .returning(AppointmentEntity::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(booking_insert_error)?;

                let next_appointment_at = refresh_next_appointment(conn, appointment.pet_id).await?;

                outbox::publish(
                    conn,
                    APPOINTMENT_BOOKED.into(),
                    AppointmentBookedEvent {
                        appointment_id: appointment.id,
                        tenant_id: appointment.tenant_id,
                        pet_id: appointment.pet_id,
                        client_id: appointment.client_id,
                        start_time: appointment.start_time,
                        service: appointment.service.clone(),
                    },
                )
                .await?;

                Ok::<(AppointmentEntity, Option<DateTime<Utc>>), AppError>((
                    appointment,
                    next_appointment_at,
                ))
            })
        })
        .await?;

    info!(
        "Appointment {} booked for pet {} at {}",
        appointment.id, appointment.pet_id, appointment.start_time
    );
    state.events.publish(AppointmentEvent::from_entity(
        AppointmentEventKind::Booked,
        &appointment,
    ));

    Ok(StdResponse {
        data: Some(CreateAppointmentRes {
            appointment,
            next_appointment_at,
        }),
        message: Some("Created appointment successfully"),
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        middleware::CLIENT_ID_HEADER,
        test_support::{read_json, test_router},
    };

    fn booking_request(client_id: Option<Uuid>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::post("/clients/appointments")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(client_id) = client_id {
            builder = builder.header(CLIENT_ID_HEADER, client_id.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_booking_requires_client_identity() {
        let app = test_router(routes_with_openapi());
        let res = app
            .oneshot(booking_request(
                None,
                json!({
                    "pet_id": Uuid::new_v4(),
                    "tenant_id": Uuid::new_v4(),
                    "date": "2099-01-01",
                    "time": "10:00",
                    "service": "Bath"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_fields_fail_before_any_query() {
        let app = test_router(routes_with_openapi());
        let res = app
            .oneshot(booking_request(
                Some(Uuid::new_v4()),
                json!({
                    "pet_id": Uuid::new_v4(),
                    "tenant_id": Uuid::new_v4(),
                    "date": "",
                    "time": "",
                    "service": " "
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = read_json(res).await;
        assert!(body["data"].is_null());
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Please select a service."));
        assert!(message.contains("Please pick a date."));
        assert!(message.contains("Please pick a time."));
    }

    #[tokio::test]
    async fn test_database_failure_is_not_leaked() {
        let app = test_router(routes_with_openapi());
        let res = app
            .oneshot(booking_request(
                Some(Uuid::new_v4()),
                json!({
                    "pet_id": Uuid::new_v4(),
                    "tenant_id": Uuid::new_v4(),
                    "date": "2099-01-01",
                    "time": "10:00",
                    "service": "Bath"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(res).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
