//! Queries shared by several routes and consumers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::{Array, Text},
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    app_error::AppError,
    models::{AppointmentEntity, PetEntity, TenantEntity},
    scheduling::{next_appointment::next_appointment, status::AppointmentStatus},
    schema::{appointments, pets, tenants},
};

pub const SLOT_UNIQUE_CONSTRAINT: &str = "appointments_tenant_slot_uniq";

// Postgres `array_append` over the checklist column.
diesel::define_sql_function! {
    fn array_append(array: Array<Text>, element: Text) -> Array<Text>;
}

/// True when an insert lost the race for a tenant's slot.
pub fn is_slot_conflict(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            info.constraint_name() == Some(SLOT_UNIQUE_CONSTRAINT)
        }
        _ => false,
    }
}

/// Maps a failed appointment insert. Losing the slot race is a 409, anything
/// else stays internal.
pub fn booking_insert_error(err: DieselError) -> AppError {
    if is_slot_conflict(&err) {
        AppError::Conflict("Slot is already booked".into())
    } else {
        AppError::Other(anyhow::Error::from(err).context("Failed to create appointment"))
    }
}

/// Result of a compare-and-set status update. No row means the status moved
/// after it was read.
pub fn status_swap_result(
    updated: Option<AppointmentEntity>,
) -> Result<AppointmentEntity, AppError> {
    updated.ok_or_else(|| {
        AppError::Conflict("Appointment status was changed by someone else".into())
    })
}

pub async fn find_owned_pet(
    conn: &mut AsyncPgConnection,
    pet_id: Uuid,
    client_id: Uuid,
) -> Result<PetEntity, AppError> {
    pets::table
        .find(pet_id)
        .filter(pets::client_id.eq(client_id))
        .select(PetEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get pet")?
        .ok_or_else(|| AppError::ForbiddenResource("Client does not own this pet".into()))
}

pub async fn find_tenant(
    conn: &mut AsyncPgConnection,
    tenant_id: Uuid,
) -> Result<TenantEntity, AppError> {
    tenants::table
        .find(tenant_id)
        .select(TenantEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get tenant")?
        .ok_or(AppError::NotFound)
}

pub async fn client_pet_ids(conn: &mut AsyncPgConnection, client_id: Uuid) -> Result<Vec<Uuid>> {
    pets::table
        .filter(pets::client_id.eq(client_id))
        .select(pets::id)
        .get_results(conn)
        .await
        .context("Failed to get client pets")
}

/// Appends an encoded entry to a live appointment's checklist.
pub async fn append_checklist_entry(
    conn: &mut AsyncPgConnection,
    appointment_id: Uuid,
    tenant_id: Uuid,
    encoded: String,
) -> Result<AppointmentEntity, AppError> {
    diesel::update(
        appointments::table
            .find(appointment_id)
            .filter(appointments::tenant_id.eq(tenant_id))
            .filter(appointments::status.ne(AppointmentStatus::Cancelled.as_str())),
    )
    .set((
        appointments::checklist_state.eq(array_append(appointments::checklist_state, encoded)),
        appointments::updated_at.eq(diesel::dsl::now),
    ))
    .returning(AppointmentEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to append checklist entry")?
    .ok_or(AppError::NotFound)
}

/// Re-derives `pets.next_appointment_at` from the pet's upcoming appointments.
pub async fn refresh_next_appointment(
    conn: &mut AsyncPgConnection,
    pet_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let now = Utc::now();
    let upcoming: Vec<(DateTime<Utc>, String)> = appointments::table
        .filter(appointments::pet_id.eq(pet_id))
        .filter(appointments::start_time.ge(now))
        .select((appointments::start_time, appointments::status))
        .get_results(conn)
        .await
        .context("Failed to get upcoming appointments")?;

    let next = next_appointment(
        now,
        upcoming
            .iter()
            .map(|(start, status)| (*start, status.as_str())),
    );

    diesel::update(pets::table.find(pet_id))
        .set((
            pets::next_appointment_at.eq(next),
            pets::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to update next appointment")?;

    Ok(next)
}
