use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use futures::future::BoxFuture;
use lapin::{message::Delivery, options::BasicAckOptions};
use tracing::info;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    events::{
        APPOINTMENT_STATUS_CHANGED, AppointmentEvent, AppointmentEventKind,
        AppointmentStatusChangedEvent, TenantSuspendedEvent,
    },
    models::{AppointmentEntity, TENANT_SUSPENDED},
    outbox,
    scheduling::status::AppointmentStatus,
    schema::{appointments, tenants},
    store::refresh_next_appointment,
};

/// Statuses a suspension cancels. Work already under way is left alone.
const CANCELLABLE: [AppointmentStatus; 2] =
    [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

pub fn tenant_suspended(
    delivery: Delivery,
    state: Arc<AppState>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let conn = &mut state.db_pool.get().await?;
        let payload: TenantSuspendedEvent = serde_json::from_slice(&delivery.data)?;
        info!("Received event: {:?}", payload);
        let tenant_id = payload.tenant_id;
        let cancellable: Vec<&str> = CANCELLABLE.iter().map(|status| status.as_str()).collect();

        let cancelled = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    diesel::update(tenants::table.find(tenant_id))
                        .set(tenants::status.eq(TENANT_SUSPENDED))
                        .execute(conn)
                        .await?;

                    let upcoming: Vec<AppointmentEntity> = appointments::table
                        .filter(appointments::tenant_id.eq(tenant_id))
                        .filter(appointments::start_time.ge(Utc::now()))
                        .filter(appointments::status.eq_any(&cancellable))
                        .select(AppointmentEntity::as_select())
                        .for_update()
                        .get_results(conn)
                        .await?;

                    let previous_statuses: HashMap<Uuid, String> = upcoming
                        .into_iter()
                        .map(|appointment| (appointment.id, appointment.status))
                        .collect();
                    let ids: Vec<Uuid> = previous_statuses.keys().copied().collect();

                    let cancelled: Vec<AppointmentEntity> =
                        diesel::update(appointments::table.filter(appointments::id.eq_any(&ids)))
                            .set((
                                appointments::status.eq(AppointmentStatus::Cancelled.as_str()),
                                appointments::updated_at.eq(diesel::dsl::now),
                            ))
                            .returning(AppointmentEntity::as_returning())
                            .get_results(conn)
                            .await?;

                    for appointment in &cancelled {
                        let previous_status = previous_statuses
                            .get(&appointment.id)
                            .map(String::as_str)
                            .unwrap_or_default();
                        outbox::publish(
                            conn,
                            APPOINTMENT_STATUS_CHANGED.into(),
                            AppointmentStatusChangedEvent::new(previous_status, appointment),
                        )
                        .await?;
                    }

                    for pet_id in affected_pets(&cancelled) {
                        refresh_next_appointment(conn, pet_id).await?;
                    }

                    Ok::<Vec<AppointmentEntity>, anyhow::Error>(cancelled)
                })
            })
            .await?;

        for appointment in &cancelled {
            state.events.publish(AppointmentEvent::from_entity(
                AppointmentEventKind::StatusChanged,
                appointment,
            ));
        }

        info!(
            "Tenant {} suspended, cancelled {} upcoming bookings",
            tenant_id,
            cancelled.len()
        );

        delivery.ack(BasicAckOptions::default()).await?;

        Ok(())
    })
}

/// Distinct pets among the cancelled appointments.
fn affected_pets(cancelled: &[AppointmentEntity]) -> Vec<Uuid> {
    let mut pet_ids: Vec<Uuid> = cancelled.iter().map(|appointment| appointment.pet_id).collect();
    pet_ids.sort();
    pet_ids.dedup();
    pet_ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled_for(pet_id: Uuid) -> AppointmentEntity {
        let now = Utc::now();
        AppointmentEntity {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            pet_id,
            client_id: Uuid::new_v4(),
            start_time: now,
            service: "Bath".into(),
            status: AppointmentStatus::Cancelled.as_str().into(),
            notes: None,
            checklist_state: vec![],
            execution_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_affected_pets_are_distinct() {
        let (rex, tom) = (Uuid::new_v4(), Uuid::new_v4());
        let cancelled = vec![cancelled_for(rex), cancelled_for(tom), cancelled_for(rex)];
        let mut expected = vec![rex, tom];
        expected.sort();
        assert_eq!(affected_pets(&cancelled), expected);
    }

    #[test]
    fn test_cancellation_event_keeps_previous_status() {
        let appointment = cancelled_for(Uuid::new_v4());
        let event = AppointmentStatusChangedEvent::new("confirmed", &appointment);
        assert_eq!(event.previous_status, "confirmed");
        assert_eq!(event.status, "cancelled");
        assert_eq!(event.client_id, appointment.client_id);

        let live = AppointmentEvent::from_entity(AppointmentEventKind::StatusChanged, &appointment);
        assert_eq!(live.pet_id, appointment.pet_id);
        assert_eq!(live.status, "cancelled");
    }

    #[test]
    fn test_work_under_way_is_not_cancellable() {
        assert!(!CANCELLABLE.contains(&AppointmentStatus::InProgress));
        assert!(!CANCELLABLE.contains(&AppointmentStatus::Ready));
    }
}
