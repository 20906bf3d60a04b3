use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::AppointmentEntity;

pub const APPOINTMENT_BOOKED: &str = "appointments.booked";
pub const APPOINTMENT_STATUS_CHANGED: &str = "appointments.status_changed";
pub const TENANT_SUSPENDED_QUEUE: &str = "bookings.tenant_suspended";

// Integration events (outbox → broker)

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppointmentBookedEvent {
    pub appointment_id: Uuid,
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub client_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub service: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppointmentStatusChangedEvent {
    pub appointment_id: Uuid,
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub client_id: Uuid,
    pub previous_status: String,
    pub status: String,
}

impl AppointmentStatusChangedEvent {
    pub fn new(previous_status: &str, appointment: &AppointmentEntity) -> Self {
        Self {
            appointment_id: appointment.id,
            tenant_id: appointment.tenant_id,
            pet_id: appointment.pet_id,
            client_id: appointment.client_id,
            previous_status: previous_status.to_string(),
            status: appointment.status.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TenantSuspendedEvent {
    pub tenant_id: Uuid,
}

// Live events (in process → SSE)

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    Booked,
    StatusChanged,
    ChecklistUpdated,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment_id: Uuid,
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub status: String,
    pub start_time: DateTime<Utc>,
}

impl AppointmentEvent {
    pub fn from_entity(kind: AppointmentEventKind, appointment: &AppointmentEntity) -> Self {
        Self {
            kind,
            appointment_id: appointment.id,
            tenant_id: appointment.tenant_id,
            pet_id: appointment.pet_id,
            status: appointment.status.clone(),
            start_time: appointment.start_time,
        }
    }
}
