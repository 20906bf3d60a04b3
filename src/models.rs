use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Tenants

pub const TENANT_ACTIVE: &str = "active";
pub const TENANT_SUSPENDED: &str = "suspended";

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::tenants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TenantEntity {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TenantEntity {
    pub fn is_active(&self) -> bool {
        self.status == TENANT_ACTIVE
    }
}

// Pets

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::pets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PetEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub species: Option<String>,
    pub next_appointment_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Appointments

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AppointmentEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub client_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub service: String,
    pub status: String,
    pub notes: Option<String>,
    pub checklist_state: Vec<String>,
    pub execution_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateAppointmentEntity {
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub client_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub service: String,
    pub status: String,
    pub notes: Option<String>,
    pub checklist_state: Vec<String>,
}

// Outbox

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEntity {
    pub id: i32,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::outbox)]
pub struct CreateOutboxEntity {
    pub event_type: String,
    pub payload: String,
}
