use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    checklist::{CheckPayload, parse_checklist},
    status::{AppointmentStatus, EXECUTION_STEPS, current_step},
};
use crate::models::AppointmentEntity;

pub const RECENT_FINISHED_LIMIT: usize = 2;

/// Tracker view of one appointment.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ServiceExecution {
    pub appointment_id: Uuid,
    pub tenant_id: Uuid,
    pub pet_id: Uuid,
    pub service: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub execution_started_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_step: usize,
    pub total_steps: usize,
    pub check_in: Option<CheckPayload>,
    pub check_out: Option<CheckPayload>,
    pub timers: Vec<String>,
    pub service_log: Vec<String>,
}

impl ServiceExecution {
    pub fn is_finished(&self) -> bool {
        self.status == AppointmentStatus::Finished.as_str()
    }
}

impl From<&AppointmentEntity> for ServiceExecution {
    fn from(appointment: &AppointmentEntity) -> Self {
        let checklist = parse_checklist(&appointment.checklist_state);
        Self {
            appointment_id: appointment.id,
            tenant_id: appointment.tenant_id,
            pet_id: appointment.pet_id,
            service: appointment.service.clone(),
            status: appointment.status.clone(),
            start_time: appointment.start_time,
            execution_started_at: appointment.execution_started_at,
            notes: appointment.notes.clone(),
            current_step: current_step(&appointment.status),
            total_steps: EXECUTION_STEPS.len(),
            check_in: checklist.check_in,
            check_out: checklist.check_out,
            timers: checklist.timers,
            service_log: checklist.service_log,
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct ExecutionBoard {
    pub active: Vec<ServiceExecution>,
    pub recent_finished: Vec<ServiceExecution>,
}

/// Splits executions into unfinished ones (input order kept) and the most
/// recently started finished ones, capped at [`RECENT_FINISHED_LIMIT`].
pub fn partition_executions(executions: Vec<ServiceExecution>) -> ExecutionBoard {
    let (mut recent_finished, active): (Vec<_>, Vec<_>) = executions
        .into_iter()
        .partition(ServiceExecution::is_finished);

    recent_finished.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    recent_finished.truncate(RECENT_FINISHED_LIMIT);

    ExecutionBoard {
        active,
        recent_finished,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn appointment(status: &str, hour: u32) -> AppointmentEntity {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap();
        AppointmentEntity {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            pet_id: Uuid::nil(),
            client_id: Uuid::nil(),
            start_time: start,
            service: "Bath & groom".into(),
            status: status.into(),
            notes: None,
            checklist_state: vec![],
            execution_started_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    fn executions(statuses: &[(&str, u32)]) -> Vec<ServiceExecution> {
        statuses
            .iter()
            .map(|(status, hour)| ServiceExecution::from(&appointment(status, *hour)))
            .collect()
    }

    #[test]
    fn test_one_finished_three_active() {
        let board = partition_executions(executions(&[
            ("confirmed", 9),
            ("finished", 8),
            ("in-progress", 10),
            ("pending", 11),
        ]));
        assert_eq!(board.active.len(), 3);
        assert_eq!(board.recent_finished.len(), 1);
    }

    #[test]
    fn test_recent_finished_is_capped_and_newest_first() {
        let board = partition_executions(executions(&[
            ("finished", 8),
            ("finished", 12),
            ("finished", 10),
            ("ready", 13),
        ]));
        assert_eq!(board.active.len(), 1);
        let hours: Vec<_> = board
            .recent_finished
            .iter()
            .map(|execution| execution.start_time.format("%H").to_string())
            .collect();
        assert_eq!(hours, vec!["12", "10"]);
    }

    #[test]
    fn test_active_keeps_input_order() {
        let board = partition_executions(executions(&[("ready", 14), ("confirmed", 9)]));
        assert_eq!(board.active[0].status, "ready");
        assert_eq!(board.active[1].status, "confirmed");
    }

    #[test]
    fn test_execution_derives_step_and_checklist() {
        let mut row = appointment("ready", 9);
        row.checklist_state = vec![
            r#"CHECKIN:{"timestamp":"2024-05-02T09:02:00Z","photos":["http://cdn/1.jpg"]}"#.into(),
            "Haircut".into(),
        ];
        let execution = ServiceExecution::from(&row);
        assert_eq!(execution.current_step, 2);
        assert_eq!(execution.total_steps, 4);
        assert_eq!(execution.check_in.unwrap().photos, vec!["http://cdn/1.jpg"]);
        assert_eq!(execution.service_log, vec!["Haircut"]);
    }

    #[test]
    fn test_pending_execution_sits_on_first_step() {
        let execution = ServiceExecution::from(&appointment("pending", 9));
        assert_eq!(execution.current_step, 0);
        assert!(!execution.is_finished());
    }
}
