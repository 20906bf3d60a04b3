use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Ready,
    Finished,
    Cancelled,
}

/// Ordered stages shown by the execution tracker.
pub const EXECUTION_STEPS: [AppointmentStatus; 4] = [
    AppointmentStatus::Confirmed,
    AppointmentStatus::InProgress,
    AppointmentStatus::Ready,
    AppointmentStatus::Finished,
];

/// Statuses the tracker fetches for a client.
pub const TRACKED_STATUSES: [AppointmentStatus; 5] = [
    AppointmentStatus::Confirmed,
    AppointmentStatus::Pending,
    AppointmentStatus::InProgress,
    AppointmentStatus::Ready,
    AppointmentStatus::Finished,
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move appointment from {from} to {to}")]
pub struct TransitionError {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Ready => "ready",
            AppointmentStatus::Finished => "finished",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Finished | AppointmentStatus::Cancelled
        )
    }

    /// `pending → confirmed → in-progress → ready → finished`, with
    /// cancellation allowed until work has started.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Ready)
                | (Ready, Finished)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn transition_to(
        &self,
        next: AppointmentStatus,
    ) -> Result<AppointmentStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: *self, to: next })
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in-progress" => Ok(AppointmentStatus::InProgress),
            "ready" => Ok(AppointmentStatus::Ready),
            "finished" => Ok(AppointmentStatus::Finished),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Index of `status` in [`EXECUTION_STEPS`]. Anything else, including
/// `pending` and values no writer should have produced, is step 0.
pub fn current_step(status: &str) -> usize {
    EXECUTION_STEPS
        .iter()
        .position(|step| step.as_str() == status)
        .unwrap_or(0)
}

pub fn tracked_status_strings() -> Vec<&'static str> {
    TRACKED_STATUSES.iter().map(|status| status.as_str()).collect()
}
