//! Pure scheduling rules. Nothing in here touches the database.

pub mod availability;
pub mod booking;
pub mod checklist;
pub mod execution;
pub mod next_appointment;
pub mod status;
