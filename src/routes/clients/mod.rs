pub mod appointments;
pub mod executions;
pub mod pets;
