pub mod availability;
pub mod clients;
pub mod tenants;
