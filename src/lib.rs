pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod consumers;
pub mod db;
pub mod events;
pub mod middleware;
pub mod models;
pub mod outbox;
pub mod routes;
pub mod scheduling;
pub mod schema;
pub mod store;
pub mod swagger;

#[cfg(test)]
mod test_support;
