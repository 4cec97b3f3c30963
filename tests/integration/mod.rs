//! Integration tests against mock HTTP servers and a real SQLite database

mod atspm_client;
mod clearguide_client;
mod concurrent_fetcher_integration;
mod data_collector_integration;
mod database_integration;
mod pems_client;
