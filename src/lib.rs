pub mod analysis;
pub mod api;
pub mod concurrent_fetcher;
pub mod data_collector;
pub mod database;
pub mod error;
pub mod geo;
pub mod models;
pub mod parsers;
pub mod report;
pub mod utils;
