pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod filtering;
pub mod logging;
pub mod observability;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod types;
pub mod webcams;

// Ports and their adapters
pub mod app;
pub mod infra;
