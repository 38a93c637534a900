// Library crate: the polling data client plus the dashboard daemon pieces.
// main.rs wires these together; tests/ exercises them directly.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod event_log;
pub mod fetch;
pub mod models;
pub mod monitor;
pub mod normalize;
pub mod poll;
pub mod routes;
pub mod server;
pub mod settings;
pub mod sources;
pub mod state;
