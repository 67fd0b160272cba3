pub mod app;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
