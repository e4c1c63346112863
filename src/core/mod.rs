pub mod app;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod integrations;
pub mod ratelimit;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod terminal;
pub mod workflow;
