pub mod adapters;
pub mod api;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod intake;
pub mod models;
pub mod observability;
pub mod ports;
pub mod state;
pub mod store;
pub mod zones;
