// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use api::{ExchangeError, ExchangeGateway};
pub use models::*;
pub use strategy::SignalSource;
