pub mod api;
pub mod audit_factory;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway_factory;
pub mod telemetry;
