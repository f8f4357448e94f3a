//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the intake client."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the EMS intake workspace.
//! This crate exposes configuration loading and tracing setup consumed by
//! the location, intake, client, and CLI crates.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, BackendConfig, CacheConfig, FixedPositionConfig, IntakeConfig, LoadedAppConfig,
    LocationConfig, LoggingConfig,
};
pub use logging::{init_tracing, LogFormat};
