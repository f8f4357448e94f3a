//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test harness shared exports."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Deterministic stand-ins for the intake boundaries: a scripted location
//! device, a mock backend, a presenter that records every notice and
//! in-memory result caches. Designed for `tokio::test(start_paused = true)`.

pub mod backend;
pub mod device;
pub mod fixtures;
pub mod presenter;

pub use backend::MockBackend;
pub use device::ScriptedDevice;
pub use presenter::{FailingCache, MemoryCache, RecordingPresenter};
