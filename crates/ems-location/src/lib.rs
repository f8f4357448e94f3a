//! ---
//! ems_section: "02-location-acquisition"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Device location acquisition for the intake flow."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Device location acquisition: a one-shot fix plus a continuous watch,
//! with linear backoff on transient failures and observer-style delivery.

pub mod device;
pub mod policy;
pub mod source;
pub mod types;

pub use device::{FixedDevice, LocationDevice, PositionStream, UnsupportedDevice};
pub use policy::{AcquisitionPolicy, LinearBackoff};
pub use source::{LocationSource, WatchId};
pub use types::{AcquisitionOptions, FailureCode, LocationEvent, LocationFailure, Position};
