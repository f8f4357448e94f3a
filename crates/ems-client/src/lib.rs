//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "HTTP clients for the triage backend and doctor dashboard."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---

pub mod backend;
pub mod dashboard;
pub mod transport;

pub use backend::HttpBackend;
pub use dashboard::{CaseAction, CaseRecord, CaseStatus, CaseSummary, DashboardClient, Dispatch};
pub use transport::JsonTransport;
