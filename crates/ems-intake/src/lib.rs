//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Emergency intake workflow crate root."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Client-side emergency intake: compose a message, attach a position,
//! receive a triage assessment with nearby hospitals and reserve a bed.
//!
//! [`IntakeOrchestrator`] owns the workflow state. The backend, result cache
//! and presentation layer are injected as trait objects so hosts and tests
//! can swap them freely.

pub mod api;
pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod presenter;
pub mod session;
pub mod state;

pub use api::{
    ApiError, EmergencyReport, EmergencyRequest, IntakeBackend, Reply, Reservation,
    SelectHospitalRequest, SessionBooking, SessionState,
};
pub use cache::{CachedEmergency, DisabledCache, FileResultCache, ResultCache};
pub use error::{IntakeError, Result, ValidationError};
pub use orchestrator::{IntakeOrchestrator, IntakeSettings, IntakeSnapshot, RequestOutcome};
pub use presenter::{LocationStatus, Notice, NullPresenter, Presenter, ToastKind};
pub use session::{RestoreResult, RestoredSession, SessionRehydrator};
pub use state::{
    BookingResult, HospitalOption, IntakeState, SeverityLevel, Step, TriageAssessment,
    TriageResult,
};
