//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Restore an in-progress intake from the server-held session."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{IntakeBackend, SessionState};
use crate::cache::{self, ResultCache};
use crate::state::{BookingResult, IntakeState, Step, TriageResult};

/// Session reconstructed from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub state: IntakeState,
    /// Hospital candidates remain selectable only while no booking exists.
    pub hospitals_visible: bool,
}

impl RestoredSession {
    pub fn step(&self) -> Step {
        self.state.step
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreResult {
    Fresh,
    Restored(RestoredSession),
}

impl RestoreResult {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreResult::Restored(_))
    }
}

/// Queries the backend once at startup and rebuilds the workflow state from
/// whatever session it still holds.
pub struct SessionRehydrator {
    backend: Arc<dyn IntakeBackend>,
    cache: Arc<dyn ResultCache>,
}

impl SessionRehydrator {
    pub fn new(backend: Arc<dyn IntakeBackend>, cache: Arc<dyn ResultCache>) -> Self {
        Self { backend, cache }
    }

    /// Failures are logged and treated as an absent session.
    pub async fn restore(&self) -> RestoreResult {
        match self.backend.session_state().await {
            Ok(session) => {
                if let Some(report) = &session.emergency {
                    cache::mirror(self.cache.as_ref(), report);
                }
                let result = rebuild(session);
                if let RestoreResult::Restored(restored) = &result {
                    info!(step = ?restored.step(), "previous session restored");
                }
                result
            }
            Err(err) => {
                warn!(error = %err, "session restore failed; starting fresh");
                RestoreResult::Fresh
            }
        }
    }
}

/// Map a server session onto the intake state. A booking without an
/// emergency is ignored.
pub fn rebuild(session: SessionState) -> RestoreResult {
    let Some(report) = session.emergency else {
        return RestoreResult::Fresh;
    };

    let mut state = IntakeState {
        step: Step::Triage,
        triage: Some(TriageResult::from_report(&report)),
        hospitals: Some(report.hospitals),
        ..IntakeState::default()
    };

    let hospitals_visible = match session.booking {
        Some(booking) => {
            state.step = Step::Confirmed;
            state.booking = Some(BookingResult::from(booking));
            false
        }
        None => true,
    };

    RestoreResult::Restored(RestoredSession {
        state,
        hospitals_visible,
    })
}
