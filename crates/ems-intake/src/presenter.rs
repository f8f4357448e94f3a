//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Presentation boundary notified of intake state changes."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use ems_location::{FailureCode, Position};

use crate::state::Step;

/// Severity of a transient user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Info,
    Success,
    Warn,
    Error,
}

/// Location indicator shown alongside the message box.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationStatus {
    Detecting,
    Ready { position: Position, manual: bool },
    Unavailable { code: FailureCode, message: String },
}

impl LocationStatus {
    pub fn unavailable(code: FailureCode) -> Self {
        let message = match code {
            FailureCode::PermissionDenied => {
                "Permission denied — enable location in browser settings"
            }
            _ => "Could not detect location — use manual entry below",
        };
        LocationStatus::Unavailable {
            code,
            message: message.to_owned(),
        }
    }
}

/// A single instruction to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    StepChanged(Step),
    Location(LocationStatus),
    ManualEntry(bool),
    /// `Some` shows the loading overlay with the given text; `None` hides it.
    Loading(Option<String>),
    Toast { kind: ToastKind, message: String },
    RestoreBanner(bool),
    HospitalList(bool),
}

impl Notice {
    pub fn toast(kind: ToastKind, message: impl Into<String>) -> Self {
        Notice::Toast {
            kind,
            message: message.into(),
        }
    }
}

/// Receives notices in the order the orchestrator produces them. Notices are
/// dispatched with no intake lock held.
pub trait Presenter: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// Presenter that discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn notify(&self, _notice: Notice) {}
}
