//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Intake error taxonomy."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use thiserror::Error;

use crate::api::ApiError;
use crate::state::Step;

pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors surfaced to the caller of an intake operation. None of them are
/// fatal: the state machine is always left in a previously valid step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("backend error: {message}")]
    Backend { message: String },
    #[error("network error: {message}")]
    Network { message: String },
}

impl IntakeError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ApiError> for IntakeError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Backend(message) => Self::Backend { message },
            ApiError::Transport(message) => Self::Network { message },
        }
    }
}

/// Local, pre-request validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must contain at least {min} characters (got {actual})")]
    MessageTooShort { min: usize, actual: usize },
    #[error("location unavailable; enter coordinates manually")]
    LocationMissing,
    #[error("coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates { latitude: String, longitude: String },
    #[error("no triage result; submit the emergency first")]
    NoTriage,
    #[error("operation requires step {expected:?} but intake is at {actual:?}")]
    WrongStep { expected: Step, actual: Step },
}
