//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Backend boundary and wire payloads for the intake flow."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state::{HospitalOption, TriageAssessment};

/// Failure reported by an [`IntakeBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend answered with an explicit error payload.
    #[error("{0}")]
    Backend(String),
    /// The request never produced a decodable answer.
    #[error("{0}")]
    Transport(String),
}

/// Remote triage and reservation service.
#[async_trait]
pub trait IntakeBackend: Send + Sync + 'static {
    /// Server-held copy of the current session, if any.
    async fn session_state(&self) -> Result<SessionState, ApiError>;

    async fn clear_session(&self) -> Result<(), ApiError>;

    async fn submit_emergency(
        &self,
        request: &EmergencyRequest,
    ) -> Result<EmergencyReport, ApiError>;

    async fn select_hospital(
        &self,
        request: &SelectHospitalRequest,
    ) -> Result<Reservation, ApiError>;
}

/// Body of an emergency submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub message: String,
    pub lat: f64,
    pub lng: f64,
}

/// Triage, hospital candidates and dispatch status for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyReport {
    pub triage: TriageAssessment,
    #[serde(default)]
    pub location: Value,
    #[serde(default)]
    pub hospitals: Vec<HospitalOption>,
    #[serde(default)]
    pub ambulance_status: Option<String>,
    #[serde(default)]
    pub doctor_status: Option<String>,
    #[serde(default)]
    pub expected_bill: Option<String>,
}

/// Body of a bed reservation; triage and location are echoed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectHospitalRequest {
    pub hospital_name: String,
    pub triage: TriageAssessment,
    pub location: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub case_id: u64,
    #[serde(alias = "hospital_name")]
    pub hospital: String,
    pub available_beds: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBooking {
    pub case_id: u64,
    pub hospital_name: String,
    pub available_beds: u32,
}

/// Snapshot the backend keeps for the caller's session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub emergency: Option<EmergencyReport>,
    #[serde(default)]
    pub booking: Option<SessionBooking>,
}

/// Backend reply envelope: either `{"error": ...}` or the success body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Failure { error: String },
    Success(T),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Reply::Failure { error } => Err(ApiError::Backend(error)),
            Reply::Success(body) => Ok(body),
        }
    }
}
