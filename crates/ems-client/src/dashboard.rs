//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Doctor dashboard case listing and case transitions."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Client for the doctor-facing case endpoints. Independent of the intake
//! workflow; nothing in `ems-intake` depends on it.

use std::fmt;

use anyhow::Result;
use ems_common::BackendConfig;
use ems_intake::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::JsonTransport;

pub const DOCTOR_REQUESTS_PATH: &str = "doctor-requests";

/// Lifecycle of a reserved case as the dashboard sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    #[serde(rename = "Bed Reserved")]
    BedReserved,
    #[serde(rename = "Doctor Assigned")]
    DoctorAssigned,
    #[serde(rename = "En Route")]
    EnRoute,
    #[serde(rename = "Completed")]
    Completed,
}

impl CaseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CaseStatus::BedReserved => "Bed Reserved",
            CaseStatus::DoctorAssigned => "Doctor Assigned",
            CaseStatus::EnRoute => "En Route",
            CaseStatus::Completed => "Completed",
        }
    }

    pub fn can_accept(&self) -> bool {
        matches!(self, CaseStatus::BedReserved)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, CaseStatus::EnRoute)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub dispatch_status: String,
    #[serde(default)]
    pub eta: Option<String>,
    pub priority_level: String,
    pub ambulance_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: u64,
    pub status: CaseStatus,
    pub hospital_name: String,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default)]
    pub severity_score: Option<f64>,
    #[serde(default)]
    pub required_specialist: Option<String>,
    #[serde(default)]
    pub emergency_type: Option<String>,
    #[serde(default)]
    pub location: Value,
    #[serde(default)]
    pub dispatch: Option<Dispatch>,
}

/// Reply to an accept or complete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseAction {
    #[serde(default)]
    pub message: Option<String>,
    pub case_id: u64,
    #[serde(default)]
    pub dispatch: Option<Dispatch>,
    #[serde(default)]
    pub hospital: Option<String>,
}

/// Per-status totals shown in the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseSummary {
    pub total: usize,
    pub pending: usize,
    pub en_route: usize,
    pub completed: usize,
}

impl CaseSummary {
    pub fn from_cases(cases: &[CaseRecord]) -> Self {
        cases.iter().fold(
            Self {
                total: cases.len(),
                ..Self::default()
            },
            |mut summary, case| {
                match case.status {
                    CaseStatus::BedReserved => summary.pending += 1,
                    CaseStatus::EnRoute => summary.en_route += 1,
                    CaseStatus::Completed => summary.completed += 1,
                    CaseStatus::DoctorAssigned => {}
                }
                summary
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct DashboardClient {
    transport: JsonTransport,
}

impl DashboardClient {
    pub fn new(transport: JsonTransport) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(JsonTransport::from_config(config)?))
    }

    pub async fn doctor_requests(&self) -> Result<Vec<CaseRecord>, ApiError> {
        self.transport.get(DOCTOR_REQUESTS_PATH).await
    }

    pub async fn accept_case(&self, case_id: u64) -> Result<CaseAction, ApiError> {
        self.transport.post(&format!("accept-case/{case_id}")).await
    }

    pub async fn complete_case(&self, case_id: u64) -> Result<CaseAction, ApiError> {
        self.transport.post(&format!("complete-case/{case_id}")).await
    }
}
