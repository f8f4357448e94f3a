//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "HTTP implementation of the intake backend boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::Result;
use async_trait::async_trait;
use ems_common::BackendConfig;
use ems_intake::{
    ApiError, EmergencyReport, EmergencyRequest, IntakeBackend, Reservation,
    SelectHospitalRequest, SessionState,
};
use serde::de::IgnoredAny;
use tracing::instrument;

use crate::transport::JsonTransport;

pub const SESSION_STATE_PATH: &str = "session-state";
pub const SESSION_CLEAR_PATH: &str = "session-clear";
pub const EMERGENCY_PATH: &str = "emergency";
pub const SELECT_HOSPITAL_PATH: &str = "select-hospital";

/// Talks to the triage/booking service over HTTP. The session cookie issued
/// by the server is kept for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    transport: JsonTransport,
}

impl HttpBackend {
    pub fn new(transport: JsonTransport) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(JsonTransport::from_config(config)?))
    }

    pub fn transport(&self) -> &JsonTransport {
        &self.transport
    }
}

#[async_trait]
impl IntakeBackend for HttpBackend {
    #[instrument(skip(self), level = "debug")]
    async fn session_state(&self) -> Result<SessionState, ApiError> {
        self.transport.get(SESSION_STATE_PATH).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear_session(&self) -> Result<(), ApiError> {
        self.transport
            .post::<IgnoredAny>(SESSION_CLEAR_PATH)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, level = "debug")]
    async fn submit_emergency(
        &self,
        request: &EmergencyRequest,
    ) -> Result<EmergencyReport, ApiError> {
        self.transport.post_json(EMERGENCY_PATH, request).await
    }

    #[instrument(skip_all, fields(hospital = %request.hospital_name), level = "debug")]
    async fn select_hospital(
        &self,
        request: &SelectHospitalRequest,
    ) -> Result<Reservation, ApiError> {
        self.transport.post_json(SELECT_HOSPITAL_PATH, request).await
    }
}
