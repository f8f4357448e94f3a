//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Scripted intake backend with call recording."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ems_intake::{
    ApiError, EmergencyReport, EmergencyRequest, IntakeBackend, Reservation,
    SelectHospitalRequest, SessionState,
};
use parking_lot::Mutex;

/// Backend answering from per-endpoint reply queues.
///
/// Submissions and reservations wait `latency` before answering, which lets
/// paused-clock tests act while they are in flight. Session calls answer
/// immediately. An exhausted queue answers with a transport error.
#[derive(Default)]
pub struct MockBackend {
    latency: Mutex<Duration>,
    session: Mutex<Option<Result<SessionState, ApiError>>>,
    clear_failure: Mutex<Option<ApiError>>,
    submit_replies: Mutex<VecDeque<Result<EmergencyReport, ApiError>>>,
    select_replies: Mutex<VecDeque<Result<Reservation, ApiError>>>,
    submitted: Mutex<Vec<EmergencyRequest>>,
    selected: Mutex<Vec<SelectHospitalRequest>>,
    session_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn set_session(&self, session: Result<SessionState, ApiError>) {
        *self.session.lock() = Some(session);
    }

    pub fn fail_clear(&self, err: ApiError) {
        *self.clear_failure.lock() = Some(err);
    }

    pub fn push_submit(&self, reply: Result<EmergencyReport, ApiError>) -> &Self {
        self.submit_replies.lock().push_back(reply);
        self
    }

    pub fn push_select(&self, reply: Result<Reservation, ApiError>) -> &Self {
        self.select_replies.lock().push_back(reply);
        self
    }

    pub fn submitted(&self) -> Vec<EmergencyRequest> {
        self.submitted.lock().clone()
    }

    pub fn selected(&self) -> Vec<SelectHospitalRequest> {
        self.selected.lock().clone()
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn exhausted(endpoint: &str) -> ApiError {
    ApiError::Transport(format!("no scripted reply for {endpoint}"))
}

#[async_trait]
impl IntakeBackend for MockBackend {
    async fn session_state(&self) -> Result<SessionState, ApiError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.session
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(SessionState::default()))
    }

    async fn clear_session(&self) -> Result<(), ApiError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        match self.clear_failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn submit_emergency(
        &self,
        request: &EmergencyRequest,
    ) -> Result<EmergencyReport, ApiError> {
        self.submitted.lock().push(request.clone());
        self.delay().await;
        let reply = self.submit_replies.lock().pop_front();
        reply.unwrap_or_else(|| Err(exhausted("submit_emergency")))
    }

    async fn select_hospital(
        &self,
        request: &SelectHospitalRequest,
    ) -> Result<Reservation, ApiError> {
        self.selected.lock().push(request.clone());
        self.delay().await;
        let reply = self.select_replies.lock().pop_front();
        reply.unwrap_or_else(|| Err(exhausted("select_hospital")))
    }
}
