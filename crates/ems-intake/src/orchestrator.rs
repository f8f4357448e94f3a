//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Intake state machine coordinating location, backend and presentation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::mem;
use std::sync::Arc;

use ems_common::IntakeConfig;
use ems_location::{FailureCode, LocationEvent, LocationSource, Position};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{EmergencyRequest, IntakeBackend, SelectHospitalRequest};
use crate::cache::{self, ResultCache};
use crate::error::{IntakeError, Result, ValidationError};
use crate::presenter::{LocationStatus, Notice, Presenter, ToastKind};
use crate::session::{RestoreResult, SessionRehydrator};
use crate::state::{BookingResult, IntakeState, Step, TriageResult};

const SUBMIT_LOADING_TEXT: &str = "Analyzing emergency & finding nearby hospitals…";

/// Tunables for the intake workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSettings {
    /// Minimum trimmed message length accepted for submission.
    pub min_message_chars: usize,
}

impl IntakeSettings {
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self {
            min_message_chars: config.min_message_chars,
        }
    }
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}

/// How a guarded request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The response was applied to the state.
    Applied,
    /// A request of the same kind was already in flight; nothing was sent.
    InFlight,
    /// The session was cleared while waiting; the response was discarded.
    Superseded,
}

/// Point-in-time copy of the workflow state plus derived view flags.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSnapshot {
    pub state: IntakeState,
    pub submit_enabled: bool,
    pub manual_entry_visible: bool,
    pub hospital_list_visible: bool,
    pub restore_banner_visible: bool,
}

#[derive(Debug, Default)]
struct ViewFlags {
    manual_entry_visible: bool,
    hospital_list_visible: bool,
    restore_banner_visible: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: IntakeState,
    view: ViewFlags,
    /// Bumped by every session clear; responses carry the epoch they started in.
    epoch: u64,
}

/// Drives the three-step intake workflow: compose, triage and confirmation.
///
/// All mutation goes through the methods below. The internal lock is never
/// held across an await point, and presenter notices are dispatched after it
/// is released.
pub struct IntakeOrchestrator {
    backend: Arc<dyn IntakeBackend>,
    location: LocationSource,
    cache: Arc<dyn ResultCache>,
    presenter: Arc<dyn Presenter>,
    settings: IntakeSettings,
    inner: Mutex<Inner>,
}

impl IntakeOrchestrator {
    pub fn new(
        backend: Arc<dyn IntakeBackend>,
        location: LocationSource,
        cache: Arc<dyn ResultCache>,
        presenter: Arc<dyn Presenter>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            backend,
            location,
            cache,
            presenter,
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn settings(&self) -> IntakeSettings {
        self.settings
    }

    pub fn location(&self) -> &LocationSource {
        &self.location
    }

    pub fn state(&self) -> IntakeState {
        self.inner.lock().state.clone()
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        let inner = self.inner.lock();
        IntakeSnapshot {
            state: inner.state.clone(),
            submit_enabled: inner.state.submit_enabled(self.settings.min_message_chars),
            manual_entry_visible: inner.view.manual_entry_visible,
            hospital_list_visible: inner.view.hospital_list_visible,
            restore_banner_visible: inner.view.restore_banner_visible,
        }
    }

    pub fn submit_enabled(&self) -> bool {
        self.inner
            .lock()
            .state
            .submit_enabled(self.settings.min_message_chars)
    }

    /// Forward location events from the source into this orchestrator until
    /// either side is dropped. The receiver is registered before returning.
    pub fn attach_location(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.location.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(orchestrator) = weak.upgrade() else {
                            break;
                        };
                        orchestrator.handle_location_event(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "location listener lagged; newest events still apply");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("location listener stopped");
        })
    }

    /// Announce detection and begin acquisition with a fresh subscription.
    pub fn start_location(&self) {
        self.notify(Notice::Location(LocationStatus::Detecting));
        self.location.start(true);
    }

    pub fn handle_location_event(&self, event: &LocationEvent) {
        let notices = {
            let mut inner = self.inner.lock();
            inner.state.apply_location(event);
            match event {
                LocationEvent::Update(position) => {
                    inner.view.manual_entry_visible = false;
                    vec![
                        Notice::Location(LocationStatus::Ready {
                            position: *position,
                            manual: false,
                        }),
                        Notice::ManualEntry(false),
                    ]
                }
                LocationEvent::Failed(failure) => {
                    inner.view.manual_entry_visible = true;
                    vec![
                        Notice::Location(LocationStatus::unavailable(failure.code)),
                        Notice::ManualEntry(true),
                    ]
                }
            }
        };
        self.dispatch(notices);
    }

    pub fn set_message(&self, text: impl Into<String>) {
        self.inner.lock().state.message_draft = text.into();
    }

    /// Accept coordinates typed by the user in place of a device fix.
    pub fn apply_manual_coordinates(&self, latitude: f64, longitude: f64) -> Result<Position> {
        let Some(position) = Position::manual(latitude, longitude) else {
            self.notify(Notice::toast(
                ToastKind::Warn,
                "Enter valid latitude (−90–90) and longitude (−180–180)",
            ));
            return Err(ValidationError::InvalidCoordinates {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
            }
            .into());
        };
        {
            let mut inner = self.inner.lock();
            inner.state.position = Some(position);
            inner.view.manual_entry_visible = false;
        }
        info!(latitude, longitude, "manual coordinates applied");
        self.dispatch(vec![
            Notice::Location(LocationStatus::Ready {
                position,
                manual: true,
            }),
            Notice::ManualEntry(false),
            Notice::toast(ToastKind::Success, "Manual coordinates applied."),
        ]);
        Ok(position)
    }

    /// Drop the held position and restart device acquisition from scratch.
    pub fn retry_location(&self) {
        {
            let mut inner = self.inner.lock();
            inner.state.position = None;
            inner.view.manual_entry_visible = false;
        }
        self.dispatch(vec![
            Notice::Location(LocationStatus::Detecting),
            Notice::ManualEntry(false),
        ]);
        self.location.retry();
    }

    /// Send the drafted emergency with the held position.
    ///
    /// Without a position, one last bounded fix is attempted first. On
    /// success the workflow sits at [`Step::Triage`] with the hospital list
    /// shown; on failure it returns to [`Step::Compose`].
    pub async fn submit(&self) -> Result<RequestOutcome> {
        let (message, held, epoch) = {
            let mut inner = self.inner.lock();
            if inner.state.is_submitting {
                debug!("submission already in flight");
                return Ok(RequestOutcome::InFlight);
            }
            if inner.state.step != Step::Compose {
                return Err(ValidationError::WrongStep {
                    expected: Step::Compose,
                    actual: inner.state.step,
                }
                .into());
            }
            let message = inner.state.message_draft.trim().to_owned();
            let actual = message.chars().count();
            if actual < self.settings.min_message_chars {
                drop(inner);
                self.notify(Notice::toast(ToastKind::Warn, "Please describe the emergency."));
                return Err(ValidationError::MessageTooShort {
                    min: self.settings.min_message_chars,
                    actual,
                }
                .into());
            }
            inner.state.is_submitting = true;
            (message, inner.state.position, inner.epoch)
        };

        let position = match held {
            Some(position) => position,
            None => match self.last_chance_fix(epoch).await? {
                Some(position) => position,
                None => return Ok(RequestOutcome::Superseded),
            },
        };

        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return Ok(RequestOutcome::Superseded);
            }
            inner.state.step = Step::Triage;
            inner.state.triage = None;
            inner.state.hospitals = None;
            inner.state.booking = None;
            inner.view.hospital_list_visible = false;
            inner.view.restore_banner_visible = false;
        }
        self.dispatch(vec![
            Notice::Loading(Some(SUBMIT_LOADING_TEXT.to_owned())),
            Notice::StepChanged(Step::Triage),
            Notice::HospitalList(false),
            Notice::RestoreBanner(false),
        ]);

        let request = EmergencyRequest {
            message,
            lat: position.latitude,
            lng: position.longitude,
        };
        info!(
            lat = request.lat,
            lng = request.lng,
            chars = request.message.chars().count(),
            "submitting emergency"
        );
        let result = self.backend.submit_emergency(&request).await;

        let mut inner = self.inner.lock();
        if inner.epoch != epoch || !inner.state.is_submitting {
            drop(inner);
            info!("discarding emergency response for a cleared session");
            self.notify(Notice::Loading(None));
            return Ok(RequestOutcome::Superseded);
        }
        inner.state.is_submitting = false;
        match result {
            Ok(report) => {
                let hospitals = report.hospitals.len();
                inner.state.triage = Some(TriageResult::from_report(&report));
                inner.state.hospitals = Some(report.hospitals.clone());
                inner.view.hospital_list_visible = true;
                drop(inner);
                info!(
                    severity = report.triage.severity_level().as_str(),
                    hospitals, "emergency triaged"
                );
                cache::mirror(self.cache.as_ref(), &report);
                self.dispatch(vec![Notice::Loading(None), Notice::HospitalList(true)]);
                Ok(RequestOutcome::Applied)
            }
            Err(err) => {
                inner.state.step = Step::Compose;
                drop(inner);
                let err = IntakeError::from(err);
                warn!(error = %err, "emergency submission failed");
                self.dispatch(vec![
                    Notice::Loading(None),
                    Notice::StepChanged(Step::Compose),
                    Notice::toast(ToastKind::Error, failure_toast(&err)),
                ]);
                Err(err)
            }
        }
    }

    /// Bounded fallback fix used by `submit` when no position is held.
    /// `Ok(None)` means the session was cleared while waiting.
    async fn last_chance_fix(&self, epoch: u64) -> Result<Option<Position>> {
        let attempt = if self.location.is_supported() {
            self.notify(Notice::toast(ToastKind::Info, "Fetching location one more time…"));
            self.location.probe(self.location.policy().fallback).await
        } else {
            Err(ems_location::LocationFailure::unsupported())
        };

        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return Ok(None);
        }
        match attempt {
            Ok(position) => {
                inner.state.position = Some(position);
                drop(inner);
                self.notify(Notice::Location(LocationStatus::Ready {
                    position,
                    manual: false,
                }));
                Ok(Some(position))
            }
            Err(failure) => {
                inner.state.is_submitting = false;
                inner.view.manual_entry_visible = true;
                drop(inner);
                warn!(code = ?failure.code, "fallback location fix failed");
                let toast = if failure.code == FailureCode::Unsupported {
                    Notice::toast(
                        ToastKind::Warn,
                        "Geolocation not supported — enter coordinates manually.",
                    )
                } else {
                    Notice::toast(
                        ToastKind::Error,
                        "Location unavailable. Enter coordinates manually below.",
                    )
                };
                self.dispatch(vec![Notice::ManualEntry(true), toast]);
                Err(ValidationError::LocationMissing.into())
            }
        }
    }

    /// Reserve a bed at one of the hospitals returned by the last submission.
    pub async fn select_hospital(&self, hospital_name: &str) -> Result<RequestOutcome> {
        let (request, epoch) = {
            let mut inner = self.inner.lock();
            if inner.state.is_selecting {
                debug!("reservation already in flight");
                return Ok(RequestOutcome::InFlight);
            }
            let Some(triage) = inner.state.triage.as_ref() else {
                drop(inner);
                self.notify(Notice::toast(ToastKind::Warn, "Submit emergency first."));
                return Err(ValidationError::NoTriage.into());
            };
            if inner.state.step != Step::Triage {
                return Err(ValidationError::WrongStep {
                    expected: Step::Triage,
                    actual: inner.state.step,
                }
                .into());
            }
            let request = SelectHospitalRequest {
                hospital_name: hospital_name.to_owned(),
                triage: triage.assessment.clone(),
                location: triage.location.clone(),
            };
            inner.state.is_selecting = true;
            (request, inner.epoch)
        };

        info!(hospital = %request.hospital_name, "reserving bed");
        let result = self.backend.select_hospital(&request).await;

        let mut inner = self.inner.lock();
        if inner.epoch != epoch || !inner.state.is_selecting {
            drop(inner);
            info!("discarding reservation response for a cleared session");
            return Ok(RequestOutcome::Superseded);
        }
        inner.state.is_selecting = false;
        match result {
            Ok(reservation) => {
                let booking = BookingResult::from(reservation);
                info!(
                    case_id = booking.case_id,
                    hospital = %booking.hospital_name,
                    "bed reserved"
                );
                inner.state.booking = Some(booking);
                inner.state.step = Step::Confirmed;
                inner.view.hospital_list_visible = false;
                drop(inner);
                self.dispatch(vec![
                    Notice::HospitalList(false),
                    Notice::StepChanged(Step::Confirmed),
                ]);
                Ok(RequestOutcome::Applied)
            }
            Err(err) => {
                drop(inner);
                let err = IntakeError::from(err);
                warn!(error = %err, "bed reservation failed");
                self.dispatch(vec![
                    Notice::HospitalList(true),
                    Notice::toast(ToastKind::Error, failure_toast(&err)),
                ]);
                Err(err)
            }
        }
    }

    /// Discard the session remotely and locally. A remote failure is logged
    /// and the local reset still happens. Any response still in flight is
    /// discarded when it arrives. The caller's position outlives the
    /// session, so a new emergency can be reported straight away.
    pub async fn clear_session(&self) {
        if let Err(err) = self.backend.clear_session().await {
            warn!(error = %err, "remote session clear failed; resetting locally");
        }
        let device_fix = self.location.last_position();
        {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            let position = inner.state.position.or(device_fix);
            inner.state = IntakeState {
                position,
                ..IntakeState::default()
            };
            inner.view.hospital_list_visible = false;
            inner.view.restore_banner_visible = false;
        }
        cache::forget(self.cache.as_ref());
        info!("intake session cleared");
        self.dispatch(vec![
            Notice::RestoreBanner(false),
            Notice::HospitalList(false),
            Notice::StepChanged(Step::Compose),
            Notice::toast(ToastKind::Info, "Session cleared — ready for a new emergency."),
        ]);
    }

    /// Install a session restored from the backend. Ignored once the user
    /// has moved past a pristine compose step.
    pub async fn rehydrate(&self, rehydrator: &SessionRehydrator) -> RestoreResult {
        let result = rehydrator.restore().await;
        let RestoreResult::Restored(restored) = &result else {
            return result;
        };

        let notices = {
            let mut inner = self.inner.lock();
            let live = &inner.state;
            if live.step != Step::Compose || live.is_busy() || live.triage.is_some() {
                drop(inner);
                warn!("intake already in progress; restored session ignored");
                return result;
            }
            let position = inner.state.position;
            let draft = mem::take(&mut inner.state.message_draft);
            inner.state = restored.state.clone();
            inner.state.position = position;
            inner.state.message_draft = draft;
            inner.view.hospital_list_visible = restored.hospitals_visible;
            inner.view.restore_banner_visible = true;
            vec![
                Notice::RestoreBanner(true),
                Notice::StepChanged(restored.step()),
                Notice::HospitalList(restored.hospitals_visible),
            ]
        };
        self.dispatch(notices);
        result
    }

    fn notify(&self, notice: Notice) {
        self.presenter.notify(notice);
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            self.presenter.notify(notice);
        }
    }
}

fn failure_toast(err: &IntakeError) -> String {
    match err {
        IntakeError::Network { message } => format!("Network error: {message}"),
        IntakeError::Backend { message } => format!("Error: {message}"),
        IntakeError::Validation(inner) => inner.to_string(),
    }
}
