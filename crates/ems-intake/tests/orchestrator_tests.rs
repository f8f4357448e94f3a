//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Intake workflow tests against scripted location and backend."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use ems_intake::{
    ApiError, IntakeError, IntakeOrchestrator, IntakeSettings, IntakeState, LocationStatus,
    Notice, RequestOutcome, ResultCache, SeverityLevel, Step, ToastKind, ValidationError,
};
use ems_location::{LocationEvent, LocationFailure, LocationSource, Position};
use ems_testharness::fixtures::{chest_pain_report, delhi, fast_policy, reservation};
use ems_testharness::{FailingCache, MemoryCache, MockBackend, RecordingPresenter, ScriptedDevice};
use serde_json::json;
use tokio::time::sleep;

struct Harness {
    backend: Arc<MockBackend>,
    device: Arc<ScriptedDevice>,
    presenter: Arc<RecordingPresenter>,
    cache: Arc<MemoryCache>,
    orchestrator: Arc<IntakeOrchestrator>,
}

impl Harness {
    fn new() -> Self {
        Self::build(MockBackend::new(), ScriptedDevice::new())
    }

    fn build(backend: MockBackend, device: ScriptedDevice) -> Self {
        let cache = Arc::new(MemoryCache::new());
        Self::with_cache(backend, device, cache.clone(), cache)
    }

    fn with_cache(
        backend: MockBackend,
        device: ScriptedDevice,
        cache: Arc<MemoryCache>,
        installed: Arc<dyn ResultCache>,
    ) -> Self {
        let backend = Arc::new(backend);
        let device = Arc::new(device);
        let presenter = Arc::new(RecordingPresenter::new());
        let location = LocationSource::new(device.clone(), fast_policy());
        let orchestrator = Arc::new(IntakeOrchestrator::new(
            backend.clone(),
            location,
            installed,
            presenter.clone(),
            IntakeSettings::default(),
        ));
        Self {
            backend,
            device,
            presenter,
            cache,
            orchestrator,
        }
    }

    fn located(self) -> Self {
        self.orchestrator
            .handle_location_event(&LocationEvent::Update(delhi()));
        self
    }

    async fn triaged(self) -> Self {
        self.backend.push_submit(Ok(chest_pain_report()));
        self.orchestrator.set_message("Severe chest pain");
        let outcome = self.orchestrator.submit().await.unwrap();
        assert_eq!(outcome, RequestOutcome::Applied);
        self
    }
}

/// The state a clear leaves behind for a caller located at `position`.
fn cleared_at(position: Position) -> IntakeState {
    IntakeState {
        position: Some(position),
        ..IntakeState::default()
    }
}

#[tokio::test(start_paused = true)]
async fn chest_pain_submission_reaches_triage() {
    let h = Harness::new();
    let position = Position::new(28.6, 77.2, Some(15.0)).unwrap();
    h.orchestrator
        .handle_location_event(&LocationEvent::Update(position));
    h.orchestrator.set_message("Severe chest pain");
    assert!(h.orchestrator.submit_enabled());

    h.backend.push_submit(Ok(serde_json::from_value(json!({
        "triage": {"severity_level": "Critical", "severity_score": 9},
        "hospitals": [{"name": "City Hospital", "distance_meters": 1200}]
    }))
    .unwrap()));

    let outcome = h.orchestrator.submit().await.unwrap();
    assert_eq!(outcome, RequestOutcome::Applied);

    let snapshot = h.orchestrator.snapshot();
    let state = &snapshot.state;
    assert_eq!(state.step, Step::Triage);
    let triage = state.triage.as_ref().expect("triage stored");
    assert_eq!(triage.assessment.severity_level(), SeverityLevel::Critical);
    assert_eq!(triage.assessment.severity_score(), Some(9.0));
    let hospitals = state.hospitals.as_ref().expect("hospitals stored");
    assert_eq!(hospitals[0].name, "City Hospital");
    assert_eq!(hospitals[0].distance_km(), 1.2);
    assert!(!state.is_submitting);
    assert!(snapshot.hospital_list_visible);
    assert!(!snapshot.submit_enabled);
    state.check_invariants().unwrap();

    let sent = h.backend.submitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message, "Severe chest pain");
    assert_eq!((sent[0].lat, sent[0].lng), (28.6, 77.2));

    assert_eq!(h.cache.stores(), 1);
    let notices = h.presenter.notices();
    assert!(notices.contains(&Notice::StepChanged(Step::Triage)));
    assert!(notices.contains(&Notice::Loading(None)));
    assert_eq!(notices.last(), Some(&Notice::HospitalList(true)));
}

#[tokio::test(start_paused = true)]
async fn reservation_confirms_booking() {
    let h = Harness::new().located().triaged().await;
    h.backend
        .push_select(Ok(reservation(101, "City Hospital")));

    let outcome = h.orchestrator.select_hospital("City Hospital").await.unwrap();
    assert_eq!(outcome, RequestOutcome::Applied);

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Confirmed);
    let booking = snapshot.state.booking.as_ref().expect("booking stored");
    assert_eq!(booking.case_id, 101);
    assert_eq!(booking.hospital_name, "City Hospital");
    assert_eq!(booking.available_beds, 4);
    assert!(!snapshot.hospital_list_visible);
    snapshot.state.check_invariants().unwrap();

    let request = &h.backend.selected()[0];
    let report = chest_pain_report();
    assert_eq!(request.hospital_name, "City Hospital");
    assert_eq!(request.triage, report.triage);
    assert_eq!(request.location, report.location);
    assert_eq!(h.presenter.steps().last(), Some(&Step::Confirmed));
}

#[tokio::test(start_paused = true)]
async fn short_messages_never_enable_submit() {
    let h = Harness::new().located();
    for message in ["", "     ", "help", "  abc  ", "ab\n\n", "\té🚑é\t"] {
        h.orchestrator.set_message(message);
        assert!(!h.orchestrator.submit_enabled(), "{message:?} enabled submit");

        let err = h.orchestrator.submit().await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::MessageTooShort { min: 5, .. })
        ));
        let state = h.orchestrator.state();
        assert_eq!(state.step, Step::Compose);
        assert!(!state.is_submitting);
    }
    assert!(h.backend.submitted().is_empty());
    assert!(h.presenter.has_toast(ToastKind::Warn, "Please describe the emergency."));
}

#[tokio::test(start_paused = true)]
async fn valid_messages_enable_submit_only_with_location() {
    let h = Harness::new();
    for message in ["fire!", "  chest pain  ", "ééééé", "Car accident on NH-48"] {
        h.orchestrator.set_message(message);
        assert!(!h.orchestrator.submit_enabled());
    }
    let h = h.located();
    for message in ["fire!", "  chest pain  ", "ééééé", "Car accident on NH-48"] {
        h.orchestrator.set_message(message);
        assert!(h.orchestrator.submit_enabled(), "{message:?} should enable submit");
    }
}

#[tokio::test(start_paused = true)]
async fn denied_location_offers_manual_entry() {
    let device = ScriptedDevice::new();
    device.push_probe(Err(LocationFailure::permission_denied()));
    let h = Harness::build(MockBackend::new(), device);
    let _listener = h.orchestrator.attach_location();
    h.orchestrator.set_message("Severe chest pain");

    h.orchestrator.start_location();
    sleep(Duration::from_millis(10)).await;

    let snapshot = h.orchestrator.snapshot();
    assert!(snapshot.manual_entry_visible);
    assert!(!snapshot.submit_enabled);
    assert!(!h.orchestrator.location().retry_pending());
    assert!(h.presenter.notices().iter().any(|notice| matches!(
        notice,
        Notice::Location(LocationStatus::Unavailable { message, .. })
            if message.contains("browser settings")
    )));

    let position = h.orchestrator.apply_manual_coordinates(28.6, 77.2).unwrap();
    assert_eq!(position.accuracy_meters, None);
    let snapshot = h.orchestrator.snapshot();
    assert!(snapshot.submit_enabled);
    assert!(!snapshot.manual_entry_visible);
    assert!(h.presenter.has_toast(ToastKind::Success, "Manual coordinates applied."));
}

#[tokio::test(start_paused = true)]
async fn manual_coordinates_out_of_range_are_rejected() {
    let h = Harness::new();
    for (lat, lng) in [(90.5, 0.0), (0.0, -180.1), (f64::NAN, 10.0)] {
        let err = h.orchestrator.apply_manual_coordinates(lat, lng).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::InvalidCoordinates { .. })
        ));
    }
    assert!(h.orchestrator.state().position.is_none());
    assert!(h.presenter.has_toast(ToastKind::Warn, "Enter valid latitude"));
}

#[tokio::test(start_paused = true)]
async fn newest_location_event_wins() {
    let h = Harness::new();
    let first = Position::new(12.97, 77.59, Some(40.0)).unwrap();
    h.orchestrator
        .handle_location_event(&LocationEvent::Update(first));
    h.orchestrator
        .handle_location_event(&LocationEvent::Update(delhi()));
    h.orchestrator.handle_location_event(&LocationEvent::Failed(
        LocationFailure::timeout(Duration::from_secs(10)),
    ));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.state.position, Some(delhi()));
    assert!(snapshot.manual_entry_visible);
}

#[tokio::test(start_paused = true)]
async fn retry_location_clears_position_and_restarts() {
    let h = Harness::new().located();
    h.device.push_probe(Ok(delhi()));
    let _listener = h.orchestrator.attach_location();

    h.orchestrator.retry_location();
    assert!(!h.orchestrator.state().location_ready());
    assert!(h
        .presenter
        .notices()
        .contains(&Notice::Location(LocationStatus::Detecting)));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.device.probe_calls(), 1);
    assert_eq!(h.orchestrator.state().position, Some(delhi()));
}

#[tokio::test(start_paused = true)]
async fn backend_error_returns_to_compose() {
    let h = Harness::new().located();
    h.backend
        .push_submit(Err(ApiError::Backend("AI triage failed".into())));
    h.orchestrator.set_message("Severe chest pain");

    let err = h.orchestrator.submit().await.unwrap_err();
    assert_eq!(
        err,
        IntakeError::Backend {
            message: "AI triage failed".into()
        }
    );
    let state = h.orchestrator.state();
    assert_eq!(state.step, Step::Compose);
    assert!(!state.is_submitting);
    assert!(state.triage.is_none());
    state.check_invariants().unwrap();
    assert_eq!(h.presenter.steps(), vec![Step::Triage, Step::Compose]);
    assert!(h.presenter.has_toast(ToastKind::Error, "Error: AI triage failed"));
    assert_eq!(h.cache.stores(), 0);
    assert!(h.orchestrator.submit_enabled());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_surfaces_as_network_error() {
    let h = Harness::new().located();
    h.backend
        .push_submit(Err(ApiError::Transport("connection refused".into())));
    h.orchestrator.set_message("Severe chest pain");

    let err = h.orchestrator.submit().await.unwrap_err();
    assert!(matches!(err, IntakeError::Network { .. }));
    assert_eq!(h.orchestrator.state().step, Step::Compose);
    assert!(h
        .presenter
        .has_toast(ToastKind::Error, "Network error: connection refused"));
}

#[tokio::test(start_paused = true)]
async fn duplicate_submit_while_in_flight_is_ignored() {
    let h = Harness::build(
        MockBackend::new().with_latency(Duration::from_secs(1)),
        ScriptedDevice::new(),
    )
    .located();
    h.backend.push_submit(Ok(chest_pain_report()));
    h.orchestrator.set_message("Severe chest pain");

    let orchestrator = h.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.submit().await });
    sleep(Duration::from_millis(10)).await;

    let state = h.orchestrator.state();
    assert!(state.is_submitting);
    assert_eq!(state.step, Step::Triage);
    state.check_invariants().unwrap();
    assert_eq!(h.orchestrator.submit().await.unwrap(), RequestOutcome::InFlight);

    assert_eq!(first.await.unwrap().unwrap(), RequestOutcome::Applied);
    assert_eq!(h.backend.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_selection_while_in_flight_is_ignored() {
    let h = Harness::build(
        MockBackend::new().with_latency(Duration::from_secs(1)),
        ScriptedDevice::new(),
    )
    .located()
    .triaged()
    .await;
    h.backend
        .push_select(Ok(reservation(7, "City Heart Institute")));

    let orchestrator = h.orchestrator.clone();
    let first =
        tokio::spawn(async move { orchestrator.select_hospital("City Heart Institute").await });
    sleep(Duration::from_millis(10)).await;

    assert!(h.orchestrator.state().is_selecting);
    assert_eq!(
        h.orchestrator.select_hospital("Metro General").await.unwrap(),
        RequestOutcome::InFlight
    );

    assert_eq!(first.await.unwrap().unwrap(), RequestOutcome::Applied);
    let selected = h.backend.selected();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].hospital_name, "City Heart Institute");
}

#[tokio::test(start_paused = true)]
async fn failed_selection_keeps_hospitals_selectable() {
    let h = Harness::new().located().triaged().await;
    h.backend
        .push_select(Err(ApiError::Backend("No beds available".into())));

    let err = h.orchestrator.select_hospital("Metro General").await.unwrap_err();
    assert!(matches!(err, IntakeError::Backend { .. }));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Triage);
    assert!(!snapshot.state.is_selecting);
    assert!(snapshot.hospital_list_visible);
    assert!(snapshot.state.booking.is_none());
    assert_eq!(
        h.presenter.notices().iter().rev().nth(1),
        Some(&Notice::HospitalList(true))
    );

    h.backend
        .push_select(Ok(reservation(9, "Metro General")));
    assert_eq!(
        h.orchestrator.select_hospital("Metro General").await.unwrap(),
        RequestOutcome::Applied
    );
}

#[tokio::test(start_paused = true)]
async fn selection_requires_triage() {
    let h = Harness::new().located();
    let err = h.orchestrator.select_hospital("City Hospital").await.unwrap_err();
    assert_eq!(err, IntakeError::Validation(ValidationError::NoTriage));
    assert!(h.backend.selected().is_empty());
    assert!(h.presenter.has_toast(ToastKind::Warn, "Submit emergency first."));
}

#[tokio::test(start_paused = true)]
async fn confirmed_step_only_exits_through_clear() {
    let h = Harness::new().located().triaged().await;
    h.backend.push_select(Ok(reservation(3, "Metro General")));
    h.orchestrator.select_hospital("Metro General").await.unwrap();

    let err = h.orchestrator.select_hospital("Metro General").await.unwrap_err();
    assert!(matches!(
        err,
        IntakeError::Validation(ValidationError::WrongStep {
            expected: Step::Triage,
            actual: Step::Confirmed
        })
    ));
    h.orchestrator.set_message("Another emergency");
    let err = h.orchestrator.submit().await.unwrap_err();
    assert!(matches!(
        err,
        IntakeError::Validation(ValidationError::WrongStep { .. })
    ));
    assert_eq!(h.orchestrator.state().step, Step::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn clear_session_is_idempotent() {
    let h = Harness::new().located().triaged().await;
    h.backend.push_select(Ok(reservation(5, "Metro General")));
    h.orchestrator.select_hospital("Metro General").await.unwrap();
    assert!(h.cache.entry().is_some());

    h.orchestrator.clear_session().await;
    let once = h.orchestrator.snapshot();
    h.orchestrator.clear_session().await;
    let twice = h.orchestrator.snapshot();

    assert_eq!(once, twice);
    assert_eq!(once.state, cleared_at(delhi()));
    assert!(!once.hospital_list_visible);
    assert!(!once.restore_banner_visible);
    assert_eq!(h.backend.clear_calls(), 2);
    assert!(h.cache.entry().is_none());
    assert!(h
        .presenter
        .has_toast(ToastKind::Info, "Session cleared"));
}

#[tokio::test(start_paused = true)]
async fn clear_session_resets_even_when_remote_fails() {
    let h = Harness::new().located().triaged().await;
    h.backend
        .fail_clear(ApiError::Transport("connection reset".into()));

    h.orchestrator.clear_session().await;
    assert_eq!(h.orchestrator.state(), cleared_at(delhi()));
}

#[tokio::test(start_paused = true)]
async fn device_position_survives_clear_for_the_next_report() {
    let h = Harness::new();
    let _listener = h.orchestrator.attach_location();
    h.orchestrator.start_location();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.device.push_watch(Ok(delhi())), 1);
    sleep(Duration::from_millis(10)).await;
    let h = h.triaged().await;

    h.orchestrator.clear_session().await;
    h.orchestrator.set_message("Another emergency here");

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Compose);
    assert_eq!(snapshot.state.position, Some(delhi()));
    assert!(snapshot.state.triage.is_none());
    assert!(snapshot.submit_enabled);

    h.backend.push_submit(Ok(chest_pain_report()));
    assert_eq!(h.orchestrator.submit().await.unwrap(), RequestOutcome::Applied);
    assert_eq!(h.backend.submitted().len(), 2);
    assert_eq!(h.device.probe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_submission_after_clear_is_discarded() {
    let h = Harness::build(
        MockBackend::new().with_latency(Duration::from_secs(1)),
        ScriptedDevice::new(),
    )
    .located();
    h.backend.push_submit(Ok(chest_pain_report()));
    h.orchestrator.set_message("Severe chest pain");

    let orchestrator = h.orchestrator.clone();
    let pending = tokio::spawn(async move { orchestrator.submit().await });
    sleep(Duration::from_millis(10)).await;
    h.orchestrator.clear_session().await;

    assert_eq!(pending.await.unwrap().unwrap(), RequestOutcome::Superseded);
    assert_eq!(h.orchestrator.state(), cleared_at(delhi()));
    assert_eq!(h.cache.stores(), 0);
}

#[tokio::test(start_paused = true)]
async fn fallback_fix_supplies_missing_position() {
    let h = Harness::new();
    h.device.push_probe(Ok(delhi()));
    h.backend.push_submit(Ok(chest_pain_report()));
    h.orchestrator.set_message("Severe chest pain");

    assert_eq!(h.orchestrator.submit().await.unwrap(), RequestOutcome::Applied);
    assert!(h
        .presenter
        .has_toast(ToastKind::Info, "Fetching location one more time"));
    assert_eq!(h.device.last_options(), Some(fast_policy().fallback));
    assert_eq!(h.backend.submitted()[0].lat, delhi().latitude);
    assert_eq!(h.orchestrator.state().position, Some(delhi()));
}

#[tokio::test(start_paused = true)]
async fn fallback_failure_aborts_without_advancing() {
    let h = Harness::new();
    h.orchestrator.set_message("Severe chest pain");

    let err = h.orchestrator.submit().await.unwrap_err();
    assert_eq!(err, IntakeError::Validation(ValidationError::LocationMissing));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Compose);
    assert!(!snapshot.state.is_submitting);
    assert!(snapshot.manual_entry_visible);
    assert!(h.backend.submitted().is_empty());
    assert!(h
        .presenter
        .has_toast(ToastKind::Error, "Location unavailable"));
    assert!(!h.presenter.steps().contains(&Step::Triage));
}

#[tokio::test(start_paused = true)]
async fn unsupported_device_skips_fallback_probe() {
    let h = Harness::build(MockBackend::new(), ScriptedDevice::unsupported());
    h.orchestrator.set_message("Severe chest pain");

    let err = h.orchestrator.submit().await.unwrap_err();
    assert_eq!(err, IntakeError::Validation(ValidationError::LocationMissing));
    assert_eq!(h.device.probe_calls(), 0);
    assert!(h
        .presenter
        .has_toast(ToastKind::Warn, "Geolocation not supported"));
}

#[tokio::test(start_paused = true)]
async fn cache_failures_do_not_affect_submission() {
    let h = Harness::with_cache(
        MockBackend::new(),
        ScriptedDevice::new(),
        Arc::new(MemoryCache::new()),
        Arc::new(FailingCache),
    )
    .located();
    h.backend.push_submit(Ok(chest_pain_report()));
    h.orchestrator.set_message("Severe chest pain");

    assert_eq!(h.orchestrator.submit().await.unwrap(), RequestOutcome::Applied);
    assert_eq!(h.orchestrator.state().step, Step::Triage);

    h.orchestrator.clear_session().await;
    assert_eq!(h.orchestrator.state(), cleared_at(delhi()));
}
