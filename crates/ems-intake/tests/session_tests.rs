//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Session restore tests."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use ems_intake::session::rebuild;
use ems_intake::{
    ApiError, IntakeOrchestrator, IntakeSettings, Notice, RestoreResult, SessionRehydrator,
    SessionState, Step,
};
use ems_location::{LocationEvent, LocationSource};
use ems_testharness::fixtures::{booked_session, chest_pain_report, delhi, fast_policy};
use ems_testharness::{FailingCache, MemoryCache, MockBackend, RecordingPresenter, ScriptedDevice};

fn rehydrator(backend: &Arc<MockBackend>, cache: &Arc<MemoryCache>) -> SessionRehydrator {
    SessionRehydrator::new(backend.clone(), cache.clone())
}

#[test]
fn booking_restores_confirmation_with_hospitals_hidden() {
    let RestoreResult::Restored(restored) = rebuild(booked_session(42, "Metro General")) else {
        panic!("expected restored session");
    };
    assert_eq!(restored.step(), Step::Confirmed);
    assert!(!restored.hospitals_visible);
    let booking = restored.state.booking.as_ref().unwrap();
    assert_eq!(booking.case_id, 42);
    assert_eq!(booking.hospital_name, "Metro General");
    assert!(restored.state.triage.is_some());
    restored.state.check_invariants().unwrap();
}

#[test]
fn emergency_alone_restores_triage_with_hospitals_shown() {
    let session = SessionState {
        emergency: Some(chest_pain_report()),
        booking: None,
    };
    let RestoreResult::Restored(restored) = rebuild(session) else {
        panic!("expected restored session");
    };
    assert_eq!(restored.step(), Step::Triage);
    assert!(restored.hospitals_visible);
    assert_eq!(restored.state.hospitals.as_ref().map(Vec::len), Some(2));
    let triage = restored.state.triage.as_ref().unwrap();
    assert_eq!(triage.location_label(), Some("Connaught Place, New Delhi"));
    assert_eq!(triage.ambulance_status.as_deref(), Some("Ambulance dispatched"));
    restored.state.check_invariants().unwrap();
}

#[test]
fn empty_or_orphan_sessions_start_fresh() {
    assert_eq!(rebuild(SessionState::default()), RestoreResult::Fresh);
    let orphan = SessionState {
        emergency: None,
        ..booked_session(1, "Metro General")
    };
    assert_eq!(rebuild(orphan), RestoreResult::Fresh);
}

#[tokio::test]
async fn restore_mirrors_payload_into_cache() {
    let backend = Arc::new(MockBackend::new());
    backend.set_session(Ok(booked_session(8, "City Heart Institute")));
    let cache = Arc::new(MemoryCache::new());

    let result = rehydrator(&backend, &cache).restore().await;
    assert!(result.is_restored());
    assert_eq!(backend.session_calls(), 1);
    let entry = cache.entry().expect("mirrored");
    assert_eq!(entry.hospitals.len(), 2);
}

#[tokio::test]
async fn restore_failures_fall_back_to_fresh() {
    let backend = Arc::new(MockBackend::new());
    backend.set_session(Err(ApiError::Transport("invalid JSON body".into())));
    let cache = Arc::new(MemoryCache::new());

    assert_eq!(
        rehydrator(&backend, &cache).restore().await,
        RestoreResult::Fresh
    );
    assert!(cache.entry().is_none());
}

#[tokio::test]
async fn restore_tolerates_failing_cache() {
    let backend = Arc::new(MockBackend::new());
    backend.set_session(Ok(booked_session(8, "City Heart Institute")));
    let rehydrator = SessionRehydrator::new(backend.clone(), Arc::new(FailingCache));

    assert!(rehydrator.restore().await.is_restored());
}

#[tokio::test(start_paused = true)]
async fn orchestrator_installs_restored_session_and_banner() {
    let backend = Arc::new(MockBackend::new());
    backend.set_session(Ok(SessionState {
        emergency: Some(chest_pain_report()),
        booking: None,
    }));
    let cache = Arc::new(MemoryCache::new());
    let presenter = Arc::new(RecordingPresenter::new());
    let orchestrator = IntakeOrchestrator::new(
        backend.clone(),
        LocationSource::new(Arc::new(ScriptedDevice::new()), fast_policy()),
        cache.clone(),
        presenter.clone(),
        IntakeSettings::default(),
    );
    orchestrator.handle_location_event(&LocationEvent::Update(delhi()));
    orchestrator.set_message("draft in progress");

    let result = orchestrator.rehydrate(&rehydrator(&backend, &cache)).await;
    assert!(result.is_restored());

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Triage);
    assert!(snapshot.restore_banner_visible);
    assert!(snapshot.hospital_list_visible);
    assert_eq!(snapshot.state.position, Some(delhi()));
    assert_eq!(snapshot.state.message_draft, "draft in progress");
    assert!(presenter.notices().contains(&Notice::RestoreBanner(true)));

    orchestrator.clear_session().await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Compose);
    assert!(!snapshot.restore_banner_visible);
    assert!(presenter.notices().contains(&Notice::RestoreBanner(false)));
}

#[tokio::test(start_paused = true)]
async fn restore_is_ignored_once_intake_has_progressed() {
    let backend = Arc::new(MockBackend::new());
    backend.push_submit(Ok(chest_pain_report()));
    backend.set_session(Ok(booked_session(99, "Metro General")));
    let cache = Arc::new(MemoryCache::new());
    let orchestrator = IntakeOrchestrator::new(
        backend.clone(),
        LocationSource::new(Arc::new(ScriptedDevice::new()), fast_policy()),
        cache.clone(),
        Arc::new(RecordingPresenter::new()),
        IntakeSettings::default(),
    );
    orchestrator.handle_location_event(&LocationEvent::Update(delhi()));
    orchestrator.set_message("Severe chest pain");
    orchestrator.submit().await.unwrap();

    orchestrator.rehydrate(&rehydrator(&backend, &cache)).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state.step, Step::Triage);
    assert!(snapshot.state.booking.is_none());
    assert!(!snapshot.restore_banner_visible);
}
