//! ---
//! ems_section: "02-location-acquisition"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Location source with one-shot probe, continuous watch and bounded retry."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::LocationDevice;
use crate::policy::AcquisitionPolicy;
use crate::types::{AcquisitionOptions, LocationEvent, LocationFailure, Position};

const EVENT_CAPACITY: usize = 32;

/// Identity of a continuous subscription. At most one is active per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl WatchId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

struct ActiveWatch {
    id: WatchId,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SourceState {
    attempts: u32,
    retry_timer: Option<JoinHandle<()>>,
    watch: Option<ActiveWatch>,
    last: Option<Position>,
    next_watch_id: u64,
}

struct SourceInner {
    device: Arc<dyn LocationDevice>,
    policy: AcquisitionPolicy,
    events: broadcast::Sender<LocationEvent>,
    state: Mutex<SourceState>,
}

/// Best-effort stream of position updates with bounded automatic retry.
///
/// Every `start` issues a bounded one-shot fix and (re)establishes the
/// continuous subscription; both report through the same success/failure
/// path. Outcomes are delivered to subscribers as [`LocationEvent`]s and never
/// returned to the caller.
///
/// Must be used from within a tokio runtime. Background tasks only hold weak
/// references, so dropping the last handle releases the device.
#[derive(Clone)]
pub struct LocationSource {
    inner: Arc<SourceInner>,
}

impl fmt::Debug for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LocationSource")
            .field("attempts", &state.attempts)
            .field("watch", &state.watch.as_ref().map(|watch| watch.id))
            .field("last", &state.last)
            .finish()
    }
}

impl LocationSource {
    pub fn new(device: Arc<dyn LocationDevice>, policy: AcquisitionPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SourceInner {
                device,
                policy,
                events,
                state: Mutex::new(SourceState::default()),
            }),
        }
    }

    /// Register a new listener. Events emitted before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_supported(&self) -> bool {
        self.inner.device.is_supported()
    }

    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.inner.policy
    }

    /// Most recent successful fix reported by either acquisition path.
    pub fn last_position(&self) -> Option<Position> {
        self.inner.state.lock().last
    }

    /// Transient failures counted since the last success or explicit retry.
    pub fn attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    pub fn retry_pending(&self) -> bool {
        self.inner
            .state
            .lock()
            .retry_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn active_watch(&self) -> Option<WatchId> {
        self.inner.state.lock().watch.as_ref().map(|watch| watch.id)
    }

    /// Begin acquisition.
    ///
    /// With `reset_existing` the current subscription is torn down first.
    /// Without it a replacement subscription is established before the old
    /// one is dropped, so exactly one remains active afterwards.
    pub fn start(&self, reset_existing: bool) {
        if !self.inner.device.is_supported() {
            warn!("location capability not supported on this device");
            self.emit(LocationEvent::Failed(LocationFailure::unsupported()));
            return;
        }
        if reset_existing {
            if let Some(watch) = self.inner.state.lock().watch.take() {
                debug!(watch = watch.id.0, "clearing existing watch");
                watch.task.abort();
            }
        }
        self.spawn_one_shot();
        self.replace_watch();
    }

    /// Externally triggered retry: resets the attempt budget, cancels any
    /// pending backoff and restarts with a fresh subscription.
    pub fn retry(&self) {
        {
            let mut state = self.inner.state.lock();
            state.attempts = 0;
            if let Some(timer) = state.retry_timer.take() {
                timer.abort();
            }
            if let Some(watch) = state.watch.take() {
                watch.task.abort();
            }
        }
        info!("location retry requested");
        self.start(false);
    }

    /// Cancel the subscription and any pending retry.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.retry_timer.take() {
            timer.abort();
        }
        if let Some(watch) = state.watch.take() {
            watch.task.abort();
        }
    }

    /// Direct bounded acquisition that bypasses retry and notification.
    pub async fn probe(&self, options: AcquisitionOptions) -> Result<Position, LocationFailure> {
        if !self.inner.device.is_supported() {
            return Err(LocationFailure::unsupported());
        }
        bounded_fix(self.inner.device.as_ref(), options).await
    }

    fn spawn_one_shot(&self) {
        let weak = Arc::downgrade(&self.inner);
        let device = self.inner.device.clone();
        let options = self.inner.policy.one_shot;
        tokio::spawn(async move {
            let result = bounded_fix(device.as_ref(), options).await;
            if let Some(source) = upgrade(&weak) {
                source.report(result);
            }
        });
    }

    fn replace_watch(&self) {
        let mut stream = self.inner.device.watch_position(self.inner.policy.watch);
        let weak = Arc::downgrade(&self.inner);
        let mut state = self.inner.state.lock();
        state.next_watch_id += 1;
        let id = WatchId(state.next_watch_id);
        // Per-update deadlines are enforced by the device.
        let task = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let Some(source) = upgrade(&weak) else {
                    break;
                };
                source.report(result);
            }
            debug!(watch = id.0, "watch stream ended");
        });
        if let Some(previous) = state.watch.replace(ActiveWatch { id, task }) {
            debug!(previous = previous.id.0, current = id.0, "replacing watch");
            previous.task.abort();
        }
    }

    fn report(&self, result: Result<Position, LocationFailure>) {
        match result {
            Ok(position) => {
                {
                    let mut state = self.inner.state.lock();
                    state.attempts = 0;
                    if let Some(timer) = state.retry_timer.take() {
                        debug!("success cancels pending location retry");
                        timer.abort();
                    }
                    state.last = Some(position);
                }
                debug!(
                    latitude = position.latitude,
                    longitude = position.longitude,
                    accuracy = ?position.accuracy_meters,
                    "position update"
                );
                self.emit(LocationEvent::Update(position));
            }
            Err(failure) => self.handle_failure(failure),
        }
    }

    fn handle_failure(&self, failure: LocationFailure) {
        let backoff = self.inner.policy.backoff;
        let mut state = self.inner.state.lock();
        warn!(
            attempt = state.attempts,
            code = ?failure.code,
            message = %failure.message,
            "location acquisition failed"
        );

        if failure.is_terminal() || state.attempts >= backoff.max_attempts {
            drop(state);
            self.emit(LocationEvent::Failed(failure));
            return;
        }

        state.attempts += 1;
        let attempt = state.attempts;
        let delay = backoff.delay_for(attempt);
        let weak = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(source) = upgrade(&weak) {
                debug!(attempt, "location retry firing");
                source.start(false);
            }
        });
        if let Some(previous) = state.retry_timer.replace(timer) {
            previous.abort();
        }
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "location retry scheduled"
        );
    }

    fn emit(&self, event: LocationEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("location event dropped; no subscribers");
        }
    }
}

fn upgrade(weak: &Weak<SourceInner>) -> Option<LocationSource> {
    weak.upgrade().map(|inner| LocationSource { inner })
}

async fn bounded_fix(
    device: &dyn LocationDevice,
    options: AcquisitionOptions,
) -> Result<Position, LocationFailure> {
    match tokio::time::timeout(options.timeout, device.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationFailure::timeout(options.timeout)),
    }
}
