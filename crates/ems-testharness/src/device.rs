//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Scripted location device for deterministic acquisition tests."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ems_location::{AcquisitionOptions, LocationDevice, LocationFailure, Position, PositionStream};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

type Fix = Result<Position, LocationFailure>;

/// Device whose one-shot answers are queued up front and whose watch
/// streams are fed by the test.
///
/// Once the probe queue is exhausted, further one-shot requests never
/// resolve, so the caller's timeout decides the outcome.
pub struct ScriptedDevice {
    supported: bool,
    probes: Mutex<VecDeque<(Duration, Fix)>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Fix>>>,
    probe_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    last_options: Mutex<Option<AcquisitionOptions>>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self {
            supported: true,
            probes: Mutex::new(VecDeque::new()),
            watchers: Mutex::new(Vec::new()),
            probe_calls: AtomicUsize::new(0),
            watch_calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Queue an immediate one-shot answer.
    pub fn push_probe(&self, fix: Fix) -> &Self {
        self.push_probe_after(Duration::ZERO, fix)
    }

    /// Queue a one-shot answer delivered after `delay`.
    pub fn push_probe_after(&self, delay: Duration, fix: Fix) -> &Self {
        self.probes.lock().push_back((delay, fix));
        self
    }

    /// Deliver an item to every open watch stream. Returns how many received it.
    pub fn push_watch(&self, fix: Fix) -> usize {
        let mut watchers = self.watchers.lock();
        watchers.retain(|tx| !tx.is_closed());
        watchers
            .iter()
            .filter(|tx| tx.send(fix.clone()).is_ok())
            .count()
    }

    /// Watch streams whose consumer is still alive.
    pub fn active_watchers(&self) -> usize {
        let mut watchers = self.watchers.lock();
        watchers.retain(|tx| !tx.is_closed());
        watchers.len()
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<AcquisitionOptions> {
        *self.last_options.lock()
    }
}

#[async_trait]
impl LocationDevice for ScriptedDevice {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn current_position(&self, options: AcquisitionOptions) -> Fix {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options);
        let next = self.probes.lock().pop_front();
        match next {
            Some((delay, fix)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                fix
            }
            None => std::future::pending().await,
        }
    }

    fn watch_position(&self, _options: AcquisitionOptions) -> PositionStream {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(tx);
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|fix| (fix, rx)) }).boxed()
    }
}
