//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Recording presenter and in-memory result caches."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use ems_intake::{CachedEmergency, Notice, Presenter, ResultCache, Step, ToastKind};
use parking_lot::Mutex;

/// Presenter that keeps every notice for later assertions.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }

    pub fn toasts(&self) -> Vec<(ToastKind, String)> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Toast { kind, message } => Some((*kind, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn has_toast(&self, kind: ToastKind, needle: &str) -> bool {
        self.toasts()
            .iter()
            .any(|(k, message)| *k == kind && message.contains(needle))
    }

    pub fn steps(&self) -> Vec<Step> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::StepChanged(step) => Some(*step),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entry: Mutex<Option<CachedEmergency>>,
    stores: Mutex<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<CachedEmergency> {
        self.entry.lock().clone()
    }

    pub fn stores(&self) -> usize {
        *self.stores.lock()
    }
}

impl ResultCache for MemoryCache {
    fn store(&self, entry: &CachedEmergency) -> Result<()> {
        *self.entry.lock() = Some(entry.clone());
        *self.stores.lock() += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.entry.lock() = None;
        Ok(())
    }
}

/// Cache whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingCache;

impl ResultCache for FailingCache {
    fn store(&self, _entry: &CachedEmergency) -> Result<()> {
        Err(anyhow!("cache storage unavailable"))
    }

    fn clear(&self) -> Result<()> {
        Err(anyhow!("cache storage unavailable"))
    }
}
