//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Best-effort local mirror of the latest emergency result."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ems_common::CacheConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::EmergencyReport;
use crate::state::{HospitalOption, TriageAssessment};

/// File name of the mirrored result inside the cache directory.
pub const CACHE_FILE: &str = "emergency-result.json";

/// Mirrored copy of the last successful emergency submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEmergency {
    pub cached_at: DateTime<Utc>,
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

impl CachedEmergency {
    pub fn from_report(report: &EmergencyReport) -> Self {
        Self {
            cached_at: Utc::now(),
            triage: report.triage.clone(),
            location: report.location.clone(),
            hospitals: report.hospitals.clone(),
            ambulance_status: report.ambulance_status.clone(),
            doctor_status: report.doctor_status.clone(),
            expected_bill: report.expected_bill.clone(),
        }
    }
}

/// Local store for the latest emergency result. It is never read back to
/// drive state; the server copy is authoritative.
pub trait ResultCache: Send + Sync + 'static {
    fn store(&self, entry: &CachedEmergency) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileResultCache {
    path: PathBuf,
}

impl FileResultCache {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            path: directory.as_ref().join(CACHE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached entry back, if any. Used for inspection only.
    pub fn load(&self) -> Result<Option<CachedEmergency>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("opening {}", self.path.display()))
            }
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let entry = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", self.path.display()))?;
        Ok(Some(entry))
    }
}

impl ResultCache for FileResultCache {
    fn store(&self, entry: &CachedEmergency) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating cache directory {}", parent.display()))?;
            }
        }
        let file = File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&serde_json::to_vec_pretty(entry)?)?;
        writer.flush()?;
        debug!(path = %self.path.display(), "emergency result cached");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl ResultCache for DisabledCache {
    fn store(&self, _entry: &CachedEmergency) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the cache selected by configuration.
pub fn from_config(config: &CacheConfig) -> Arc<dyn ResultCache> {
    if config.enabled {
        Arc::new(FileResultCache::new(&config.directory))
    } else {
        Arc::new(DisabledCache)
    }
}

pub(crate) fn mirror(cache: &dyn ResultCache, report: &EmergencyReport) {
    if let Err(err) = cache.store(&CachedEmergency::from_report(report)) {
        warn!(error = %err, "failed to cache emergency result");
    }
}

pub(crate) fn forget(cache: &dyn ResultCache) {
    if let Err(err) = cache.clear() {
        warn!(error = %err, "failed to clear cached emergency result");
    }
}
