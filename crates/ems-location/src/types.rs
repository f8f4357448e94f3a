//! ---
//! ems_section: "02-location-acquisition"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Position and failure model for device location."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A captured device or manually entered position. Immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters; `None` for manual entry.
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
}

impl Position {
    /// Construct a validated position. Rejects out-of-range or non-finite
    /// coordinates and negative accuracy.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: Option<f64>) -> Option<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return None;
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        if let Some(accuracy) = accuracy_meters {
            if !accuracy.is_finite() || accuracy < 0.0 {
                return None;
            }
        }
        Some(Self {
            latitude,
            longitude,
            accuracy_meters,
        })
    }

    /// Position typed in by the user; carries no accuracy.
    pub fn manual(latitude: f64, longitude: f64) -> Option<Self> {
        Self::new(latitude, longitude, None)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)?;
        if let Some(accuracy) = self.accuracy_meters {
            write!(f, "  ±{} m accuracy", accuracy.round())?;
        }
        Ok(())
    }
}

/// Failure categories reported by the device capability.
///
/// Numeric codes follow the browser geolocation API, with `0` reserved for a
/// missing capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    Unsupported,
    PermissionDenied,
    Unavailable,
    Timeout,
}

impl FailureCode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Unsupported),
            1 => Some(Self::PermissionDenied),
            2 => Some(Self::Unavailable),
            3 => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Unsupported => 0,
            Self::PermissionDenied => 1,
            Self::Unavailable => 2,
            Self::Timeout => 3,
        }
    }

    /// Terminal failures are surfaced immediately and never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::Unsupported)
    }
}

/// Device-level acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("location failure ({code:?}): {message}")]
pub struct LocationFailure {
    pub code: FailureCode,
    pub message: String,
}

impl LocationFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported() -> Self {
        Self::new(
            FailureCode::Unsupported,
            "Geolocation not supported on this device",
        )
    }

    pub fn permission_denied() -> Self {
        Self::new(FailureCode::PermissionDenied, "Permission denied")
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureCode::Timeout,
            format!("no position within {} ms", after.as_millis()),
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.code.is_terminal()
    }
}

/// Notification delivered to every subscriber of a location source.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Update(Position),
    Failed(LocationFailure),
}

/// Per-request options handed to the device capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the device may return; zero forces a fresh fix.
    pub max_cache_age: Duration,
}
