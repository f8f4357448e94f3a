//! ---
//! ems_section: "02-location-acquisition"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Device location capability boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use async_trait::async_trait;
use ems_common::config::FixedPositionConfig;
use futures::stream::{self, BoxStream, StreamExt};

use crate::types::{AcquisitionOptions, LocationFailure, Position};

/// Stream of fixes or failures produced by a continuous subscription.
/// Dropping the stream ends the subscription.
pub type PositionStream = BoxStream<'static, Result<Position, LocationFailure>>;

/// Location capability of the host device.
#[async_trait]
pub trait LocationDevice: Send + Sync + 'static {
    /// Whether the host exposes any positioning capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Resolve a single fix, honouring `options.timeout`.
    async fn current_position(
        &self,
        options: AcquisitionOptions,
    ) -> Result<Position, LocationFailure>;

    /// Open a continuous subscription.
    ///
    /// The device owns the per-update deadline: when no fix arrives within
    /// `options.timeout` it yields `LocationFailure::timeout` and keeps the
    /// stream open. The source does not time the stream itself, since a
    /// stationary device may legitimately stay silent after its first fix.
    fn watch_position(&self, options: AcquisitionOptions) -> PositionStream;
}

/// Device that always reports the same position. Used on hosts without
/// positioning hardware where the coordinates come from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDevice {
    position: Position,
}

impl FixedDevice {
    pub fn new(position: Position) -> Self {
        Self { position }
    }

    pub fn from_config(config: &FixedPositionConfig) -> Option<Self> {
        Position::new(config.latitude, config.longitude, config.accuracy_meters).map(Self::new)
    }
}

#[async_trait]
impl LocationDevice for FixedDevice {
    async fn current_position(
        &self,
        _options: AcquisitionOptions,
    ) -> Result<Position, LocationFailure> {
        Ok(self.position)
    }

    fn watch_position(&self, _options: AcquisitionOptions) -> PositionStream {
        stream::once(futures::future::ready(Ok(self.position)))
            .chain(stream::pending())
            .boxed()
    }
}

/// Device for hosts with no positioning capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDevice;

#[async_trait]
impl LocationDevice for UnsupportedDevice {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(
        &self,
        _options: AcquisitionOptions,
    ) -> Result<Position, LocationFailure> {
        Err(LocationFailure::unsupported())
    }

    fn watch_position(&self, _options: AcquisitionOptions) -> PositionStream {
        stream::once(futures::future::ready(Err(LocationFailure::unsupported()))).boxed()
    }
}
