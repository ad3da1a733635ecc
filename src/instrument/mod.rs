//! Measurement instruments sampled during a campaign.
//!
//! Instruments are external collaborators. Each one implements the small
//! [`MeasurementSource`] capability; decoding of the instrument's own wire
//! protocol stays inside the implementation.

pub mod gauge;

pub use gauge::SimulatedGauge;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Text recorded in place of a reading when an instrument fails.
pub const MEASUREMENT_FAILED: &str = "Measurement failed";

/// An instrument that can produce a single textual reading on demand.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Column name used in the result header.
    fn name(&self) -> &str;

    /// Whether the instrument is currently connected.
    fn is_connected(&self) -> bool;

    /// Take one reading.
    ///
    /// Implementations apply their own timeout. Multi-channel instruments
    /// join their channels with `,`.
    async fn measure(&self) -> anyhow::Result<String>;
}

/// The set of instruments attached to a test rig.
#[derive(Clone, Default)]
pub struct MeasurementDevices {
    sources: Vec<Arc<dyn MeasurementSource>>,
}

impl std::fmt::Debug for MeasurementDevices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

impl MeasurementDevices {
    /// No instruments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument; enumeration order is insertion order.
    pub fn with_source(mut self, source: Arc<dyn MeasurementSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add an instrument in place.
    pub fn push(&mut self, source: Arc<dyn MeasurementSource>) {
        self.sources.push(source);
    }

    /// Number of registered instruments, connected or not.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when no instrument is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn connected(&self) -> impl Iterator<Item = &Arc<dyn MeasurementSource>> {
        self.sources.iter().filter(|s| s.is_connected())
    }

    /// Names of the connected instruments, in enumeration order.
    pub fn connected_names(&self) -> Vec<String> {
        self.connected().map(|s| s.name().to_string()).collect()
    }

    /// Names of every registered instrument, in enumeration order.
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Freeze the instruments connected right now.
    ///
    /// A campaign samples exactly this set for its whole run, so the column
    /// count of every row stays equal to the header's.
    pub fn connected_set(&self) -> MeasurementDevices {
        MeasurementDevices {
            sources: self.connected().cloned().collect(),
        }
    }

    /// Read every registered instrument.
    ///
    /// Readings come back in enumeration order, one per instrument. A failed
    /// read or an instrument that has disconnected is replaced by
    /// [`MEASUREMENT_FAILED`].
    pub async fn sample_all(&self) -> Vec<String> {
        let reads = self.sources.iter().map(|source| async move {
            if !source.is_connected() {
                warn!(instrument = source.name(), "instrument disconnected");
                return MEASUREMENT_FAILED.to_string();
            }
            match source.measure().await {
                Ok(reading) => reading,
                Err(err) => {
                    warn!(instrument = source.name(), error = %err, "measurement failed");
                    MEASUREMENT_FAILED.to_string()
                }
            }
        });
        join_all(reads).await
    }
}
