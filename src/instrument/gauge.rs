//! Simulated dial gauge.
//!
//! Reads the position of a simulated axis, adds uniform noise and reports
//! the value in the gauge's own frame (offset and sign applied).

use super::MeasurementSource;
use crate::bus::SimulatedController;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Gauge pressed against a simulated axis.
pub struct SimulatedGauge {
    name: String,
    controller: Arc<SimulatedController>,
    axis: u32,
    offset: f64,
    noise: f64,
    read_time: Duration,
    connected: AtomicBool,
}

impl SimulatedGauge {
    /// Connected gauge reading `axis` with no offset and no noise.
    pub fn new(name: impl Into<String>, controller: Arc<SimulatedController>, axis: u32) -> Self {
        Self {
            name: name.into(),
            controller,
            axis,
            offset: 0.0,
            noise: 0.0,
            read_time: Duration::ZERO,
            connected: AtomicBool::new(true),
        }
    }

    /// Constant offset added to every reading.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Peak amplitude of uniform noise.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Simulated conversion time of one reading.
    pub fn with_read_time(mut self, read_time: Duration) -> Self {
        self.read_time = read_time;
        self
    }

    /// Simulate plugging or unplugging the gauge.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl MeasurementSource for SimulatedGauge {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn measure(&self) -> Result<String> {
        if !self.is_connected() {
            return Err(anyhow!("{} is not connected", self.name));
        }
        if !self.read_time.is_zero() {
            tokio::time::sleep(self.read_time).await;
        }
        let position = self
            .controller
            .axis_position(self.axis)
            .ok_or_else(|| anyhow!("axis {} is not simulated", self.axis))?;
        let noise = if self.noise > 0.0 {
            rand::thread_rng().gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        Ok(format!("{:.4}", position + self.offset + noise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedAxisConfig;

    #[tokio::test]
    async fn reading_tracks_axis_position() {
        let sim = Arc::new(SimulatedController::new().with_axis(1, SimulatedAxisConfig::default()));
        sim.place_axis(1, 4.25);
        let gauge = SimulatedGauge::new("Dial", sim, 1).with_offset(-0.25);
        assert_eq!(gauge.measure().await.unwrap(), "4.0000");
    }

    #[tokio::test]
    async fn disconnected_gauge_fails() {
        let sim = Arc::new(SimulatedController::new().with_axis(1, SimulatedAxisConfig::default()));
        let gauge = SimulatedGauge::new("Dial", sim, 1);
        gauge.set_connected(false);
        assert!(gauge.measure().await.is_err());
    }
}
