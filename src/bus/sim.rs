//! Simulated Motion Controller
//!
//! An in-memory [`RegisterBus`] exposing the standard axis register block for
//! a configurable set of axes. Kinematics are evaluated lazily from
//! `tokio::time::Instant` whenever a register is touched, so there is no
//! background task to manage.
//!
//! Behaviour modelled:
//! - absolute, relative and velocity moves at the commanded speed
//! - soft travel limits that stop motion and clear `bFwEnabled`/`bBwEnabled`
//! - execute/halt/reset edges, drive enable
//! - run-state and connection toggling, fault and stall injection
//! - per-register write counters and a global read counter
//!
//! # Example
//!
//! ```rust,ignore
//! let sim = Arc::new(SimulatedController::new().with_axis(1, SimulatedAxisConfig::default()));
//! let axis = Axis::bind(1, sim.clone(), AxisTiming::default()).await;
//! axis.move_absolute(5.0, 20.0).await?;
//! assert_eq!(sim.write_count(1, AxisField::Execute), 1);
//! ```

use super::{RegisterBus, RegisterHandle, RegisterValue};
use crate::axis::{AxisField, MotionCommand};
use crate::error::BusError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

const POSITION_EPSILON: f64 = 1e-9;

/// Travel range and start position of a simulated axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedAxisConfig {
    /// Position at which the backward limit switch trips
    #[serde(default = "default_low_limit")]
    pub low_limit: f64,
    /// Position at which the forward limit switch trips
    #[serde(default = "default_high_limit")]
    pub high_limit: f64,
    /// Position at power-up
    #[serde(default)]
    pub initial_position: f64,
}

fn default_low_limit() -> f64 {
    -100.0
}

fn default_high_limit() -> f64 {
    100.0
}

impl Default for SimulatedAxisConfig {
    fn default() -> Self {
        Self {
            low_limit: default_low_limit(),
            high_limit: default_high_limit(),
            initial_position: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    origin: f64,
    started: Instant,
    velocity: f64,
    end: Option<f64>,
}

#[derive(Debug)]
struct SimAxis {
    config: SimulatedAxisConfig,
    position: f64,
    motion: Option<Motion>,
    command: u8,
    velocity: f64,
    target: f64,
    done: bool,
    busy: bool,
    error: bool,
    enabled: bool,
    stalled: bool,
}

impl SimAxis {
    fn new(config: SimulatedAxisConfig) -> Self {
        Self {
            position: config
                .initial_position
                .clamp(config.low_limit, config.high_limit),
            config,
            motion: None,
            command: MotionCommand::MoveAbsolute.code(),
            velocity: 0.0,
            target: 0.0,
            done: false,
            busy: false,
            error: false,
            enabled: true,
            stalled: false,
        }
    }

    fn advance(&mut self, now: Instant) {
        let Some(motion) = self.motion else {
            return;
        };
        let elapsed = now.saturating_duration_since(motion.started).as_secs_f64();
        let raw = motion.origin + motion.velocity * elapsed;
        let (low, high) = (self.config.low_limit, self.config.high_limit);

        if let Some(end) = motion.end {
            let reached = if motion.velocity >= 0.0 {
                raw >= end
            } else {
                raw <= end
            };
            if reached && end > low && end < high {
                self.position = end;
                self.finish(true);
                return;
            }
        }

        if motion.velocity > 0.0 && raw >= high {
            self.position = high;
            self.finish(false);
        } else if motion.velocity < 0.0 && raw <= low {
            self.position = low;
            self.finish(false);
        } else {
            self.position = raw;
        }
    }

    fn finish(&mut self, done: bool) {
        self.motion = None;
        self.busy = false;
        self.done = done;
    }

    fn execute(&mut self, now: Instant) {
        self.advance(now);
        if self.error || !self.enabled {
            self.error = true;
            self.motion = None;
            self.busy = false;
            return;
        }
        self.done = false;

        let speed = self.velocity.abs();
        let end = match MotionCommand::from_code(self.command) {
            Some(MotionCommand::MoveAbsolute) => Some(self.target),
            Some(MotionCommand::MoveRelative) => Some(self.position + self.target),
            Some(MotionCommand::MoveVelocity) => None,
            None => {
                self.error = true;
                return;
            }
        };
        if speed == 0.0 {
            self.error = true;
            return;
        }
        if self.stalled {
            self.busy = true;
            return;
        }

        let velocity = match end {
            Some(end) if (end - self.position).abs() < POSITION_EPSILON => {
                self.done = true;
                return;
            }
            Some(end) => speed.copysign(end - self.position),
            None => self.velocity,
        };
        self.busy = true;
        self.motion = Some(Motion {
            origin: self.position,
            started: now,
            velocity,
            end,
        });
    }

    fn halt(&mut self, now: Instant) {
        self.advance(now);
        self.motion = None;
        self.busy = false;
    }

    fn read(&self, field: AxisField) -> RegisterValue {
        use RegisterValue::{Bool, Byte, Real};
        match field {
            AxisField::Command => Byte(self.command),
            AxisField::Velocity => Real(self.velocity),
            AxisField::Position => Real(self.target),
            AxisField::Execute | AxisField::Halt | AxisField::Reset => Bool(false),
            AxisField::Enable | AxisField::Enabled => Bool(self.enabled),
            AxisField::ActualPosition => Real(self.position),
            AxisField::Done => Bool(self.done),
            AxisField::Busy => Bool(self.busy),
            AxisField::Error => Bool(self.error),
            AxisField::ForwardEnabled => Bool(self.position < self.config.high_limit),
            AxisField::BackwardEnabled => Bool(self.position > self.config.low_limit),
        }
    }
}

struct Symbol {
    axis: u32,
    field: AxisField,
    path: String,
}

/// In-memory motion controller.
pub struct SimulatedController {
    symbols: HashMap<String, RegisterHandle>,
    table: Vec<Symbol>,
    axes: Mutex<HashMap<u32, SimAxis>>,
    running: AtomicBool,
    connected: AtomicBool,
    latency: Duration,
    writes: Mutex<HashMap<(u32, AxisField), usize>>,
    reads: AtomicUsize,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedController {
    /// Create a running, connected controller without axes.
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            table: Vec::new(),
            axes: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
            connected: AtomicBool::new(true),
            latency: Duration::ZERO,
            writes: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Add an axis block with the given id.
    pub fn with_axis(mut self, axis: u32, config: SimulatedAxisConfig) -> Self {
        for field in AxisField::ALL {
            let path = field.path(axis);
            let handle = RegisterHandle(self.table.len() as u32);
            self.symbols.insert(path.clone(), handle);
            self.table.push(Symbol { axis, field, path });
        }
        self.axes.get_mut().insert(axis, SimAxis::new(config));
        self
    }

    /// Simulated delay of every bus round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Toggle the controller run state reported by `is_running`.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Simulate a lost connection; every call fails with `NotConnected`.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Raise the error flag and stop any motion.
    pub fn inject_fault(&self, axis: u32) {
        self.with_sim_axis(axis, |sim, now| {
            sim.halt(now);
            sim.error = true;
        });
    }

    /// Accept motion commands without ever moving or completing them.
    pub fn set_stalled(&self, axis: u32, stalled: bool) {
        self.with_sim_axis(axis, |sim, now| {
            sim.advance(now);
            sim.stalled = stalled;
        });
    }

    /// Teleport an idle axis, clamped to its travel range.
    pub fn place_axis(&self, axis: u32, position: f64) {
        self.with_sim_axis(axis, |sim, now| {
            sim.halt(now);
            sim.position = position.clamp(sim.config.low_limit, sim.config.high_limit);
        });
    }

    /// Current simulated position, or `None` for an unknown axis.
    pub fn axis_position(&self, axis: u32) -> Option<f64> {
        self.with_sim_axis(axis, |sim, now| {
            sim.advance(now);
            sim.position
        })
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Number of writes that reached `field` of `axis`.
    pub fn write_count(&self, axis: u32, field: AxisField) -> usize {
        self.writes.lock().get(&(axis, field)).copied().unwrap_or(0)
    }

    /// Number of writes to any register.
    pub fn total_writes(&self) -> usize {
        self.writes.lock().values().sum()
    }

    /// Number of register reads served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Zero every counter.
    pub fn reset_counters(&self) {
        self.writes.lock().clear();
        self.reads.store(0, Ordering::SeqCst);
    }

    fn with_sim_axis<T>(&self, axis: u32, f: impl FnOnce(&mut SimAxis, Instant) -> T) -> Option<T> {
        let mut axes = self.axes.lock();
        axes.get_mut(&axis).map(|sim| f(sim, Instant::now()))
    }

    async fn round_trip(&self) -> Result<(), BusError> {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    fn symbol(&self, handle: RegisterHandle) -> Result<&Symbol, BusError> {
        self.table
            .get(handle.0 as usize)
            .ok_or(BusError::InvalidHandle(handle.0))
    }
}

fn expect_type(
    symbol: &Symbol,
    value: RegisterValue,
    expected: &'static str,
) -> Result<(), BusError> {
    if value.type_name() == expected {
        Ok(())
    } else {
        Err(BusError::TypeMismatch {
            path: symbol.path.clone(),
            expected,
            actual: value.type_name(),
        })
    }
}

#[async_trait]
impl RegisterBus for SimulatedController {
    async fn resolve(&self, path: &str) -> Result<RegisterHandle, BusError> {
        self.round_trip().await?;
        self.symbols
            .get(path)
            .copied()
            .ok_or_else(|| BusError::UnknownSymbol(path.to_string()))
    }

    async fn read(&self, handle: RegisterHandle) -> Result<RegisterValue, BusError> {
        self.round_trip().await?;
        let symbol = self.symbol(handle)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.with_sim_axis(symbol.axis, |sim, now| {
            sim.advance(now);
            sim.read(symbol.field)
        })
        .ok_or(BusError::InvalidHandle(handle.0))
    }

    async fn write(&self, handle: RegisterHandle, value: RegisterValue) -> Result<(), BusError> {
        self.round_trip().await?;
        let symbol = self.symbol(handle)?;
        *self
            .writes
            .lock()
            .entry((symbol.axis, symbol.field))
            .or_insert(0) += 1;
        trace!(path = %symbol.path, ?value, "simulated write");

        if symbol.field.is_status() {
            return Err(BusError::Transport(format!(
                "{} is a read-only status register",
                symbol.path
            )));
        }

        let mut axes = self.axes.lock();
        let sim = axes
            .get_mut(&symbol.axis)
            .ok_or(BusError::InvalidHandle(handle.0))?;
        let now = Instant::now();
        match (symbol.field, value) {
            (AxisField::Command, RegisterValue::Byte(code)) => sim.command = code,
            (AxisField::Velocity, RegisterValue::Real(v)) => sim.velocity = v,
            (AxisField::Position, RegisterValue::Real(p)) => sim.target = p,
            (AxisField::Execute, RegisterValue::Bool(edge)) => {
                if edge {
                    sim.execute(now);
                }
            }
            (AxisField::Halt, RegisterValue::Bool(edge)) => {
                if edge {
                    sim.halt(now);
                }
            }
            (AxisField::Reset, RegisterValue::Bool(edge)) => {
                if edge {
                    sim.error = false;
                }
            }
            (AxisField::Enable, RegisterValue::Bool(enable)) => {
                if !enable {
                    sim.halt(now);
                }
                sim.enabled = enable;
            }
            (AxisField::Command, other) => return expect_type(symbol, other, "byte"),
            (AxisField::Velocity | AxisField::Position, other) => {
                return expect_type(symbol, other, "real")
            }
            (_, other) => return expect_type(symbol, other, "bool"),
        }
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, BusError> {
        self.round_trip().await?;
        Ok(self.running.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> SimulatedController {
        SimulatedController::new().with_axis(
            1,
            SimulatedAxisConfig {
                low_limit: -10.0,
                high_limit: 10.0,
                initial_position: 0.0,
            },
        )
    }

    async fn write(sim: &SimulatedController, field: AxisField, value: RegisterValue) {
        let handle = sim.resolve(&field.path(1)).await.unwrap();
        sim.write(handle, value).await.unwrap();
    }

    async fn read(sim: &SimulatedController, field: AxisField) -> RegisterValue {
        let handle = sim.resolve(&field.path(1)).await.unwrap();
        sim.read(handle).await.unwrap()
    }

    #[tokio::test]
    async fn unknown_axis_does_not_resolve() {
        let sim = controller();
        let err = sim.resolve(&AxisField::Done.path(2)).await.unwrap_err();
        assert!(matches!(err, BusError::UnknownSymbol(_)));
    }

    #[tokio::test]
    async fn absolute_move_completes_at_target() {
        let sim = controller();
        write(&sim, AxisField::Command, RegisterValue::Byte(0)).await;
        write(&sim, AxisField::Velocity, RegisterValue::Real(50.0)).await;
        write(&sim, AxisField::Position, RegisterValue::Real(2.0)).await;
        write(&sim, AxisField::Execute, RegisterValue::Bool(true)).await;

        assert_eq!(read(&sim, AxisField::Busy).await, RegisterValue::Bool(true));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(read(&sim, AxisField::Done).await, RegisterValue::Bool(true));
        assert_eq!(read(&sim, AxisField::Busy).await, RegisterValue::Bool(false));
        assert_eq!(sim.axis_position(1), Some(2.0));
    }

    #[tokio::test]
    async fn velocity_move_stops_at_limit() {
        let sim = controller();
        write(&sim, AxisField::Command, RegisterValue::Byte(3)).await;
        write(&sim, AxisField::Velocity, RegisterValue::Real(-1000.0)).await;
        write(&sim, AxisField::Execute, RegisterValue::Bool(true)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(
            read(&sim, AxisField::BackwardEnabled).await,
            RegisterValue::Bool(false)
        );
        assert_eq!(read(&sim, AxisField::Busy).await, RegisterValue::Bool(false));
        assert_eq!(sim.axis_position(1), Some(-10.0));
    }

    #[tokio::test]
    async fn status_registers_are_read_only() {
        let sim = controller();
        let handle = sim.resolve(&AxisField::Done.path(1)).await.unwrap();
        assert!(sim.write(handle, RegisterValue::Bool(true)).await.is_err());
    }

    #[tokio::test]
    async fn counters_track_writes_per_field() {
        let sim = controller();
        write(&sim, AxisField::Halt, RegisterValue::Bool(true)).await;
        write(&sim, AxisField::Halt, RegisterValue::Bool(true)).await;
        assert_eq!(sim.write_count(1, AxisField::Halt), 2);
        assert_eq!(sim.total_writes(), 2);
        sim.reset_counters();
        assert_eq!(sim.total_writes(), 0);
    }

    #[tokio::test]
    async fn disconnected_bus_fails_every_call() {
        let sim = controller();
        sim.set_connected(false);
        assert_eq!(sim.is_running().await, Err(BusError::NotConnected));
    }
}
