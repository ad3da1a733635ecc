//! Register bus abstraction.
//!
//! The motion controller is reached through a key-addressed register bus:
//! every control and status field of an axis is a named symbol that must be
//! resolved to a handle once, then read or written by handle. Reads and
//! writes are independent asynchronous round trips; there is no atomicity
//! across registers.
//!
//! The transport itself lives outside this crate. `SimulatedController`
//! implements the trait in memory for tests and dry runs.

pub mod sim;

pub use sim::{SimulatedAxisConfig, SimulatedController};

use crate::error::BusError;
use async_trait::async_trait;

/// Opaque handle returned by [`RegisterBus::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterHandle(pub u32);

/// Typed register payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    /// Boolean flag (`BOOL`)
    Bool(bool),
    /// Byte-sized enumeration (`BYTE` / `USINT`)
    Byte(u8),
    /// Floating point value (`LREAL`)
    Real(f64),
}

impl RegisterValue {
    /// Name of the payload type, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            RegisterValue::Bool(_) => "bool",
            RegisterValue::Byte(_) => "byte",
            RegisterValue::Real(_) => "real",
        }
    }

    /// Interpret as a boolean flag.
    pub fn as_bool(&self, path: &str) -> Result<bool, BusError> {
        match self {
            RegisterValue::Bool(v) => Ok(*v),
            other => Err(BusError::TypeMismatch {
                path: path.to_string(),
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }

    /// Interpret as a real number. Byte registers widen losslessly.
    pub fn as_real(&self, path: &str) -> Result<f64, BusError> {
        match self {
            RegisterValue::Real(v) => Ok(*v),
            RegisterValue::Byte(v) => Ok(f64::from(*v)),
            other => Err(BusError::TypeMismatch {
                path: path.to_string(),
                expected: "real",
                actual: other.type_name(),
            }),
        }
    }
}

/// Key-addressed register transport to the motion controller.
///
/// Implementations must tolerate interleaved calls from several tasks: the
/// outcome race polls status registers concurrently and a motion primitive
/// writes its parameters concurrently.
#[async_trait]
pub trait RegisterBus: Send + Sync {
    /// Resolve a symbolic path such as `GVL.astAxes[1].stStatus.bDone`.
    async fn resolve(&self, path: &str) -> Result<RegisterHandle, BusError>;

    /// Read the current value of a register.
    async fn read(&self, handle: RegisterHandle) -> Result<RegisterValue, BusError>;

    /// Write a register and wait for the acknowledgement.
    async fn write(&self, handle: RegisterHandle, value: RegisterValue) -> Result<(), BusError>;

    /// Whether the controller program is in its run state.
    async fn is_running(&self) -> Result<bool, BusError>;
}
