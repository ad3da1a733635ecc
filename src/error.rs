//! Error types for the test rig.
//!
//! `MotionError` is the single error type returned by the axis primitives,
//! the outcome race, the limit state machine and the campaign orchestrators.
//! It separates the failure classes an operator needs to tell apart:
//!
//! - **`Rejected`**: a precondition failed before any register was written
//!   (axis invalid, controller not running, busy, in error, bad velocity).
//! - **`Resolution`**: the register set of an axis could not be bound.
//! - **`Fault`** / **`LimitReached`** / **`Timeout`**: a started motion did not
//!   complete. A timeout is always preceded by an explicit stop.
//! - **`Cancelled`**: the operator aborted the campaign.
//! - **`Storage`** / **`Io`** / **`Csv`**: the result sink failed.
//!
//! `BusError` is the failure type of the register bus collaborator and is
//! wrapped by `MotionError::Bus` via `#[from]`.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the rig error type.
pub type MotionResult<T> = std::result::Result<T, MotionError>;

/// Reason a motion primitive refused to issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Registers are unbound, or the last validity check failed.
    AxisInvalid,
    /// The controller is reachable but not in its run state.
    ControllerNotRunning,
    /// The axis reports a motion in progress.
    Busy,
    /// The axis reports an error.
    InError,
    /// A velocity of zero was requested.
    ZeroVelocity,
    /// A relative move was requested with a negative velocity.
    NegativeVelocity,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::AxisInvalid => "axis is not valid",
            Rejection::ControllerNotRunning => "controller is not in run state",
            Rejection::Busy => "axis is busy",
            Rejection::InError => "axis is in error",
            Rejection::ZeroVelocity => "velocity must be non-zero",
            Rejection::NegativeVelocity => "velocity must be positive for a relative move",
        };
        f.write_str(reason)
    }
}

/// Failure reported by a register bus implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("Unknown register symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid register handle {0}")]
    InvalidHandle(u32),

    #[error("Register {path} holds {actual}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Bus not connected")]
    NotConnected,

    #[error("Bus transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum MotionError {
    #[error("Axis {axis}: command rejected, {reason}")]
    Rejected { axis: u32, reason: Rejection },

    #[error("Invalid test settings: {0}")]
    InvalidSettings(String),

    #[error("Axis {axis}: failed to resolve register {path}: {source}")]
    Resolution {
        axis: u32,
        path: String,
        #[source]
        source: BusError,
    },

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Axis {axis}: error flag raised during {context}")]
    Fault { axis: u32, context: String },

    #[error("Axis {axis}: travel limit reached during {context}")]
    LimitReached { axis: u32, context: String },

    #[error("Axis {axis}: {context} timed out after {after:?}, axis stopped")]
    Timeout {
        axis: u32,
        context: String,
        after: Duration,
    },

    #[error("Campaign cancelled by operator")]
    Cancelled,

    #[error("Outcome race failed: {0}")]
    Race(String),

    #[error("Result storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl MotionError {
    /// True for failures caused by the operator rather than the machine.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MotionError::Cancelled)
    }

    /// True when the command never reached the bus.
    pub fn is_rejection(&self) -> bool {
        matches!(self, MotionError::Rejected { .. })
    }
}

impl From<figment::Error> for MotionError {
    fn from(err: figment::Error) -> Self {
        MotionError::Config(Box::new(err))
    }
}
