//! # Rust Motion Test Library
//!
//! Endurance and positioning-accuracy testing of a single motorized axis on a
//! remote motion controller. The controller is reached through a
//! [`bus::RegisterBus`], a symbol-addressed register interface; every motion
//! command is a handful of register writes and every status query is a fresh
//! register read.
//!
//! ## Crate Structure
//!
//! - **`bus`**: the `RegisterBus` trait and an in-memory `SimulatedController`.
//! - **`axis`**: the `Axis` type with its resolved register channel, motion
//!   primitives, move-and-wait, and limit seeking and reversal maneuvers.
//! - **`race`**: concurrent completion detection. A set of status watchers
//!   and an optional timeout race, the first to fire wins and the others are
//!   cancelled.
//! - **`instrument`**: the `MeasurementSource` trait, the device collection
//!   sampled at each record, and a simulated gauge.
//! - **`campaign`**: the limit-cycle, unidirectional and bidirectional test
//!   campaigns, their settings, records and pause/cancel control.
//! - **`storage`**: settings snapshot and result file output (CSV or memory).
//! - **`config`**: `RigConfig` loaded with figment from TOML and environment.
//! - **`logging`**: tracing-subscriber initialisation.
//! - **`error`**: `MotionError` and its building blocks.

pub mod axis;
pub mod bus;
pub mod campaign;
pub mod config;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod race;
pub mod storage;

pub use axis::{Axis, AxisTiming, LimitSwitch};
pub use bus::{RegisterBus, SimulatedController};
pub use campaign::{CampaignControl, CampaignKind, CampaignReport, TestSettings};
pub use error::{MotionError, MotionResult};
pub use race::Outcome;
