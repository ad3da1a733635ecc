//! Register set of one axis.
//!
//! An [`AxisChannel`] resolves every control and status symbol of an axis
//! once and then offers typed reads and writes over the bus. Each call is an
//! independent round trip; nothing is cached here.

use crate::bus::{RegisterBus, RegisterHandle, RegisterValue};
use crate::error::{MotionError, MotionResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const FIELD_COUNT: usize = 14;

/// Control and status fields of an axis block on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisField {
    /// Command code (`stControl.eCommand`)
    Command,
    /// Commanded velocity (`stControl.fVelocity`)
    Velocity,
    /// Commanded position or distance (`stControl.fPosition`)
    Position,
    /// Execute edge (`stControl.bExecute`)
    Execute,
    /// Halt edge (`stControl.bHalt`)
    Halt,
    /// Drive enable (`stControl.bEnable`)
    Enable,
    /// Error reset edge (`stControl.bReset`)
    Reset,
    /// Encoder position (`stStatus.fActPosition`)
    ActualPosition,
    /// Last command completed (`stStatus.bDone`)
    Done,
    /// Command in progress (`stStatus.bBusy`)
    Busy,
    /// Axis error (`stStatus.bError`)
    Error,
    /// Positive travel allowed (`stStatus.bFwEnabled`)
    ForwardEnabled,
    /// Negative travel allowed (`stStatus.bBwEnabled`)
    BackwardEnabled,
    /// Drive enabled feedback (`stStatus.bEnabled`)
    Enabled,
}

impl AxisField {
    /// Every field, in resolution order.
    pub const ALL: [AxisField; FIELD_COUNT] = [
        AxisField::Command,
        AxisField::Velocity,
        AxisField::Position,
        AxisField::Execute,
        AxisField::Halt,
        AxisField::Enable,
        AxisField::Reset,
        AxisField::ActualPosition,
        AxisField::Done,
        AxisField::Busy,
        AxisField::Error,
        AxisField::ForwardEnabled,
        AxisField::BackwardEnabled,
        AxisField::Enabled,
    ];

    fn symbol(self) -> (&'static str, &'static str) {
        match self {
            AxisField::Command => ("stControl", "eCommand"),
            AxisField::Velocity => ("stControl", "fVelocity"),
            AxisField::Position => ("stControl", "fPosition"),
            AxisField::Execute => ("stControl", "bExecute"),
            AxisField::Halt => ("stControl", "bHalt"),
            AxisField::Enable => ("stControl", "bEnable"),
            AxisField::Reset => ("stControl", "bReset"),
            AxisField::ActualPosition => ("stStatus", "fActPosition"),
            AxisField::Done => ("stStatus", "bDone"),
            AxisField::Busy => ("stStatus", "bBusy"),
            AxisField::Error => ("stStatus", "bError"),
            AxisField::ForwardEnabled => ("stStatus", "bFwEnabled"),
            AxisField::BackwardEnabled => ("stStatus", "bBwEnabled"),
            AxisField::Enabled => ("stStatus", "bEnabled"),
        }
    }

    /// Symbolic path of this field for the given axis.
    pub fn path(self, axis: u32) -> String {
        let (block, name) = self.symbol();
        format!("GVL.astAxes[{axis}].{block}.{name}")
    }

    /// Parse a symbolic path back into `(axis, field)`.
    pub fn parse(path: &str) -> Option<(u32, AxisField)> {
        let rest = path.strip_prefix("GVL.astAxes[")?;
        let (index, rest) = rest.split_once("].")?;
        let axis = index.parse().ok()?;
        let (block, name) = rest.split_once('.')?;
        AxisField::ALL
            .into_iter()
            .find(|field| field.symbol() == (block, name))
            .map(|field| (axis, field))
    }

    /// Whether the controller owns this field (read-only to clients).
    pub fn is_status(self) -> bool {
        self.symbol().0 == "stStatus"
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Command codes understood by the axis command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    /// Move to an absolute position
    MoveAbsolute,
    /// Move by a signed distance
    MoveRelative,
    /// Run at a signed velocity until halted or a limit is hit
    MoveVelocity,
}

impl MotionCommand {
    /// Code written to `eCommand`.
    pub fn code(self) -> u8 {
        match self {
            MotionCommand::MoveAbsolute => 0,
            MotionCommand::MoveRelative => 1,
            MotionCommand::MoveVelocity => 3,
        }
    }

    /// Inverse of [`MotionCommand::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MotionCommand::MoveAbsolute),
            1 => Some(MotionCommand::MoveRelative),
            3 => Some(MotionCommand::MoveVelocity),
            _ => None,
        }
    }
}

/// One of the two travel limit switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSwitch {
    /// High end of travel, reported through `bFwEnabled`
    Forward,
    /// Low end of travel, reported through `bBwEnabled`
    Backward,
}

impl LimitSwitch {
    /// The switch guarding travel in the direction of `delta`.
    pub fn for_direction(delta: f64) -> Self {
        if delta >= 0.0 {
            LimitSwitch::Forward
        } else {
            LimitSwitch::Backward
        }
    }

    fn field(self) -> AxisField {
        match self {
            LimitSwitch::Forward => AxisField::ForwardEnabled,
            LimitSwitch::Backward => AxisField::BackwardEnabled,
        }
    }
}

impl fmt::Display for LimitSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitSwitch::Forward => f.write_str("high limit"),
            LimitSwitch::Backward => f.write_str("low limit"),
        }
    }
}

/// Status flags of an axis, read one register at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Last command completed
    pub done: bool,
    /// Command in progress
    pub busy: bool,
    /// Axis error
    pub error: bool,
    /// Positive travel allowed
    pub forward_enabled: bool,
    /// Negative travel allowed
    pub backward_enabled: bool,
}

/// Resolved register handles for one axis.
#[derive(Clone)]
pub struct AxisChannel {
    axis: u32,
    bus: Arc<dyn RegisterBus>,
    handles: [RegisterHandle; FIELD_COUNT],
}

impl fmt::Debug for AxisChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisChannel")
            .field("axis", &self.axis)
            .finish_non_exhaustive()
    }
}

impl AxisChannel {
    /// Resolve every register of `axis`. Fails on the first unresolvable symbol.
    pub async fn resolve(axis: u32, bus: Arc<dyn RegisterBus>) -> MotionResult<Self> {
        let mut handles = [RegisterHandle(0); FIELD_COUNT];
        for field in AxisField::ALL {
            let path = field.path(axis);
            match bus.resolve(&path).await {
                Ok(handle) => handles[field.index()] = handle,
                Err(source) => {
                    warn!(axis, %path, error = %source, "register resolution failed");
                    return Err(MotionError::Resolution { axis, path, source });
                }
            }
        }
        debug!(axis, "resolved axis registers");
        Ok(Self { axis, bus, handles })
    }

    /// Axis id this channel is bound to.
    pub fn axis(&self) -> u32 {
        self.axis
    }

    async fn read(&self, field: AxisField) -> MotionResult<RegisterValue> {
        Ok(self.bus.read(self.handles[field.index()]).await?)
    }

    async fn read_flag(&self, field: AxisField) -> MotionResult<bool> {
        let value = self.read(field).await?;
        Ok(value.as_bool(&field.path(self.axis))?)
    }

    async fn write(&self, field: AxisField, value: RegisterValue) -> MotionResult<()> {
        Ok(self.bus.write(self.handles[field.index()], value).await?)
    }

    // =========================================================================
    // Status reads
    // =========================================================================

    /// `bDone`
    pub async fn done(&self) -> MotionResult<bool> {
        self.read_flag(AxisField::Done).await
    }

    /// `bBusy`
    pub async fn busy(&self) -> MotionResult<bool> {
        self.read_flag(AxisField::Busy).await
    }

    /// `bError`
    pub async fn error(&self) -> MotionResult<bool> {
        self.read_flag(AxisField::Error).await
    }

    /// `bFwEnabled`
    pub async fn forward_enabled(&self) -> MotionResult<bool> {
        self.read_flag(AxisField::ForwardEnabled).await
    }

    /// `bBwEnabled`
    pub async fn backward_enabled(&self) -> MotionResult<bool> {
        self.read_flag(AxisField::BackwardEnabled).await
    }

    /// Enabled flag of the given limit switch; false means the limit is hit.
    pub async fn limit_enabled(&self, switch: LimitSwitch) -> MotionResult<bool> {
        self.read_flag(switch.field()).await
    }

    /// `fActPosition`
    pub async fn actual_position(&self) -> MotionResult<f64> {
        let value = self.read(AxisField::ActualPosition).await?;
        Ok(value.as_real(&AxisField::ActualPosition.path(self.axis))?)
    }

    /// Read the five status flags in sequence. Not atomic.
    pub async fn status(&self) -> MotionResult<StatusSnapshot> {
        Ok(StatusSnapshot {
            done: self.done().await?,
            busy: self.busy().await?,
            error: self.error().await?,
            forward_enabled: self.forward_enabled().await?,
            backward_enabled: self.backward_enabled().await?,
        })
    }

    // =========================================================================
    // Control writes
    // =========================================================================

    /// `eCommand`
    pub async fn write_command(&self, command: MotionCommand) -> MotionResult<()> {
        self.write(AxisField::Command, RegisterValue::Byte(command.code()))
            .await
    }

    /// `fVelocity`
    pub async fn write_velocity(&self, velocity: f64) -> MotionResult<()> {
        self.write(AxisField::Velocity, RegisterValue::Real(velocity))
            .await
    }

    /// `fPosition`
    pub async fn write_position(&self, position: f64) -> MotionResult<()> {
        self.write(AxisField::Position, RegisterValue::Real(position))
            .await
    }

    /// Rising edge on `bExecute`.
    pub async fn execute(&self) -> MotionResult<()> {
        self.write(AxisField::Execute, RegisterValue::Bool(true)).await
    }

    /// Rising edge on `bHalt`.
    pub async fn halt(&self) -> MotionResult<()> {
        self.write(AxisField::Halt, RegisterValue::Bool(true)).await
    }

    /// `bEnable`
    pub async fn write_enable(&self, enable: bool) -> MotionResult<()> {
        self.write(AxisField::Enable, RegisterValue::Bool(enable)).await
    }

    /// Rising edge on `bReset`.
    pub async fn reset(&self) -> MotionResult<()> {
        self.write(AxisField::Reset, RegisterValue::Bool(true)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_axis_block_layout() {
        assert_eq!(
            AxisField::Halt.path(2),
            "GVL.astAxes[2].stControl.bHalt"
        );
        assert_eq!(
            AxisField::ForwardEnabled.path(11),
            "GVL.astAxes[11].stStatus.bFwEnabled"
        );
    }

    #[test]
    fn parse_inverts_path() {
        for field in AxisField::ALL {
            assert_eq!(AxisField::parse(&field.path(4)), Some((4, field)));
        }
        assert_eq!(AxisField::parse("GVL.astAxes[x].stStatus.bDone"), None);
        assert_eq!(AxisField::parse("GVL.astAxes[1].stStatus.bNope"), None);
    }

    #[test]
    fn command_codes() {
        assert_eq!(MotionCommand::MoveAbsolute.code(), 0);
        assert_eq!(MotionCommand::MoveRelative.code(), 1);
        assert_eq!(MotionCommand::MoveVelocity.code(), 3);
        assert_eq!(MotionCommand::from_code(2), None);
    }

    #[test]
    fn limit_for_direction() {
        assert_eq!(LimitSwitch::for_direction(0.5), LimitSwitch::Forward);
        assert_eq!(LimitSwitch::for_direction(-0.5), LimitSwitch::Backward);
    }
}
