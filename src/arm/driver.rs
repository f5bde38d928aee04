// Mode-dependent dispatch of operator actions onto the serial channel
//
// Owns the current operating mode and the commanded/observed joint state.
// Every recognized action resolves to exactly one protocol frame; anything
// else is an explicit no-op that writes nothing to the wire.

use std::io::{Read, Write};

use tracing::{debug, info};

use super::channel::TransactionChannel;
use super::protocol::{ArmError, Command, Direction, Grip, Result, Stick, Telemetry};
use super::units::EncoderCalibration;

/// Operator action-code bytes (second byte of every operator message).
///
/// Presses are uppercase, releases lowercase where both exist. Shared with
/// the teleop publisher so both ends agree on the vocabulary.
pub mod action {
    pub const LEFT_STICK_LEFT: u8 = b'L';
    pub const LEFT_STICK_RIGHT: u8 = b'R';
    pub const LEFT_STICK_RELEASE: u8 = b'l';
    pub const RIGHT_STICK_UP: u8 = b'U';
    pub const RIGHT_STICK_DOWN: u8 = b'D';
    pub const RIGHT_STICK_RELEASE: u8 = b'r';
    pub const BUTTON_A: u8 = b'A';
    pub const BUTTON_B: u8 = b'B';
    pub const BUTTON_X: u8 = b'X';
    pub const BUTTON_Y: u8 = b'Y';
    pub const BUTTON_A_RELEASE: u8 = b'a';
    pub const BUTTON_B_RELEASE: u8 = b'b';
    pub const BUTTON_X_RELEASE: u8 = b'x';
    pub const BUTTON_Y_RELEASE: u8 = b'y';
    pub const TRIGGER_LEFT: u8 = b'T';
    pub const TRIGGER_RIGHT: u8 = b'G';
    pub const TRIGGER_LEFT_RELEASE: u8 = b't';
    pub const TRIGGER_RIGHT_RELEASE: u8 = b'g';
    pub const DPAD_UP: u8 = b'+';
    pub const DPAD_DOWN: u8 = b'-';
    pub const DPAD_LEFT: u8 = b'O';
    pub const DPAD_RIGHT: u8 = b'C';
    pub const DPAD_RELEASE: u8 = b'o';
    pub const HOME: u8 = b'H';
}

/// Mode selector bytes (first byte of every operator message).
pub mod mode {
    pub const JOINT: u8 = b'J';
    pub const CARTESIAN: u8 = b'C';
    pub const DRILL: u8 = b'D';
}

/// Interpretation context for operator action codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Joint,
    Cartesian,
    Drill,
}

impl OperatingMode {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            mode::JOINT => Some(OperatingMode::Joint),
            mode::CARTESIAN => Some(OperatingMode::Cartesian),
            mode::DRILL => Some(OperatingMode::Drill),
            _ => None,
        }
    }
}

/// Outcome of dispatching one operator message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A frame went out; `observed_updated` marks a fresh joint-position reply
    Sent { observed_updated: bool },
    /// Unrecognized or truncated message; nothing written to the wire
    Ignored,
}

/// High-level arm driver: operator messages in, protocol transactions out.
pub struct ArmDriver<T> {
    channel: TransactionChannel<T>,
    calib: EncoderCalibration,
    current_mode: OperatingMode,
    commanded_deg: Vec<f64>,
    commanded_steps: Vec<i32>,
    observed_steps: Vec<i32>,
    observed_deg: Vec<f64>,
}

impl<T: Read + Write> ArmDriver<T> {
    pub fn new(channel: TransactionChannel<T>, calib: EncoderCalibration) -> Self {
        let joints = calib.joints();
        Self {
            channel,
            calib,
            current_mode: OperatingMode::Joint,
            commanded_deg: vec![0.0; joints],
            commanded_steps: vec![0; joints],
            observed_steps: vec![0; joints],
            observed_deg: vec![0.0; joints],
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.current_mode
    }

    /// Latest observed joint angles in degrees, index-aligned to joints.
    pub fn observed_degrees(&self) -> &[f64] {
        &self.observed_deg
    }

    /// Latest observed encoder step counts.
    pub fn observed_steps(&self) -> &[i32] {
        &self.observed_steps
    }

    /// Latest commanded joint angles in degrees.
    pub fn commanded_degrees(&self) -> &[f64] {
        &self.commanded_deg
    }

    /// Latest commanded encoder step counts.
    pub fn commanded_steps(&self) -> &[i32] {
        &self.commanded_steps
    }

    /// Dispatch one operator message: byte 0 selects the mode, byte 1 the
    /// action within it. The selected mode persists for later messages.
    pub fn handle_action(&mut self, msg: &str) -> Result<Dispatch> {
        let bytes = msg.as_bytes();
        let (mode_byte, action_byte) = match (bytes.first(), bytes.get(1)) {
            (Some(m), Some(a)) => (*m, *a),
            _ => {
                debug!("ignoring truncated operator message {msg:?}");
                return Ok(Dispatch::Ignored);
            }
        };
        let Some(selected) = OperatingMode::from_byte(mode_byte) else {
            debug!("ignoring unknown mode byte {:?}", mode_byte as char);
            return Ok(Dispatch::Ignored);
        };
        self.current_mode = selected;

        match resolve(self.current_mode, action_byte) {
            Some(cmd) => {
                let observed_updated = self.transact(cmd)?;
                Ok(Dispatch::Sent { observed_updated })
            }
            None => {
                debug!(
                    "ignoring unmapped action {:?} in {:?} mode",
                    action_byte as char, self.current_mode
                );
                Ok(Dispatch::Ignored)
            }
        }
    }

    /// Send a full multi-joint position target (degrees) and fold the
    /// reply into observed state.
    pub fn command_position(&mut self, degrees: &[f64]) -> Result<bool> {
        let steps = self.calib.degrees_to_steps(degrees)?;
        self.commanded_deg.copy_from_slice(degrees);
        self.commanded_steps.copy_from_slice(&steps);
        self.transact(Command::MultiJointTarget(steps))
    }

    /// Request feedback: end-effector status every call, joint positions
    /// only while in Joint mode. A busy channel skips the poll entirely;
    /// feedback is best-effort.
    pub fn poll_feedback(&mut self) -> Result<bool> {
        let mut updated = false;
        match self.transact(Command::RequestEndEffectorFeedback) {
            Ok(u) => updated |= u,
            Err(ArmError::ChannelBusy) => {
                debug!("feedback poll skipped, transaction in flight");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        if self.current_mode == OperatingMode::Joint {
            match self.transact(Command::RequestJointFeedback) {
                Ok(u) => updated |= u,
                Err(ArmError::ChannelBusy) => {
                    debug!("joint feedback skipped, transaction in flight")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    }

    /// Run one transaction and apply whatever telemetry it returns.
    /// Returns whether observed joint state changed.
    fn transact(&mut self, cmd: Command) -> Result<bool> {
        match self.channel.transact(&cmd)? {
            Some(Telemetry::JointPositions(steps)) => {
                // convert before mutating anything: a bad frame must not
                // leave half-updated state behind
                let degrees = self.calib.steps_to_degrees(&steps)?;
                self.observed_steps = steps;
                self.observed_deg = degrees;
                Ok(true)
            }
            Some(Telemetry::EndEffector(status)) => {
                info!("end effector: {status}");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

/// Total (mode, action) lookup. `None` means "ignored, no frame sent".
pub fn resolve(current: OperatingMode, code: u8) -> Option<Command> {
    match current {
        OperatingMode::Joint => resolve_joint(code),
        OperatingMode::Cartesian => resolve_cartesian(code),
        OperatingMode::Drill => resolve_drill(code),
    }
}

fn resolve_joint(code: u8) -> Option<Command> {
    let cmd = match code {
        action::LEFT_STICK_LEFT => Command::JointMove {
            stick: Stick::Left,
            dir: Direction::Left,
        },
        action::LEFT_STICK_RIGHT => Command::JointMove {
            stick: Stick::Left,
            dir: Direction::Right,
        },
        action::RIGHT_STICK_UP => Command::JointMove {
            stick: Stick::Right,
            dir: Direction::Up,
        },
        action::RIGHT_STICK_DOWN => Command::JointMove {
            stick: Stick::Right,
            dir: Direction::Down,
        },
        action::BUTTON_A => Command::JointMove {
            stick: Stick::Wrist,
            dir: Direction::Up,
        },
        action::BUTTON_B => Command::JointMove {
            stick: Stick::Wrist,
            dir: Direction::Left,
        },
        action::BUTTON_X => Command::JointMove {
            stick: Stick::Wrist,
            dir: Direction::Right,
        },
        action::BUTTON_Y => Command::JointMove {
            stick: Stick::Wrist,
            dir: Direction::Down,
        },
        action::TRIGGER_LEFT => Command::ChangeAxis {
            dir: Direction::Down,
        },
        action::TRIGGER_RIGHT => Command::ChangeAxis { dir: Direction::Up },
        action::LEFT_STICK_RELEASE => Command::ReleaseAxis {
            stick: Stick::Left,
            dir: None,
        },
        action::RIGHT_STICK_RELEASE => Command::ReleaseAxis {
            stick: Stick::Right,
            dir: None,
        },
        action::BUTTON_A_RELEASE => Command::ReleaseAxis {
            stick: Stick::Wrist,
            dir: Some(Direction::Up),
        },
        action::BUTTON_B_RELEASE => Command::ReleaseAxis {
            stick: Stick::Wrist,
            dir: Some(Direction::Left),
        },
        action::BUTTON_X_RELEASE => Command::ReleaseAxis {
            stick: Stick::Wrist,
            dir: Some(Direction::Right),
        },
        action::BUTTON_Y_RELEASE => Command::ReleaseAxis {
            stick: Stick::Wrist,
            dir: Some(Direction::Down),
        },
        action::DPAD_UP => Command::ChangeSpeed { dir: Direction::Up },
        action::DPAD_DOWN => Command::ChangeSpeed {
            dir: Direction::Down,
        },
        action::DPAD_LEFT => Command::EndEffector { grip: Grip::Open },
        action::DPAD_RIGHT => Command::EndEffector { grip: Grip::Close },
        action::DPAD_RELEASE => Command::EndEffectorRelease,
        action::HOME => Command::Home,
        _ => return None,
    };
    Some(cmd)
}

fn resolve_cartesian(code: u8) -> Option<Command> {
    // positional motion arrives via command_position, not action dispatch
    let cmd = match code {
        action::DPAD_LEFT => Command::EndEffector { grip: Grip::Open },
        action::DPAD_RIGHT => Command::EndEffector { grip: Grip::Close },
        action::DPAD_RELEASE => Command::EndEffectorRelease,
        _ => return None,
    };
    Some(cmd)
}

fn resolve_drill(code: u8) -> Option<Command> {
    let cmd = match code {
        action::BUTTON_A_RELEASE => Command::PrepareDrilling,
        action::BUTTON_B_RELEASE => Command::CollectSample,
        action::BUTTON_X_RELEASE => Command::DepositSample,
        action::TRIGGER_LEFT => Command::ManualDrill {
            dir: Direction::Left,
        },
        action::TRIGGER_RIGHT => Command::ManualDrill {
            dir: Direction::Right,
        },
        action::TRIGGER_LEFT_RELEASE | action::TRIGGER_RIGHT_RELEASE => Command::ReleaseDrill,
        _ => return None,
    };
    Some(cmd)
}
