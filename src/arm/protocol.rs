// ASCII line protocol spoken by the arm MCU
//
// Outgoing commands are newline-terminated opcode lines ("JMMLL\n",
// "MTA5B-3C0\n"). Telemetry replies are label-tagged integer records
// closed by the 'Z' terminator ("JPA120B-45C0D300E75F10Z").

/// Error type for arm communication and conversion
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Joint vector length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Transaction already in flight")]
    ChannelBusy,

    #[error("Receive with no request in flight")]
    NoPendingRequest,

    #[error("Malformed telemetry frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Timed out waiting for telemetry terminator")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ArmError>;

/// Terminator byte closing every telemetry record
pub const TERMINATOR: u8 = b'Z';

/// Frame kind prefixes on inbound telemetry
const KIND_JOINT_POSITIONS: &str = "JP";
const KIND_END_EFFECTOR: &str = "EE";

/// Placeholder written where a released axis carries no direction
const DIR_NONE: char = 'X';

/// Direction payload character shared by jog, axis, and drill commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn wire(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }
}

/// Joystick/axis group selector for joint-space jog moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    Left,
    Right,
    Wrist,
}

impl Stick {
    fn wire(self) -> char {
        match self {
            Stick::Left => 'L',
            Stick::Right => 'R',
            Stick::Wrist => 'W',
        }
    }
}

/// Gripper motion for end-effector commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grip {
    Open,
    Close,
}

impl Grip {
    fn wire(self) -> char {
        match self {
            Grip::Open => 'O',
            Grip::Close => 'C',
        }
    }
}

/// One outgoing command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Jog the selected axis pair of a joystick group
    JointMove { stick: Stick, dir: Direction },
    /// Cycle the active axis selection up or down
    ChangeAxis { dir: Direction },
    /// Release a held joystick or wrist button
    ReleaseAxis {
        stick: Stick,
        dir: Option<Direction>,
    },
    /// Step the jog speed up or down
    ChangeSpeed { dir: Direction },
    EndEffector { grip: Grip },
    EndEffectorRelease,
    PrepareDrilling,
    CollectSample,
    DepositSample,
    ManualDrill { dir: Direction },
    ReleaseDrill,
    Home,
    /// Absolute multi-joint target in encoder steps
    MultiJointTarget(Vec<i32>),
    /// Cartesian-path multi-joint target in encoder steps
    CartesianTarget(Vec<i32>),
    RequestEndEffectorFeedback,
    RequestJointFeedback,
}

impl Command {
    /// Render the command as a newline-terminated protocol line.
    pub fn encode(&self) -> String {
        match self {
            Command::JointMove { stick, dir } => format!("JMM{}{}\n", stick.wire(), dir.wire()),
            Command::ChangeAxis { dir } => format!("JMA{}\n", dir.wire()),
            Command::ReleaseAxis { stick, dir } => format!(
                "JMR{}{}\n",
                stick.wire(),
                dir.map_or(DIR_NONE, Direction::wire)
            ),
            Command::ChangeSpeed { dir } => format!("JMS{}\n", dir.wire()),
            Command::EndEffector { grip } => format!("EE{}\n", grip.wire()),
            Command::EndEffectorRelease => "EER\n".to_string(),
            Command::PrepareDrilling => "DMP\n".to_string(),
            Command::CollectSample => "DMC\n".to_string(),
            Command::DepositSample => "DMD\n".to_string(),
            Command::ManualDrill { dir } => format!("DMM{}\n", dir.wire()),
            Command::ReleaseDrill => "DMMX\n".to_string(),
            Command::Home => "HM\n".to_string(),
            Command::MultiJointTarget(steps) => encode_target("MT", steps),
            Command::CartesianTarget(steps) => encode_target("CM", steps),
            Command::RequestEndEffectorFeedback => "FBE\n".to_string(),
            Command::RequestJointFeedback => "FBJ\n".to_string(),
        }
    }

    /// Whether the MCU answers this command with a telemetry frame.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Command::JointMove { .. }
                | Command::Home
                | Command::MultiJointTarget(_)
                | Command::CartesianTarget(_)
                | Command::RequestEndEffectorFeedback
                | Command::RequestJointFeedback
        )
    }
}

/// Multi-joint payload: per joint, the axis label 'A' + index immediately
/// followed by the decimal step count, no separators between joints.
fn encode_target(opcode: &str, steps: &[i32]) -> String {
    let mut line = String::from(opcode);
    for (i, step) in steps.iter().enumerate() {
        line.push((b'A' + i as u8) as char);
        line.push_str(&step.to_string());
    }
    line.push('\n');
    line
}

/// One decoded telemetry frame
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// Encoder step counts for every joint, in joint order
    JointPositions(Vec<i32>),
    /// End-effector status text, passed through unparsed
    EndEffector(String),
}

/// Decode a Z-terminated telemetry line for an arm with `joints` joints.
pub fn decode_telemetry(line: &str, joints: usize) -> Result<Telemetry> {
    let kind = line
        .get(..2)
        .ok_or_else(|| malformed("frame shorter than kind prefix"))?;
    match kind {
        KIND_JOINT_POSITIONS => decode_joint_positions(line.as_bytes(), joints),
        KIND_END_EFFECTOR => {
            let body = &line[2..];
            let text = body.strip_suffix(TERMINATOR as char).unwrap_or(body);
            Ok(Telemetry::EndEffector(text.to_string()))
        }
        other => Err(malformed(&format!("unrecognized frame kind {other:?}"))),
    }
}

/// Single forward scan: record where each expected label first occurs,
/// then validate every label is present and in order before extracting
/// any field. A missing label is a decode error, never joint index 0.
fn decode_joint_positions(line: &[u8], joints: usize) -> Result<Telemetry> {
    let body = &line[2..];

    // Slot per joint label 'A' + i, plus one for the 'Z' terminator
    let mut found: Vec<Option<usize>> = vec![None; joints + 1];
    for (idx, &byte) in body.iter().enumerate() {
        let slot = if byte == TERMINATOR {
            joints
        } else if byte.is_ascii_uppercase() && ((byte - b'A') as usize) < joints {
            (byte - b'A') as usize
        } else {
            continue;
        };
        if found[slot].is_none() {
            found[slot] = Some(idx);
        }
    }

    let mut label_at = Vec::with_capacity(joints + 1);
    for (i, pos) in found.iter().enumerate() {
        match pos {
            Some(p) => label_at.push(*p),
            None => return Err(malformed(&format!("missing label {}", label(i, joints)))),
        }
    }
    if !label_at.windows(2).all(|pair| pair[0] < pair[1]) {
        return Err(malformed("labels out of order"));
    }

    let mut steps = Vec::with_capacity(joints);
    for i in 0..joints {
        let field = &body[label_at[i] + 1..label_at[i + 1]];
        let value = std::str::from_utf8(field)
            .ok()
            .and_then(|f| f.parse::<i32>().ok())
            .ok_or_else(|| {
                malformed(&format!(
                    "field {} is not an integer: {:?}",
                    label(i, joints),
                    String::from_utf8_lossy(field)
                ))
            })?;
        steps.push(value);
    }
    Ok(Telemetry::JointPositions(steps))
}

fn label(slot: usize, joints: usize) -> char {
    if slot == joints {
        TERMINATOR as char
    } else {
        (b'A' + slot as u8) as char
    }
}

fn malformed(reason: &str) -> ArmError {
    ArmError::MalformedFrame {
        reason: reason.to_string(),
    }
}
