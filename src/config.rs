// Serial link, joint calibration, topics, loop timing
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Feedback poll frequency (Hz). Deliberately non-integral so the poll
// deadline drifts against the 50 Hz loop instead of aliasing with it.
pub const FEEDBACK_HZ: f64 = 5.131;

// Zenoh topics
pub const TOPIC_CMD_ACTION: &str = "arm/cmd/action"; // operator action strings
pub const TOPIC_CMD_POSITION: &str = "arm/cmd/position"; // commanded joint angles
pub const TOPIC_OBSERVED_POSITION: &str = "arm/state/position"; // observed joint angles

// Serial link to the arm MCU
pub const SERIAL_PORT: &str = "/dev/ttyACM0";
pub const BAUD_RATE: u32 = 9600;
pub const READ_TIMEOUT_MS: u64 = 500;

// Joint calibration: steps-per-degree = reduction * ppr * quadrature / 360
pub const NUM_JOINTS: usize = 6;
pub const GEAR_REDUCTIONS: [f64; NUM_JOINTS] = [50.0, 50.0, 50.0, 25.0, 25.0, 20.0];
pub const ENCODER_PPR: f64 = 2048.0;
pub const QUADRATURE: f64 = 5.12;

/// Startup configuration, resolved once in `main` and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
    pub reductions: Vec<f64>,
    pub encoder_ppr: f64,
    pub quadrature: f64,
    pub feedback_hz: f64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            port: SERIAL_PORT.to_string(),
            baud: BAUD_RATE,
            read_timeout: Duration::from_millis(READ_TIMEOUT_MS),
            reductions: GEAR_REDUCTIONS.to_vec(),
            encoder_ppr: ENCODER_PPR,
            quadrature: QUADRATURE,
            feedback_hz: FEEDBACK_HZ,
        }
    }
}
