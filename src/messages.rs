// Message types crossing the zenoh bus

use serde::{Deserialize, Serialize};

// Joint angles in degrees, index-aligned to joint order. Used both for
// commanded targets (planners/teleop -> runtime) and observed positions
// (runtime -> bus).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmPosition {
    pub positions: Vec<f64>,
}
