// Serial smoke test: talks to the arm MCU directly, without zenoh.
//
// Usage: cargo run --example serial_check -- [port]
// Example: cargo run --example serial_check -- /dev/ttyACM0
//
// Safety features:
// - Read-only feedback requests first
// - Explicit confirmation before anything that moves the arm
// - Easy abort with Ctrl+C

use std::io::{self, Write};
use std::time::Duration;

use arm_zenoh_runtime::arm::protocol::{Command, Direction, Stick, Telemetry};
use arm_zenoh_runtime::arm::{EncoderCalibration, TransactionChannel};
use arm_zenoh_runtime::config::{
    BAUD_RATE, ENCODER_PPR, GEAR_REDUCTIONS, NUM_JOINTS, QUADRATURE, READ_TIMEOUT_MS,
};

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyACM0".to_string());

    println!("Arm serial smoke test");
    println!("Serial port: {}", port);
    println!();

    let calib = EncoderCalibration::new(&GEAR_REDUCTIONS, ENCODER_PPR, QUADRATURE)?;
    let mut chan = TransactionChannel::open(
        &port,
        BAUD_RATE,
        Duration::from_millis(READ_TIMEOUT_MS),
        NUM_JOINTS,
    )?;
    println!("✓ Connected");
    println!();

    // ========== STEP 1: End-effector feedback (read-only) ==========
    println!("Step 1: Requesting end-effector feedback...");
    match chan.transact(&Command::RequestEndEffectorFeedback)? {
        Some(Telemetry::EndEffector(status)) => println!("  ✓ End effector: {}", status),
        other => println!("  ? Unexpected reply: {:?}", other),
    }
    println!();

    // ========== STEP 2: Joint feedback (read-only) ==========
    println!("Step 2: Requesting joint positions...");
    match chan.transact(&Command::RequestJointFeedback)? {
        Some(Telemetry::JointPositions(steps)) => {
            let degrees = calib.steps_to_degrees(&steps)?;
            for (i, (st, deg)) in steps.iter().zip(&degrees).enumerate() {
                println!("  Joint {}: {} steps = {:.2}°", i, st, deg);
            }
        }
        other => println!("  ? Unexpected reply: {:?}", other),
    }
    println!();

    // ========== STEP 3: Small jog (moves the arm!) ==========
    println!("Step 3: Jog the left-stick axis one increment left.");
    println!("  ⚠  This WILL move the arm. Make sure its workspace is clear!");
    if !confirm("Proceed with the jog?") {
        println!("Skipped.");
        return Ok(());
    }
    let reply = chan.transact(&Command::JointMove {
        stick: Stick::Left,
        dir: Direction::Left,
    })?;
    if let Some(Telemetry::JointPositions(steps)) = reply {
        println!("  ✓ Joints now at {:?} steps", steps);
    }
    chan.transact(&Command::ReleaseAxis {
        stick: Stick::Left,
        dir: None,
    })?;
    println!();

    // ========== STEP 4: Homing ==========
    println!("Step 4: Home the arm (full homing motion).");
    if !confirm("Proceed with homing?") {
        println!("Skipped.");
        return Ok(());
    }
    match chan.transact(&Command::Home)? {
        Some(Telemetry::JointPositions(steps)) => {
            println!("  ✓ Homed; joints at {:?} steps", steps)
        }
        other => println!("  ? Unexpected reply: {:?}", other),
    }

    println!();
    println!("Smoke test complete. You can now run the full runtime with: cargo run");

    Ok(())
}
