use clap::Parser;
use tracing_subscriber::EnvFilter;

use arm_zenoh_runtime::config::{self, ArmConfig};

/// Serial bridge between the operator bus and the arm MCU
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial device the arm MCU is attached to
    #[arg(long, default_value = config::SERIAL_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = config::BAUD_RATE)]
    baud: u32,

    /// Feedback poll frequency in Hz
    #[arg(long, default_value_t = config::FEEDBACK_HZ)]
    feedback_hz: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let cfg = ArmConfig {
        port: args.port,
        baud: args.baud,
        feedback_hz: args.feedback_hz,
        ..ArmConfig::default()
    };

    if let Err(e) = arm_zenoh_runtime::runtime::run(cfg).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
