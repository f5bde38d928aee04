// Host loop bridging zenoh to the serial arm channel
//
// A single cooperative loop serializes the operator command path and the
// periodic feedback poller onto the one transaction channel: subscribers
// are drained non-blockingly each tick, so the two trigger sources are
// never concurrent senders.

use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::arm::channel::TransactionChannel;
use crate::arm::driver::{ArmDriver, Dispatch};
use crate::arm::units::EncoderCalibration;
use crate::config::{
    ArmConfig, LOOP_HZ, TOPIC_CMD_ACTION, TOPIC_CMD_POSITION, TOPIC_OBSERVED_POSITION,
};
use crate::messages::ArmPosition;

/// Arm runtime state: the dispatcher plus the feedback-poll deadline.
pub struct ArmRuntime<T> {
    driver: ArmDriver<T>,
    poll_period: Duration,
    last_poll: Instant,
}

impl<T: Read + Write> ArmRuntime<T> {
    pub fn new(driver: ArmDriver<T>, poll_period: Duration) -> Self {
        Self {
            driver,
            poll_period,
            last_poll: Instant::now(),
        }
    }

    /// Handle one operator action string. Returns fresh observed joint
    /// angles when the exchange carried a joint-position reply.
    pub fn on_operator_message(&mut self, msg: &str) -> Option<Vec<f64>> {
        match self.driver.handle_action(msg) {
            Ok(Dispatch::Sent {
                observed_updated: true,
            }) => Some(self.driver.observed_degrees().to_vec()),
            Ok(Dispatch::Sent { .. }) | Ok(Dispatch::Ignored) => None,
            Err(e) => {
                // rejected, no physical motion; the operator sees this one
                warn!("operator command {msg:?} rejected: {e}");
                None
            }
        }
    }

    /// Handle one commanded-position message (degrees).
    pub fn on_position_command(&mut self, cmd: &ArmPosition) -> Option<Vec<f64>> {
        match self.driver.command_position(&cmd.positions) {
            Ok(true) => Some(self.driver.observed_degrees().to_vec()),
            Ok(false) => None,
            Err(e) => {
                warn!("position command rejected: {e}");
                None
            }
        }
    }

    /// Run the feedback poller if its period has elapsed. Poll failures
    /// only drop that tick's update; they are not operator-visible.
    pub fn maybe_poll(&mut self, now: Instant) -> Option<Vec<f64>> {
        if now.duration_since(self.last_poll) < self.poll_period {
            return None;
        }
        self.last_poll = now;
        match self.driver.poll_feedback() {
            Ok(true) => Some(self.driver.observed_degrees().to_vec()),
            Ok(false) => None,
            Err(e) => {
                debug!("feedback poll failed: {e}");
                None
            }
        }
    }
}

pub async fn run(cfg: ArmConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Calibration or serial problems here are fatal; nothing has touched
    // the wire yet.
    let calib = EncoderCalibration::new(&cfg.reductions, cfg.encoder_ppr, cfg.quadrature)?;
    let joints = calib.joints();

    info!("Opening serial link on {} at {} baud", cfg.port, cfg.baud);
    let channel = TransactionChannel::open(&cfg.port, cfg.baud, cfg.read_timeout, joints)?;
    let driver = ArmDriver::new(channel, calib);
    let poll_period = Duration::from_secs_f64(1.0 / cfg.feedback_hz);
    let mut runtime = ArmRuntime::new(driver, poll_period);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_action = session.declare_subscriber(TOPIC_CMD_ACTION).await?;
    let sub_position = session.declare_subscriber(TOPIC_CMD_POSITION).await?;
    let pub_observed = session.declare_publisher(TOPIC_OBSERVED_POSITION).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {} joints, {}Hz loop, {:.3}Hz feedback poll",
        joints, LOOP_HZ, cfg.feedback_hz
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_ACTION, TOPIC_CMD_POSITION);
    info!("Publishing to: {}", TOPIC_OBSERVED_POSITION);

    loop {
        tick.tick().await;

        // 1. Drain operator action strings (non-blocking)
        while let Ok(Some(sample)) = sub_action.try_recv() {
            let payload = sample.payload().to_bytes();
            let msg = String::from_utf8_lossy(&payload);
            if let Some(observed) = runtime.on_operator_message(&msg) {
                publish_observed(&pub_observed, observed).await?;
            }
        }

        // 2. Drain commanded joint positions
        while let Ok(Some(sample)) = sub_position.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ArmPosition>(&payload) {
                Ok(cmd) => {
                    if let Some(observed) = runtime.on_position_command(&cmd) {
                        publish_observed(&pub_observed, observed).await?;
                    }
                }
                Err(e) => {
                    warn!("Failed to parse position command: {}", e);
                }
            }
        }

        // 3. Periodic feedback poll
        if let Some(observed) = runtime.maybe_poll(Instant::now()) {
            publish_observed(&pub_observed, observed).await?;
        }
    }
}

async fn publish_observed(
    publisher: &zenoh::pubsub::Publisher<'_>,
    positions: Vec<f64>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json = serde_json::to_string(&ArmPosition { positions })?;
    publisher.put(json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::driver::{action, mode};
    use crate::arm::testing::MockPort;

    fn runtime(port: &MockPort, poll_period: Duration) -> ArmRuntime<MockPort> {
        let channel = TransactionChannel::over(port.clone(), Duration::from_millis(50), 6);
        let calib = EncoderCalibration::from_steps_per_degree(vec![10.0; 6]).unwrap();
        ArmRuntime::new(ArmDriver::new(channel, calib), poll_period)
    }

    fn msg(mode_byte: u8, code: u8) -> String {
        String::from_utf8(vec![mode_byte, code]).unwrap()
    }

    #[test]
    fn test_operator_message_yields_observed_update() {
        let port = MockPort::new();
        port.queue_reply("JPA120B-45C0D300E75F10Z");
        let mut rt = runtime(&port, Duration::from_millis(200));

        let observed = rt
            .on_operator_message(&msg(mode::JOINT, action::LEFT_STICK_RIGHT))
            .unwrap();
        assert_eq!(observed, vec![12.0, -4.5, 0.0, 30.0, 7.5, 1.0]);
    }

    #[test]
    fn test_rejected_command_is_recovered() {
        let port = MockPort::new();
        port.queue_reply("JPgarbageZ");
        let mut rt = runtime(&port, Duration::from_millis(200));

        // malformed reply: no update, no panic, next message still works
        assert!(
            rt.on_operator_message(&msg(mode::JOINT, action::HOME))
                .is_none()
        );
        port.queue_reply("JPA0B0C0D0E0F0Z");
        assert!(
            rt.on_operator_message(&msg(mode::JOINT, action::HOME))
                .is_some()
        );
    }

    #[test]
    fn test_poll_waits_for_its_period() {
        let port = MockPort::new();
        let mut rt = runtime(&port, Duration::from_secs(60));

        // period has not elapsed: nothing sent
        assert!(rt.maybe_poll(Instant::now()).is_none());
        assert_eq!(port.written(), "");

        // force the deadline into the past
        port.queue_reply("EEidleZ");
        port.queue_reply("JPA10B10C10D10E10F10Z");
        let later = Instant::now() + Duration::from_secs(61);
        let observed = rt.maybe_poll(later).unwrap();
        assert_eq!(observed, vec![1.0; 6]);
        assert_eq!(port.written(), "FBE\nFBJ\n");
    }

    #[test]
    fn test_poll_failure_drops_the_update_silently() {
        let port = MockPort::new();
        let mut rt = runtime(&port, Duration::ZERO);

        // script dry: EE request times out; no update surfaces
        assert!(rt.maybe_poll(Instant::now()).is_none());
        assert_eq!(port.written(), "FBE\n");
    }
}
