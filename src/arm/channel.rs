// Serial transaction channel to the arm MCU
//
// The MCU services one request at a time: each exchange is a single
// newline-terminated send, optionally followed by one Z-terminated reply.
// The channel enforces that discipline with an explicit two-state machine;
// it never queues a second request behind an outstanding one.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serialport::{DataBits, SerialPort};
use tracing::debug;

use super::protocol::{self, ArmError, Command, Result, TERMINATOR, Telemetry};

/// Transaction phase of the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No request outstanding; a send may proceed
    Idle,
    /// A request is on the wire; only a receive may proceed
    AwaitingReply,
}

/// Exclusive serial channel enforcing at most one in-flight transaction.
///
/// Generic over the byte transport so tests can substitute a scripted
/// port for the real serial device.
pub struct TransactionChannel<T> {
    transport: T,
    state: Mutex<TransactionState>,
    read_timeout: Duration,
    joints: usize,
}

impl TransactionChannel<Box<dyn SerialPort>> {
    /// Open the serial link to the MCU with 8-N-1 framing.
    pub fn open(path: &str, baud: u32, read_timeout: Duration, joints: usize) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .timeout(read_timeout)
            .open()?;
        Ok(Self::over(port, read_timeout, joints))
    }
}

impl<T: Read + Write> TransactionChannel<T> {
    /// Wrap an already-open byte transport.
    pub fn over(transport: T, read_timeout: Duration, joints: usize) -> Self {
        Self {
            transport,
            state: Mutex::new(TransactionState::Idle),
            read_timeout,
            joints,
        }
    }

    pub fn state(&self) -> TransactionState {
        *lock(&self.state)
    }

    /// Write one encoded command line. Fails with `ChannelBusy` while a
    /// reply is outstanding; never queues.
    pub fn send(&mut self, cmd: &Command) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != TransactionState::Idle {
            return Err(ArmError::ChannelBusy);
        }
        let line = cmd.encode();
        self.transport.write_all(line.as_bytes())?;
        self.transport.flush()?;
        debug!("sent {:?}", line.trim_end());
        *state = TransactionState::AwaitingReply;
        Ok(())
    }

    /// Block until a full Z-terminated reply arrives, then decode it.
    ///
    /// The channel returns to Idle on every exit path, decode failures and
    /// timeouts included, so one bad or stalled reply cannot lock out
    /// later commands.
    pub fn receive(&mut self) -> Result<Telemetry> {
        let mut state = lock(&self.state);
        if *state != TransactionState::AwaitingReply {
            return Err(ArmError::NoPendingRequest);
        }
        let outcome = read_reply(&mut self.transport, self.read_timeout, self.joints);
        *state = TransactionState::Idle;
        if let Ok(frame) = &outcome {
            debug!("received {:?}", frame);
        }
        outcome
    }

    /// Run one full transaction: send, then block for the reply when the
    /// command elicits one. Fire-and-forget commands release the channel
    /// immediately.
    pub fn transact(&mut self, cmd: &Command) -> Result<Option<Telemetry>> {
        self.send(cmd)?;
        if cmd.expects_reply() {
            self.receive().map(Some)
        } else {
            *lock(&self.state) = TransactionState::Idle;
            Ok(None)
        }
    }
}

fn read_reply<T: Read>(transport: &mut T, timeout: Duration, joints: usize) -> Result<Telemetry> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match transport.read(&mut byte) {
            Ok(0) => {} // transport produced nothing; fall through to the deadline check
            Ok(_) => {
                buf.push(byte[0]);
                if byte[0] == TERMINATOR {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => return Err(ArmError::Timeout),
            Err(e) => return Err(e.into()),
        }
        if Instant::now() >= deadline {
            return Err(ArmError::Timeout);
        }
    }
    let line = String::from_utf8(buf).map_err(|_| ArmError::MalformedFrame {
        reason: "reply is not valid UTF-8".to_string(),
    })?;
    protocol::decode_telemetry(&line, joints)
}

// The state flag stays usable even if a holder panicked mid-transition.
fn lock(state: &Mutex<TransactionState>) -> MutexGuard<'_, TransactionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::protocol::{Direction, Grip, Stick};
    use crate::arm::testing::MockPort;

    fn channel(port: &MockPort, joints: usize) -> TransactionChannel<MockPort> {
        TransactionChannel::over(port.clone(), Duration::from_millis(50), joints)
    }

    #[test]
    fn test_receive_without_send_fails_without_blocking() {
        let port = MockPort::new();
        let mut chan = channel(&port, 6);

        assert!(matches!(chan.receive(), Err(ArmError::NoPendingRequest)));
        assert_eq!(chan.state(), TransactionState::Idle);
    }

    #[test]
    fn test_second_send_is_rejected_while_awaiting_reply() {
        let port = MockPort::new();
        let mut chan = channel(&port, 6);

        chan.send(&Command::RequestJointFeedback).unwrap();
        assert_eq!(chan.state(), TransactionState::AwaitingReply);

        let err = chan.send(&Command::Home).unwrap_err();
        assert!(matches!(err, ArmError::ChannelBusy));
        // still waiting on the first request, and only it went out
        assert_eq!(chan.state(), TransactionState::AwaitingReply);
        assert_eq!(port.written(), "FBJ\n");
    }

    #[test]
    fn test_missing_terminator_times_out_and_frees_the_channel() {
        let port = MockPort::new();
        port.queue_reply("JPA1B2C3"); // no Z
        let mut chan = channel(&port, 3);

        chan.send(&Command::RequestJointFeedback).unwrap();
        assert!(matches!(chan.receive(), Err(ArmError::Timeout)));

        // channel must be usable again after the stalled transaction
        assert_eq!(chan.state(), TransactionState::Idle);
        chan.send(&Command::RequestJointFeedback).unwrap();
    }

    #[test]
    fn test_full_transaction() {
        let port = MockPort::new();
        port.queue_reply("JPA120B-45C0Z");
        let mut chan = channel(&port, 3);

        let reply = chan.transact(&Command::RequestJointFeedback).unwrap();
        assert_eq!(reply, Some(Telemetry::JointPositions(vec![120, -45, 0])));
        assert_eq!(chan.state(), TransactionState::Idle);
        assert_eq!(port.written(), "FBJ\n");
    }

    #[test]
    fn test_fire_and_forget_releases_the_channel() {
        let port = MockPort::new();
        let mut chan = channel(&port, 6);

        let reply = chan.transact(&Command::EndEffector { grip: Grip::Open }).unwrap();
        assert_eq!(reply, None);
        assert_eq!(chan.state(), TransactionState::Idle);

        // a second fire-and-forget goes straight through
        chan.transact(&Command::PrepareDrilling).unwrap();
        assert_eq!(port.written(), "EEO\nDMP\n");
    }

    #[test]
    fn test_decode_failure_still_frees_the_channel() {
        let port = MockPort::new();
        port.queue_reply("JPA1B2Z"); // labels C missing for a 3-joint arm
        let mut chan = channel(&port, 3);

        chan.send(&Command::RequestJointFeedback).unwrap();
        assert!(matches!(
            chan.receive(),
            Err(ArmError::MalformedFrame { .. })
        ));
        assert_eq!(chan.state(), TransactionState::Idle);
    }

    #[test]
    fn test_jog_transaction_consumes_joint_reply() {
        let port = MockPort::new();
        port.queue_reply("JPA10B20C30Z");
        let mut chan = channel(&port, 3);

        let reply = chan
            .transact(&Command::JointMove {
                stick: Stick::Left,
                dir: Direction::Right,
            })
            .unwrap();
        assert_eq!(reply, Some(Telemetry::JointPositions(vec![10, 20, 30])));
        assert_eq!(port.written(), "JMMLR\n");
    }
}
