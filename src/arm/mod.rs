// Arm control module
//
// Provides:
// - Degree <-> encoder-step conversion (units)
// - ASCII line protocol codec for the arm MCU (protocol)
// - Single-outstanding-transaction serial channel (channel)
// - Mode-dependent operator command dispatch (driver)

pub mod channel;
pub mod driver;
pub mod protocol;
pub mod units;

pub use channel::{TransactionChannel, TransactionState};
pub use driver::{ArmDriver, Dispatch, OperatingMode};
pub use protocol::{ArmError, Command, Telemetry};
pub use units::EncoderCalibration;

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::rc::Rc;

    /// Scripted serial port: records written bytes, replays queued reply
    /// bytes, and reports a read timeout once the script runs dry. Clones
    /// share state so a test can inspect traffic while the channel owns
    /// the port.
    #[derive(Clone, Default)]
    pub struct MockPort {
        inner: Rc<RefCell<Script>>,
    }

    #[derive(Default)]
    struct Script {
        written: Vec<u8>,
        replies: VecDeque<u8>,
    }

    impl MockPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_reply(&self, line: &str) {
            self.inner.borrow_mut().replies.extend(line.bytes());
        }

        pub fn written(&self) -> String {
            String::from_utf8(self.inner.borrow().written.clone()).expect("writes are ASCII")
        }

        pub fn clear_written(&self) {
            self.inner.borrow_mut().written.clear();
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.inner.borrow_mut().replies.pop_front() {
                Some(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "script exhausted")),
            }
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.borrow_mut().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
