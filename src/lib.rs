// Zenoh-to-serial runtime for the rover arm: relays operator commands from
// the bus to the arm MCU's ASCII line protocol and publishes observed joint
// positions back.

pub mod arm;
pub mod config;
pub mod messages;
pub mod runtime;
