// Keyboard teleop: publishes two-byte operator action strings on the arm
// command topic. 1/2/3 select joint/cartesian/drill mode, Esc quits.
//
// Lowercase keys are presses, their uppercase variants the matching
// releases (keyboards give us no real release events in raw mode).
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use arm_zenoh_runtime::arm::driver::{action, mode};
use arm_zenoh_runtime::config::TOPIC_CMD_ACTION;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_ACTION).await?;

    info!("Modes: 1=joint, 2=cartesian, 3=drill");
    info!("Sticks: a/d=left stick, w/s=right stick; buttons: i/j/l/k");
    info!("Triggers: q/e; gripper: [/]/p; speed: r/f; home: z; Esc=quit");
    info!("Uppercase variants publish the matching release action");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut current_mode = mode::JOINT;

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press && kind != KeyEventKind::Repeat {
            continue;
        }

        let action_code = match code {
            // Mode selection only changes what later actions mean
            KeyCode::Char('1') => {
                current_mode = mode::JOINT;
                info!("Mode: joint");
                continue;
            }
            KeyCode::Char('2') => {
                current_mode = mode::CARTESIAN;
                info!("Mode: cartesian");
                continue;
            }
            KeyCode::Char('3') => {
                current_mode = mode::DRILL;
                info!("Mode: drill");
                continue;
            }

            KeyCode::Char('a') => action::LEFT_STICK_LEFT,
            KeyCode::Char('d') => action::LEFT_STICK_RIGHT,
            KeyCode::Char('A') | KeyCode::Char('D') => action::LEFT_STICK_RELEASE,
            KeyCode::Char('w') => action::RIGHT_STICK_UP,
            KeyCode::Char('s') => action::RIGHT_STICK_DOWN,
            KeyCode::Char('W') | KeyCode::Char('S') => action::RIGHT_STICK_RELEASE,

            KeyCode::Char('i') => action::BUTTON_A,
            KeyCode::Char('j') => action::BUTTON_B,
            KeyCode::Char('l') => action::BUTTON_X,
            KeyCode::Char('k') => action::BUTTON_Y,
            KeyCode::Char('I') => action::BUTTON_A_RELEASE,
            KeyCode::Char('J') => action::BUTTON_B_RELEASE,
            KeyCode::Char('L') => action::BUTTON_X_RELEASE,
            KeyCode::Char('K') => action::BUTTON_Y_RELEASE,

            KeyCode::Char('q') => action::TRIGGER_LEFT,
            KeyCode::Char('e') => action::TRIGGER_RIGHT,
            KeyCode::Char('Q') => action::TRIGGER_LEFT_RELEASE,
            KeyCode::Char('E') => action::TRIGGER_RIGHT_RELEASE,

            KeyCode::Char('[') => action::DPAD_LEFT,
            KeyCode::Char(']') => action::DPAD_RIGHT,
            KeyCode::Char('p') => action::DPAD_RELEASE,
            KeyCode::Char('r') => action::DPAD_UP,
            KeyCode::Char('f') => action::DPAD_DOWN,

            KeyCode::Char('z') => action::HOME,

            KeyCode::Esc => break,
            _ => continue,
        };

        let msg = String::from_utf8(vec![current_mode, action_code])?;
        info!("Publishing {:?}", msg);
        publisher.put(msg).await?;
    }

    Ok(())
}
