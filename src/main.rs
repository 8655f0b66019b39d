#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod flight_control;
mod imaging;
mod keychain;
mod logger;
mod mode_control;

use crate::flight_control::SimulatedLink;
use crate::imaging::{FrameDumpRecorder, SyntheticVideoSource};
use crate::keychain::Keychain;
use crate::mode_control::{
    ControlAxes, Intent, IntentSource, SessionConfig, SessionController, SessionHandle,
};
use std::time::Duration;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;

const STICK_PERIOD: Duration = Duration::from_millis(100);
const MIN_DEMO_STEP: Duration = Duration::from_millis(200);

/// Intents the scripted demo flight walks through in order.
const DEMO_SCRIPT: [Intent; 11] = [
    Intent::Connect,
    Intent::FlatTrim,
    Intent::TakeOffOrLand,
    Intent::ToggleRecording,
    Intent::ToggleHover,
    Intent::TakeSnapshot,
    Intent::ChangeCamera,
    Intent::ToggleHover,
    Intent::ToggleRecording,
    Intent::ChangeCamera,
    Intent::TakeOffOrLand,
];

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = SessionConfig::from_env();
    info!("Writing media to {}, HUD size {}.", config.media_dir.display(), config.hud_size);
    tokio::fs::create_dir_all(&config.media_dir).await?;
    let demo = Duration::from_secs(config.demo_secs);

    let k = Keychain::new(SimulatedLink::start(), SyntheticVideoSource::start(config.hud_size));
    let (session, handle) = SessionController::new(k, Box::new(FrameDumpRecorder::new()), config);
    let c_tok = CancellationToken::new();
    let session_task = tokio::spawn(session.run(c_tok.clone()));

    let printer = spawn_notice_printer(&handle);
    let stick = spawn_input_device(handle.clone(), c_tok.child_token());

    let step = (demo / u32::try_from(DEMO_SCRIPT.len())?).max(MIN_DEMO_STEP);
    for intent in DEMO_SCRIPT {
        if !handle.submit(IntentSource::Operator, intent).await {
            error!("Session stopped before the demo finished.");
            break;
        }
        tokio::time::sleep(step).await;
    }

    c_tok.cancel();
    let final_state = session_task.await?;
    stick.await?;
    drop(handle);
    printer.await?;
    info!("Demo flight ended in state {final_state}.");
    Ok(())
}

/// Prints the notices a UI would show.
fn spawn_notice_printer(handle: &SessionHandle) -> JoinHandle<()> {
    let mut notices = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => event!(
                    "Notice {} [{}]: {}",
                    notice.level(),
                    notice.timestamp().format("%H:%M:%S"),
                    notice.text()
                ),
                Err(RecvError::Lagged(missed)) => warn!("Missed {missed} notices."),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Emulates a gamepad slowly sweeping the yaw and throttle sticks.
#[allow(clippy::cast_possible_truncation)]
fn spawn_input_device(handle: SessionHandle, c_tok: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STICK_PERIOD);
        let mut t = 0.0f64;
        loop {
            tokio::select! {
                () = c_tok.cancelled() => break,
                _ = interval.tick() => {
                    t += STICK_PERIOD.as_secs_f64();
                    let axes = ControlAxes::new(0.0, 0.0, (t.sin() * 0.3) as f32, 0.0);
                    if !handle.try_submit(IntentSource::InputDevice, Intent::Steer(axes)) {
                        event!("Input queue full, dropped stick update.");
                    }
                }
            }
        }
    })
}
