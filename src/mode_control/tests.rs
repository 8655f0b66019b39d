use super::{
    ControlAxes, Intent, IntentSource, NoticeLevel, SessionConfig, SessionController,
    SessionEvent, SessionHandle, Tick,
};
use crate::flight_control::{
    AircraftLink, Command, FlightState, LinkError, NavigationData, SimulatedLink,
};
use crate::imaging::{FrameDumpRecorder, RecorderError, Vec2D, VideoSource};
use crate::info;
use crate::keychain::Keychain;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use rand::Rng;
use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

struct MockLink {
    reachable: bool,
    battery: u32,
    connected: AtomicBool,
    disconnects: AtomicUsize,
    sent: Mutex<Vec<Command>>,
}

impl MockLink {
    fn new(reachable: bool, battery: u32) -> Self {
        Self {
            reachable,
            battery,
            connected: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<Command> { self.sent.lock().unwrap().clone() }

    /// Everything but the stick commands of the control loop.
    fn discrete(&self) -> Vec<Command> {
        self.sent().into_iter().filter(|c| !c.is_continuous()).collect()
    }
}

#[async_trait]
impl AircraftLink for MockLink {
    async fn connect(&self) -> Result<(), LinkError> {
        if !self.reachable {
            return Err(LinkError::Unreachable);
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.disconnects.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn send_command(&self, command: Command) { self.sent.lock().unwrap().push(command); }

    fn navigation_data(&self) -> NavigationData {
        NavigationData {
            psi: 90_000.0,
            altitude: 1500,
            battery_level: self.battery,
            ..NavigationData::default()
        }
    }
}

struct MockVideo {
    frame_tx: watch::Sender<Option<Arc<RgbImage>>>,
    switches: AtomicUsize,
}

impl VideoSource for MockVideo {
    fn frames(&self) -> watch::Receiver<Option<Arc<RgbImage>>> { self.frame_tx.subscribe() }

    fn switch_camera(&self) { self.switches.fetch_add(1, Ordering::AcqRel); }
}

struct Rig {
    session: SessionController,
    handle: SessionHandle,
    link: Arc<MockLink>,
    video: Arc<MockVideo>,
    dir: PathBuf,
}

impl Rig {
    fn new(reachable: bool, battery: u32, compress: bool) -> Self {
        let dir = std::env::temp_dir()
            .join(format!("hover-deck-session-{}", rand::rng().random::<u64>()));
        let link = Arc::new(MockLink::new(reachable, battery));
        let (frame_tx, _) = watch::channel(None);
        let video = Arc::new(MockVideo { frame_tx, switches: AtomicUsize::new(0) });
        let config = SessionConfig {
            media_dir: dir.clone(),
            hud_size: Vec2D::new(32, 24),
            compress,
            quality: 80,
            low_battery_percent: 20,
            demo_secs: 0,
        };
        let k = Keychain::new(
            Arc::clone(&link) as Arc<dyn AircraftLink>,
            Arc::clone(&video) as Arc<dyn VideoSource>,
        );
        let recorder = Box::new(FrameDumpRecorder::new());
        let (session, handle) = SessionController::new(k, recorder, config);
        Self { session, handle, link, video, dir }
    }

    async fn intent(&mut self, source: IntentSource, intent: Intent) {
        self.session.handle_event(SessionEvent::Intent(source, intent)).await;
    }

    async fn op(&mut self, intent: Intent) { self.intent(IntentSource::Operator, intent).await; }

    fn frame(&mut self, shade: u8) {
        self.session.on_frame(Arc::new(RgbImage::from_pixel(32, 24, Rgb([shade; 3]))));
    }

    fn switches(&self) -> usize { self.video.switches.load(Ordering::Acquire) }

    fn files_with_extension(&self, ext: &str) -> Vec<PathBuf> {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|e| e == ext))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Puts a plain file where the media directory should be.
    fn block_media_dir(&self) { std::fs::write(&self.dir, b"not a directory").unwrap(); }

    fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.dir);
        let _ = std::fs::remove_file(&self.dir);
    }
}

#[test]
fn test_toggle_intents_resolve_against_state() {
    let grounded = FlightState::from_flags(true, false, false, false, false);
    let flying = FlightState::from_flags(true, true, false, false, false);
    let hovering = FlightState::from_flags(true, true, true, false, false);
    assert_eq!(Intent::TakeOffOrLand.flight_command(&grounded), Some(Command::TakeOff));
    assert_eq!(Intent::TakeOffOrLand.flight_command(&flying), Some(Command::Land));
    assert_eq!(Intent::ToggleHover.flight_command(&flying), Some(Command::EnterHover));
    assert_eq!(Intent::ToggleHover.flight_command(&hovering), Some(Command::LeaveHover));
    assert_eq!(Intent::ToggleRecording.flight_command(&flying), None);
    assert_eq!(Intent::Steer(ControlAxes::CENTERED).flight_command(&flying), None);
}

#[test]
fn test_control_axes_are_clamped() {
    let axes = ControlAxes::new(0.5, 2.0, -3.0, f32::NAN);
    assert_eq!(axes.to_command(), Command::Move { roll: 0.5, pitch: 1.0, yaw: -1.0, gaz: 0.0 });
}

#[tokio::test]
async fn test_take_off_then_land() {
    info!("Running take off and land test");
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::TakeOffOrLand).await;
    assert!(rig.session.state().flying());
    rig.op(Intent::TakeOffOrLand).await;
    assert_eq!(rig.session.state(), FlightState::from_flags(true, false, false, false, false));
    assert_eq!(rig.link.discrete(), vec![Command::TakeOff, Command::Land]);
}

#[tokio::test]
async fn test_commands_dropped_while_disconnected() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::TakeOffOrLand).await;
    rig.op(Intent::Emergency).await;
    rig.session.on_tick(Tick::Hud);
    assert!(rig.link.sent().is_empty());
    assert_eq!(rig.session.state(), FlightState::IDLE);
}

#[tokio::test]
async fn test_double_disconnect_is_noop() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::TakeOffOrLand).await;
    rig.op(Intent::Disconnect).await;
    let after_first = rig.session.state();
    assert!(!after_first.connected());
    assert!(!after_first.flying());
    rig.op(Intent::Disconnect).await;
    assert_eq!(rig.session.state(), after_first);
    assert_eq!(rig.link.disconnects.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn test_input_device_goes_through_the_gate() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.intent(IntentSource::InputDevice, Intent::ToggleHover).await;
    rig.intent(IntentSource::InputDevice, Intent::FlatTrim).await;
    rig.op(Intent::TakeOffOrLand).await;
    rig.intent(IntentSource::InputDevice, Intent::FlatTrim).await;
    rig.intent(IntentSource::InputDevice, Intent::ToggleHover).await;
    assert!(rig.session.state().hovering());
    rig.intent(IntentSource::InputDevice, Intent::ToggleHover).await;
    assert!(!rig.session.state().hovering());
    assert_eq!(rig.link.discrete(), vec![
        Command::FlatTrim,
        Command::TakeOff,
        Command::EnterHover,
        Command::LeaveHover
    ]);
}

#[tokio::test]
async fn test_emergency_grounds_and_toggles_back() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::TakeOffOrLand).await;
    rig.op(Intent::Emergency).await;
    let state = rig.session.state();
    assert!(state.emergency());
    assert!(!state.flying());
    rig.op(Intent::Emergency).await;
    assert!(!rig.session.state().emergency());
}

#[tokio::test]
async fn test_control_loop_sends_steering() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.intent(IntentSource::InputDevice, Intent::Steer(ControlAxes::new(0.5, 2.0, -3.0, 0.0)))
        .await;
    rig.session.on_tick(Tick::Hud);
    assert_eq!(rig.link.sent().last(), Some(&Command::Move {
        roll: 0.5,
        pitch: 1.0,
        yaw: -1.0,
        gaz: 0.0
    }));
    assert!((rig.session.snapshot().psi() - 90.0).abs() < 1e-3);

    rig.op(Intent::Disconnect).await;
    let count = rig.link.sent().len();
    rig.session.on_tick(Tick::Hud);
    assert_eq!(rig.link.sent().len(), count);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_camera_locked_while_recording() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::ChangeCamera).await;
    assert_eq!(rig.switches(), 1);

    rig.op(Intent::ToggleRecording).await;
    assert!(rig.session.state().recording());
    rig.op(Intent::ChangeCamera).await;
    assert_eq!(rig.switches(), 1);
    for shade in [10, 20, 30] {
        rig.frame(shade);
    }
    rig.op(Intent::ToggleRecording).await;
    assert!(!rig.session.state().recording());
    rig.op(Intent::ChangeCamera).await;
    assert_eq!(rig.switches(), 2);

    let dumps = rig.files_with_extension("raw");
    assert_eq!(dumps.len(), 1);
    let (spec, frames) = FrameDumpRecorder::read_dump(&dumps[0]).unwrap();
    assert_eq!((spec.width, spec.height), (32, 24));
    assert_eq!(frames.len(), 3);
    assert_eq!(rig.session.compositor().frames_total(), 3);
    rig.cleanup();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_finishes_recording() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::ToggleRecording).await;
    rig.frame(99);
    rig.op(Intent::Disconnect).await;
    assert_eq!(rig.session.state(), FlightState::IDLE);
    let dumps = rig.files_with_extension("raw");
    assert_eq!(FrameDumpRecorder::read_dump(&dumps[0]).unwrap().1.len(), 1);
    rig.cleanup();
}

#[tokio::test]
async fn test_recording_needs_connection() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::ToggleRecording).await;
    assert!(!rig.session.state().recording());
    assert!(rig.files_with_extension("raw").is_empty());
}

#[tokio::test]
async fn test_unpreparable_media_dir_aborts_recording() {
    let mut rig = Rig::new(true, 80, false);
    rig.block_media_dir();
    let mut notices = rig.handle.subscribe();
    rig.op(Intent::Connect).await;
    rig.op(Intent::ToggleRecording).await;
    assert!(!rig.session.state().recording());
    assert!(rig.session.state().connected());

    let texts: Vec<_> = std::iter::from_fn(|| notices.try_recv().ok())
        .filter(|n| n.level() == NoticeLevel::Error)
        .map(|n| n.text().to_string())
        .collect();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Could not prepare"));
    rig.op(Intent::ToggleRecording).await;
    assert!(!rig.session.state().recording());
    rig.cleanup();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_snapshot_becomes_notice() {
    let mut rig = Rig::new(true, 80, false);
    rig.block_media_dir();
    let mut notices = rig.handle.subscribe();
    rig.op(Intent::Connect).await;
    rig.session.on_tick(Tick::Video);
    assert!(rig.session.compositor().displayed().is_some());
    rig.op(Intent::TakeSnapshot).await;
    assert!(rig.session.snapshot_file_path().is_none());

    let failed = std::iter::from_fn(|| notices.try_recv().ok())
        .find(|n| n.level() == NoticeLevel::Error)
        .unwrap();
    assert!(failed.text().starts_with("Snapshot failed"));
    rig.cleanup();
}

#[tokio::test]
async fn test_failed_compression_becomes_notice() {
    let mut rig = Rig::new(true, 80, false);
    let mut notices = rig.handle.subscribe();
    rig.session
        .handle_event(SessionEvent::CompressionFinished(Err(RecorderError::EncoderGone)))
        .await;
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level(), NoticeLevel::Error);
    assert!(notice.text().contains("EncoderGone"));
}

#[tokio::test]
async fn test_low_battery_warned_once_per_connection() {
    let mut rig = Rig::new(true, 10, false);
    let mut notices = rig.handle.subscribe();
    rig.op(Intent::Connect).await;
    rig.session.on_tick(Tick::Status);
    rig.session.on_tick(Tick::Status);
    let mut warnings = 0;
    while let Ok(notice) = notices.try_recv() {
        if notice.level() == NoticeLevel::Warning {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 1);
}

#[tokio::test]
async fn test_unreachable_aircraft_stays_disconnected() {
    let mut rig = Rig::new(false, 80, false);
    let mut notices = rig.handle.subscribe();
    rig.op(Intent::Connect).await;
    assert!(!rig.session.state().connected());
    assert_eq!(notices.try_recv().unwrap().level(), NoticeLevel::Error);
}

#[tokio::test]
async fn test_snapshot_forgotten_on_reconnect() {
    let mut rig = Rig::new(true, 80, false);
    rig.op(Intent::Connect).await;
    rig.op(Intent::TakeSnapshot).await;
    assert!(rig.session.snapshot_file_path().is_none());

    rig.session.on_tick(Tick::Video);
    rig.op(Intent::TakeSnapshot).await;
    let path = rig.session.snapshot_file_path().unwrap().to_path_buf();
    assert!(path.exists());
    assert_eq!(image::open(&path).unwrap().width(), 32);

    rig.op(Intent::Disconnect).await;
    rig.op(Intent::Connect).await;
    assert!(rig.session.snapshot_file_path().is_none());
    rig.cleanup();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_loop_compresses_and_shuts_down() {
    info!("Running session loop test");
    let rig = Rig::new(true, 80, true);
    let Rig { session, handle, link, video, dir } = rig;
    let mut notices = handle.subscribe();
    let c_tok = CancellationToken::new();
    let task = tokio::spawn(session.run(c_tok.clone()));

    for intent in [Intent::Connect, Intent::TakeOffOrLand, Intent::ToggleRecording] {
        assert!(handle.submit(IntentSource::Operator, intent).await);
    }
    video.frame_tx.send_replace(Some(Arc::new(RgbImage::new(32, 24))));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.submit(IntentSource::Operator, Intent::ToggleRecording).await);

    let compressed = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let notice = notices.recv().await.unwrap();
            if notice.text().starts_with("Recording compressed to") {
                break notice;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(compressed.level(), NoticeLevel::Info);

    c_tok.cancel();
    let final_state = task.await.unwrap();
    assert_eq!(final_state, FlightState::IDLE);
    assert_eq!(link.discrete(), vec![Command::TakeOff]);
    assert!(!link.connected.load(Ordering::Acquire));
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_waits_for_pending_compression() {
    info!("Running shutdown during recording test");
    let Rig { session, handle, link, video, dir } = Rig::new(true, 80, true);
    let mut notices = handle.subscribe();
    let c_tok = CancellationToken::new();
    let task = tokio::spawn(session.run(c_tok.clone()));

    assert!(handle.submit(IntentSource::Operator, Intent::Connect).await);
    assert!(handle.submit(IntentSource::Operator, Intent::ToggleRecording).await);
    for shade in 0..40u8 {
        video.frame_tx.send_replace(Some(Arc::new(RgbImage::from_pixel(32, 24, Rgb([shade; 3])))));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    c_tok.cancel();
    assert_eq!(task.await.unwrap(), FlightState::IDLE);
    assert!(!link.connected.load(Ordering::Acquire));

    let texts: Vec<_> =
        std::iter::from_fn(|| notices.try_recv().ok()).map(|n| n.text().to_string()).collect();
    assert!(texts.iter().any(|t| t.starts_with("Saved")));
    let compressed = texts.iter().find(|t| t.starts_with("Recording compressed to")).unwrap();
    let out = PathBuf::from(
        compressed.trim_start_matches("Recording compressed to ").trim_end_matches('.'),
    );
    assert!(out.exists());
    assert!(FrameDumpRecorder::count_compressed_frames(&out).unwrap() > 0);
    let raw_left = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.path().extension().is_some_and(|ext| ext == "raw"));
    assert!(!raw_left);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_simulated_aircraft_follows_state_through_emergency() {
    info!("Running simulated aircraft emergency test");
    let dir = std::env::temp_dir()
        .join(format!("hover-deck-session-{}", rand::rng().random::<u64>()));
    let link = SimulatedLink::start();
    let (frame_tx, _) = watch::channel(None);
    let video = Arc::new(MockVideo { frame_tx, switches: AtomicUsize::new(0) });
    let config = SessionConfig { media_dir: dir, demo_secs: 0, ..SessionConfig::default() };
    let k = Keychain::new(
        Arc::clone(&link) as Arc<dyn AircraftLink>,
        video as Arc<dyn VideoSource>,
    );
    let (mut session, _handle) =
        SessionController::new(k, Box::new(FrameDumpRecorder::new()), config);

    for intent in [Intent::Connect, Intent::Emergency, Intent::TakeOffOrLand] {
        session.handle_event(SessionEvent::Intent(IntentSource::Operator, intent)).await;
    }
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let state = session.state();
    assert!(state.emergency() && state.flying());
    assert!(link.navigation_data().altitude > 0);

    session.handle_event(SessionEvent::Intent(IntentSource::Operator, Intent::Emergency)).await;
    session.handle_event(SessionEvent::Intent(IntentSource::Operator, Intent::Emergency)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!session.state().flying());
    assert_eq!(link.navigation_data().altitude, 0);
    link.disconnect().await;
}
