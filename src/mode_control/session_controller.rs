use super::{
    intent::{ControlAxes, Intent, IntentSource},
    session_config::SessionConfig,
    session_timers::{SessionTimers, Tick},
    signal::{Notice, NoticeLevel, SessionEvent},
};
use crate::flight_control::{Command, FlightState, TelemetrySnapshot, command_gate};
use crate::imaging::{
    FrameCompositor, PixelFormat, Recorder, RecorderError, SnapshotError, VideoSpec,
};
use crate::keychain::Keychain;
use crate::{cmd, error, event, info, log, warn};
use chrono::Utc;
use image::{RgbImage, RgbaImage};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;

/// Sending side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    notices: broadcast::Sender<Notice>,
}

impl SessionHandle {
    /// Queues `intent`. Returns `false` if the session is gone.
    pub async fn submit(&self, source: IntentSource, intent: Intent) -> bool {
        self.events.send(SessionEvent::Intent(source, intent)).await.is_ok()
    }

    /// Queues `intent` without waiting, dropping it if the queue is full.
    pub fn try_submit(&self, source: IntentSource, intent: Intent) -> bool {
        self.events.try_send(SessionEvent::Intent(source, intent)).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> { self.notices.subscribe() }
}

/// What woke the session loop up.
enum Wake {
    Shutdown,
    Event(SessionEvent),
    Frame(bool),
    Tick(Tick),
}

/// Owns the flight state, the compositor and the recorder and mutates them from a single
/// task, one event at a time.
pub struct SessionController {
    k: Keychain,
    config: SessionConfig,
    state: FlightState,
    compositor: FrameCompositor,
    recorder: Box<dyn Recorder>,
    timers: SessionTimers,
    compressions: JoinSet<Result<PathBuf, RecorderError>>,
    events_rx: mpsc::Receiver<SessionEvent>,
    notices: broadcast::Sender<Notice>,
    frames: watch::Receiver<Option<Arc<RgbImage>>>,
    frames_closed: bool,
    snapshot: TelemetrySnapshot,
    axes: ControlAxes,
    recording_path: Option<PathBuf>,
    snapshot_file_path: Option<PathBuf>,
    low_battery_warned: bool,
}

impl SessionController {
    const EVENT_QUEUE_CAPACITY: usize = 64;
    const NOTICE_CAPACITY: usize = 32;
    /// Frame rate announced to the recorder before the first sample was taken.
    const FALLBACK_FRAME_RATE: u32 = 30;

    /// Creates the session, it does nothing until [`SessionController::run`] is awaited.
    pub fn new(
        k: Keychain,
        recorder: Box<dyn Recorder>,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::channel(Self::EVENT_QUEUE_CAPACITY);
        let (notices, _) = broadcast::channel(Self::NOTICE_CAPACITY);
        let handle = SessionHandle { events: events_tx, notices: notices.clone() };
        let frames = k.video().frames();
        let compositor = FrameCompositor::new(config.hud_size, Utc::now());
        let controller = Self {
            k,
            config,
            state: FlightState::IDLE,
            compositor,
            recorder,
            timers: SessionTimers::new(),
            compressions: JoinSet::new(),
            events_rx,
            notices,
            frames,
            frames_closed: false,
            snapshot: TelemetrySnapshot::default(),
            axes: ControlAxes::CENTERED,
            recording_path: None,
            snapshot_file_path: None,
            low_battery_warned: false,
        };
        (controller, handle)
    }

    pub fn state(&self) -> FlightState { self.state }

    pub fn compositor(&self) -> &FrameCompositor { &self.compositor }

    pub fn snapshot(&self) -> TelemetrySnapshot { self.snapshot }

    /// Path of the last snapshot taken since the session connected.
    pub fn snapshot_file_path(&self) -> Option<&Path> { self.snapshot_file_path.as_deref() }

    /// Runs the session until `c_tok` is cancelled.
    ///
    /// Queued events are handled before the cancellation is noticed. On shutdown the session
    /// disconnects like on a regular `Disconnect` and waits for pending compression passes, so
    /// their notices are published before it returns.
    ///
    /// # Returns
    /// The flight state the session ended in.
    pub async fn run(mut self, c_tok: CancellationToken) -> FlightState {
        info!("Session started.");
        loop {
            let wake = tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => Wake::Event(event),
                () = c_tok.cancelled() => Wake::Shutdown,
                res = self.frames.changed(), if !self.frames_closed => Wake::Frame(res.is_ok()),
                Some(res) = self.compressions.join_next(), if !self.compressions.is_empty() => {
                    Wake::Event(SessionEvent::CompressionFinished(Self::flatten(res)))
                }
                tick = self.timers.next_tick() => Wake::Tick(tick),
            };
            match wake {
                Wake::Shutdown => break,
                Wake::Event(event) => self.handle_event(event).await,
                Wake::Frame(true) => {
                    let latest = self.frames.borrow_and_update().clone();
                    if let Some(frame) = latest {
                        self.on_frame(frame);
                    }
                }
                Wake::Frame(false) => {
                    warn!("Video source closed its stream.");
                    self.frames_closed = true;
                }
                Wake::Tick(tick) => self.on_tick(tick),
            }
        }
        self.disconnect().await;
        if !self.compressions.is_empty() {
            info!("Waiting for {} compression pass(es).", self.compressions.len());
        }
        while let Some(res) = self.compressions.join_next().await {
            self.handle_event(SessionEvent::CompressionFinished(Self::flatten(res))).await;
        }
        info!("Session ended in state {}.", self.state);
        self.state
    }

    fn flatten(
        res: Result<Result<PathBuf, RecorderError>, JoinError>,
    ) -> Result<PathBuf, RecorderError> {
        res.map_err(RecorderError::from).and_then(|r| r)
    }

    pub(super) async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Intent(source, intent) => self.handle_intent(source, intent).await,
            SessionEvent::CompressionFinished(Ok(path)) => {
                self.notify(
                    NoticeLevel::Info,
                    format!("Recording compressed to {}.", path.display()),
                );
            }
            SessionEvent::CompressionFinished(Err(e)) => {
                self.notify(NoticeLevel::Error, format!("Compressing the recording failed: {e:?}"));
            }
        }
    }

    async fn handle_intent(&mut self, source: IntentSource, intent: Intent) {
        event!("{source} intent {intent} in state {}.", self.state);
        match intent {
            Intent::Connect => self.connect().await,
            Intent::Disconnect => self.disconnect().await,
            Intent::Steer(axes) => self.axes = axes,
            Intent::ToggleRecording => {
                if self.state.recording() {
                    self.stop_recording().await;
                } else {
                    self.start_recording().await;
                }
            }
            Intent::TakeSnapshot => self.take_snapshot().await,
            other => {
                if let Some(command) = other.flight_command(&self.state) {
                    self.dispatch(source, command);
                }
            }
        }
    }

    /// Sends `command` if the gate allows it in the current state.
    fn dispatch(&mut self, source: IntentSource, command: Command) {
        if !command_gate::is_possible(&command, &self.state) {
            event!("Dropped {command} from {source} in state {}.", self.state);
            return;
        }
        self.k.link().send_command(command);
        if command.is_continuous() {
            event!("Sent {command:?}.");
        } else {
            cmd!("{command} from {source}.");
        }
        if matches!(command, Command::ChangeCamera) {
            self.k.video().switch_camera();
        }
        self.state = command_gate::apply(&command, self.state);
    }

    async fn connect(&mut self) {
        if self.state.connected() {
            event!("Already connected.");
            return;
        }
        let link = self.k.link();
        if let Err(e) = link.connect().await {
            self.notify(NoticeLevel::Error, format!("Connecting to the aircraft failed: {e:?}"));
            return;
        }
        self.state = self.state.with_connection(true);
        self.timers.start();
        self.compositor.reset_frame_rate(Utc::now());
        self.snapshot_file_path = None;
        self.low_battery_warned = false;
        self.axes = ControlAxes::CENTERED;
        self.refresh_snapshot();
        self.notify(NoticeLevel::Info, "Connected.");
    }

    async fn disconnect(&mut self) {
        if !self.state.connected() {
            event!("Already disconnected.");
            return;
        }
        self.timers.stop();
        if self.state.recording() {
            self.stop_recording().await;
        }
        let link = self.k.link();
        link.disconnect().await;
        self.state = self.state.with_connection(false);
        self.notify(NoticeLevel::Info, "Disconnected.");
    }

    async fn start_recording(&mut self) {
        if !self.state.connected() {
            event!("Recording needs a connected aircraft.");
            return;
        }
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.config.media_dir.join(format!("flight_{stamp}.raw"));
        if let Err(e) = Self::prepare_path(&path).await {
            self.notify(
                NoticeLevel::Error,
                format!("Could not prepare {} for recording: {e}", path.display()),
            );
            return;
        }
        let size = self.compositor.frame_size().unwrap_or(self.config.hud_size);
        let spec = VideoSpec {
            frame_rate: match self.compositor.frame_rate() {
                0 => Self::FALLBACK_FRAME_RATE,
                rate => rate,
            },
            width: size.x(),
            height: size.y(),
            pixel_format: PixelFormat::Rgb24,
            quality: self.config.quality,
            compress: self.config.compress,
        };
        match self.recorder.start_video(&path, spec).await {
            Ok(()) => {
                self.state = self.state.with_recording(true);
                self.notify(NoticeLevel::Info, format!("Recording to {}.", path.display()));
                self.recording_path = Some(path);
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                self.notify(NoticeLevel::Error, format!("Could not start recording: {e:?}"));
            }
        }
    }

    /// Creates the parent directory and removes a leftover file at `path`.
    async fn prepare_path(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Drains the recorder and hands a requested compression pass to the background. The
    /// session loop collects its result.
    async fn stop_recording(&mut self) {
        self.state = self.state.with_recording(false);
        let path = self.recording_path.take().unwrap_or_default();
        match self.recorder.end_video().await {
            Ok(Some(compression)) => {
                self.compressions.spawn(compression);
                self.notify(
                    NoticeLevel::Info,
                    format!("Saved {}, compressing in the background.", path.display()),
                );
            }
            Ok(None) => {
                self.notify(NoticeLevel::Info, format!("Saved recording {}.", path.display()));
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, format!("Closing the recording failed: {e:?}"));
            }
        }
    }

    async fn take_snapshot(&mut self) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let path = self.config.media_dir.join(format!("snapshot_{stamp}.png"));
        let image = self.compositor.displayed().cloned();
        let dir = self.config.media_dir.clone();
        match Self::write_snapshot(image, dir, path.clone()).await {
            Ok(()) => {
                self.notify(NoticeLevel::Info, format!("Snapshot saved to {}.", path.display()));
                self.snapshot_file_path = Some(path);
            }
            Err(e) => self.notify(NoticeLevel::Error, format!("Snapshot failed: {e}")),
        }
    }

    /// Encodes a copy of the displayed image on the blocking pool.
    async fn write_snapshot(
        image: Option<RgbaImage>,
        dir: PathBuf,
        path: PathBuf,
    ) -> Result<(), String> {
        let image = image.ok_or_else(|| format!("{:?}", SnapshotError::NothingRendered))?;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| format!("{e}"))?;
        tokio::task::spawn_blocking(move || FrameCompositor::write_snapshot(&image, &path))
            .await
            .map_err(|e| format!("{e}"))?
            .map_err(|e| format!("{e:?}"))
    }

    pub(super) fn on_frame(&mut self, frame: Arc<RgbImage>) {
        if !self.state.connected() {
            return;
        }
        let recorder = if self.state.recording() {
            Some(self.recorder.as_mut() as &mut dyn Recorder)
        } else {
            None
        };
        if let Err(e) = self.compositor.ingest_frame(frame, recorder) {
            error!("Recorder refused a frame: {e:?}");
        }
    }

    pub(super) fn on_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Status => self.status_poll(),
            Tick::Hud => {
                self.refresh_snapshot();
                let stick = self.axes.to_command();
                self.dispatch(IntentSource::ControlLoop, stick);
            }
            Tick::Video => {
                self.compositor.compose(&self.snapshot);
            }
        }
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = TelemetrySnapshot::from(self.k.link().navigation_data());
    }

    fn status_poll(&mut self) {
        if !self.state.connected() {
            return;
        }
        let fps = self.compositor.sample_frame_rate(Utc::now());
        self.refresh_snapshot();
        let s = self.snapshot;
        log!(
            "{} | {fps} fps | battery {}% | alt {:.1} m | heading {:.0} | {:.1} m/s",
            self.state,
            s.battery_percent(),
            s.altitude(),
            s.psi(),
            s.ground_speed()
        );
        if s.battery_percent() < self.config.low_battery_percent && !self.low_battery_warned {
            self.low_battery_warned = true;
            self.notify(NoticeLevel::Warning, format!("Battery low: {}%.", s.battery_percent()));
        }
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let notice = Notice::new(level, text);
        match level {
            NoticeLevel::Info => info!("{}", notice.text()),
            NoticeLevel::Warning => warn!("{}", notice.text()),
            NoticeLevel::Error => error!("{}", notice.text()),
        }
        if self.notices.send(notice).is_err() {
            event!("Nobody listens for notices.");
        }
    }
}
