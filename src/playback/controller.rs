use std::future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::PlaybackSettings;
use crate::core::{TimeRange, TrackPoint, VehicleId};
use crate::error::{PlaybackError, PlaybackResult};
use crate::playback::engine::{PlayOutcome, PlaybackEngine};
use crate::playback::{ControlWarning, PlaybackEvent, PlaybackStatus, TickId};
use crate::renderer::Renderer;
use crate::source::TrackSource;

/// Capacity of the event broadcast; slow subscribers lag instead of blocking playback
const EVENT_CAPACITY: usize = 1024;

type Reply = oneshot::Sender<PlaybackStatus>;

enum Command {
    Play(Reply),
    Pause(Reply),
    Slow(Reply),
    Fast(Reply),
    SetSpeed(f64, oneshot::Sender<PlaybackResult<PlaybackStatus>>),
    Clear(Reply),
    SelectDevice(VehicleId, Reply),
    SetTimeRange(TimeRange, Reply),
    Load(Vec<TrackPoint>, Reply),
    Status(Reply),
    UseSource(Arc<dyn TrackSource>, TimeRange),
    /// Result of a background fetch, tagged with the session it was started for
    Loaded {
        session: u64,
        result: PlaybackResult<Vec<TrackPoint>>,
    },
    Shutdown,
}

/// Handle to a playback session running on its own task
///
/// The task owns the engine, the renderer and the one timer. Every control
/// call is queued and answered with the status right after it was applied,
/// so calls from one handle are seen in order. Dropping the handle tears the
/// session down.
pub struct PlaybackController {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackController {
    /// Start a session; must be called inside a tokio runtime
    pub fn spawn<R>(renderer: R, settings: PlaybackSettings) -> Self
    where
        R: Renderer + 'static,
    {
        let engine = PlaybackEngine::new(settings);
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(engine.status());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = Actor {
            engine,
            renderer,
            source: None,
            fetching: None,
            commands: rx,
            loopback: commands.downgrade(),
            status: status_tx,
            events: events.clone(),
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands,
            status,
            events,
            task: Some(task),
        }
    }

    /// Let `play()` fetch a trajectory for the selected device when nothing is loaded
    pub fn with_source(self, source: Arc<dyn TrackSource>, range: TimeRange) -> Self {
        if self.send(Command::UseSource(source, range)).is_err() {
            warn!("Playback task is gone; track source ignored");
        }
        self
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Latest status, updated after every command and tick
    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    pub async fn play(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Pause).await
    }

    pub async fn slow(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Slow).await
    }

    pub async fn fast(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Fast).await
    }

    pub async fn set_speed(&self, factor: f64) -> PlaybackResult<PlaybackStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SetSpeed(factor, tx))?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)?
    }

    pub async fn clear(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Clear).await
    }

    pub async fn select_device(&self, device: VehicleId) -> PlaybackResult<PlaybackStatus> {
        self.request(|reply| Command::SelectDevice(device, reply)).await
    }

    pub async fn set_time_range(&self, range: TimeRange) -> PlaybackResult<PlaybackStatus> {
        self.request(|reply| Command::SetTimeRange(range, reply)).await
    }

    pub async fn load_trajectory(&self, points: Vec<TrackPoint>) -> PlaybackResult<PlaybackStatus> {
        self.request(|reply| Command::Load(points, reply)).await
    }

    pub async fn status(&self) -> PlaybackResult<PlaybackStatus> {
        self.request(Command::Status).await
    }

    /// Stop the session and wait until the renderer has been released
    pub async fn shutdown(mut self) -> PlaybackResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Shutdown);
        task.await.map_err(|e| {
            warn!("Playback task ended abnormally: {}", e);
            PlaybackError::ControllerClosed
        })
    }

    fn send(&self, command: Command) -> PlaybackResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> PlaybackResult<PlaybackStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}

/// Deadline of the pending tick as armed on the tokio clock
#[derive(Clone, Copy)]
struct Armed {
    id: TickId,
    at: Instant,
}

enum Wake {
    Command(Option<Command>),
    Tick(TickId),
}

struct Actor<R> {
    engine: PlaybackEngine,
    renderer: R,
    source: Option<Arc<dyn TrackSource>>,
    /// Session of the fetch in flight
    fetching: Option<u64>,
    commands: mpsc::UnboundedReceiver<Command>,
    loopback: mpsc::WeakUnboundedSender<Command>,
    status: watch::Sender<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl<R: Renderer + 'static> Actor<R> {
    async fn run(mut self) {
        let mut armed: Option<Armed> = None;

        loop {
            armed = self.sync_timer(armed);
            let timer = armed;

            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                id = async move {
                    match timer {
                        Some(t) => {
                            sleep_until(t.at).await;
                            t.id
                        }
                        None => future::pending().await,
                    }
                } => Wake::Tick(id),
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle(command),
                Wake::Tick(id) => {
                    armed = None;
                    if let Some(outcome) = self.engine.tick(id, &mut self.renderer) {
                        debug!("Tick {:?} drew point {} (rendered: {})", id, outcome.index, outcome.rendered);
                    }
                }
            }
            self.publish();
        }

        self.engine.teardown(&mut self.renderer);
        self.publish();
        debug!("Playback task stopped");
    }

    /// Keep exactly one armed deadline, matching the engine's pending tick
    fn sync_timer(&self, armed: Option<Armed>) -> Option<Armed> {
        match (self.engine.pending_tick(), armed) {
            (None, _) => None,
            (Some(pending), Some(current)) if current.id == pending.id => Some(current),
            (Some(pending), _) => Some(Armed {
                id: pending.id,
                at: Instant::now() + pending.interval,
            }),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Play(reply) => {
                if self.engine.play() == PlayOutcome::NeedsTrajectory {
                    self.fetch();
                }
                self.reply(reply);
            }
            Command::Pause(reply) => {
                self.engine.pause();
                self.reply(reply);
            }
            Command::Slow(reply) => {
                self.engine.slow();
                self.reply(reply);
            }
            Command::Fast(reply) => {
                self.engine.fast();
                self.reply(reply);
            }
            Command::SetSpeed(factor, reply) => {
                let result = self.engine.set_speed(factor);
                self.publish();
                let _ = reply.send(result.map(|_| self.engine.status()));
            }
            Command::Clear(reply) => {
                self.engine.clear(&mut self.renderer);
                self.reply(reply);
            }
            Command::SelectDevice(device, reply) => {
                self.engine.select_device(device, &mut self.renderer);
                self.reply(reply);
            }
            Command::SetTimeRange(range, reply) => {
                self.engine.set_time_range(range, &mut self.renderer);
                self.reply(reply);
            }
            Command::Load(points, reply) => {
                self.engine.load_trajectory(points, &mut self.renderer);
                self.reply(reply);
            }
            Command::Status(reply) => self.reply(reply),
            Command::UseSource(source, range) => {
                self.source = Some(source);
                self.engine.set_time_range(range, &mut self.renderer);
            }
            Command::Loaded { session, result } => self.loaded(session, result),
            Command::Shutdown => {}
        }
    }

    /// Start fetching the selected device's trajectory in the background
    fn fetch(&mut self) {
        let session = self.engine.session();
        if self.fetching == Some(session) {
            debug!("Fetch already in flight for session {}", session);
            return;
        }

        let (Some(source), Some(device), Some(range)) = (
            self.source.clone(),
            self.engine.device().cloned(),
            self.engine.time_range(),
        ) else {
            self.engine.report(ControlWarning::NothingToPlay);
            return;
        };

        info!("Fetching track points for {} ({} .. {})", device, range.from, range.to);
        self.fetching = Some(session);
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            let result = source.track_points(&device, range).await;
            if let Some(commands) = loopback.upgrade() {
                let _ = commands.send(Command::Loaded { session, result });
            }
        });
    }

    fn loaded(&mut self, session: u64, result: PlaybackResult<Vec<TrackPoint>>) {
        if self.fetching == Some(session) {
            self.fetching = None;
        }
        if session != self.engine.session() {
            debug!("Discarding track points fetched for session {}", session);
            return;
        }

        match result {
            Ok(points) if points.is_empty() => self.engine.report(ControlWarning::NothingToPlay),
            Ok(points) => {
                self.engine.load_trajectory(points, &mut self.renderer);
                self.engine.play();
            }
            Err(e) => self.engine.report(ControlWarning::SourceFailed(e.to_string())),
        }
    }

    /// Answer a control call once its effects have been published
    fn reply(&mut self, reply: Reply) {
        self.publish();
        let _ = reply.send(self.engine.status());
    }

    fn publish(&mut self) {
        for event in self.engine.take_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        self.status.send_if_modified(|current| {
            let next = self.engine.status();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
