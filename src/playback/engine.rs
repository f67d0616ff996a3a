use crate::config::PlaybackSettings;
use crate::core::{TimeRange, TrackPoint, Trajectory, VehicleId};
use crate::error::{PlaybackError, PlaybackResult};
use crate::halt::{HaltEvent, HaltTracker};
use crate::playback::{
    ControlWarning, PlaybackEvent, PlaybackPhase, PlaybackStatus, ScheduledTick, SpeedFactor, TickId,
};
use crate::renderer::Renderer;
use crate::stats::aggregate_daily;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a `play()` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    Resumed,
    AlreadyPlaying,
    /// Idle with nothing loaded; the caller may fetch a trajectory
    NeedsTrajectory,
    /// At the end; the cursor is never rewound implicitly
    Finished,
    NoDevice,
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Index of the sample handled by this tick
    pub index: usize,
    /// Cursor after the tick
    pub cursor: usize,
    /// Speed of the last drawn sample in km/h
    pub vehicle_speed: f64,
    /// False when the sample had no usable position
    pub rendered: bool,
    pub halt: Option<HaltEvent>,
}

/// Playback state machine for one session
///
/// Owns the trajectory, the cursor and the one pending tick. It never
/// sleeps: whoever drives it waits `pending_tick().interval` and then calls
/// `tick()` with that id. Every operation that changes timing replaces or
/// drops the pending tick, so a late tick from a cancelled schedule is
/// recognised as stale and ignored.
pub struct PlaybackEngine {
    settings: PlaybackSettings,
    trajectory: Trajectory,
    cursor: usize,
    phase: PlaybackPhase,
    speed: SpeedFactor,
    halts: HaltTracker,
    device: Option<VehicleId>,
    range: Option<TimeRange>,
    session: u64,
    pending: Option<ScheduledTick>,
    tick_counter: u64,
    /// Index of the sample currently shown as the vehicle marker
    current: Option<usize>,
    vehicle_speed: f64,
    events: Vec<PlaybackEvent>,
}

impl PlaybackEngine {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            settings,
            trajectory: Trajectory::empty(),
            cursor: 0,
            phase: PlaybackPhase::Idle,
            speed: SpeedFactor::NORMAL,
            halts: HaltTracker::new(),
            device: None,
            range: None,
            session: 0,
            pending: None,
            tick_counter: 0,
            current: None,
            vehicle_speed: 0.0,
            events: Vec::new(),
        }
    }

    /// Index of the next sample to emit
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn speed(&self) -> SpeedFactor {
        self.speed
    }

    pub fn tick_interval(&self) -> Duration {
        self.speed.tick_interval(&self.settings)
    }

    /// Lifetime of a halt notification; it lapses unless the next tick refreshes it
    pub fn notification_lifetime(&self) -> Duration {
        self.tick_interval() + self.settings.notification_grace()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn device(&self) -> Option<&VehicleId> {
        self.device.as_ref()
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn pending_tick(&self) -> Option<ScheduledTick> {
        self.pending
    }

    pub fn is_halted(&self) -> bool {
        self.halts.is_active()
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            device: self.device.clone(),
            cursor: self.cursor,
            len: self.trajectory.len(),
            phase: self.phase,
            speed_factor: self.speed.value(),
            tick_interval: self.tick_interval(),
            vehicle_speed: self.vehicle_speed,
            halted: self.halts.is_active(),
            session: self.session,
        }
    }

    /// Drain the events produced since the last call
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Publish an advisory warning
    pub fn report(&mut self, warning: ControlWarning) {
        warn!("{}", warning);
        self.events.push(PlaybackEvent::Warning(warning));
    }

    /// Replace the trajectory and rewind to the start, Idle
    pub fn load_trajectory(&mut self, points: Vec<TrackPoint>, renderer: &mut dyn Renderer) {
        self.reset_session(renderer);
        renderer.clear_all();

        self.trajectory = Trajectory::new(points);
        if self.device.is_none() {
            self.device = self.trajectory.vehicle().cloned();
        } else if let (Some(selected), Some(found)) = (&self.device, self.trajectory.vehicle()) {
            if selected != found {
                debug!("Loaded samples of {} while {} is selected", found, selected);
            }
        }

        info!(
            "Loaded {} track points for {}",
            self.trajectory.len(),
            self.device.as_ref().map(|d| d.as_str()).unwrap_or("<none>")
        );
        if let (Some(start), Some(end)) = (self.trajectory.start_time(), self.trajectory.end_time()) {
            debug!("Trajectory spans {} .. {}", start, end);
        }
        let unusable = self.trajectory.invalid_position_count();
        if unusable > 0 {
            warn!("{} track points have no usable position and will be skipped", unusable);
        }
        self.events.push(PlaybackEvent::TrajectoryLoaded {
            device: self.device.clone(),
            points: self.trajectory.len(),
        });
        self.events
            .push(PlaybackEvent::DailyStats(aggregate_daily(self.trajectory.points())));
    }

    /// Start or resume playback
    pub fn play(&mut self) -> PlayOutcome {
        if !self.require_device() {
            return PlayOutcome::NoDevice;
        }

        match self.phase {
            PlaybackPhase::Playing => PlayOutcome::AlreadyPlaying,
            PlaybackPhase::Finished => {
                debug!("Play ignored: trajectory already finished");
                PlayOutcome::Finished
            }
            PlaybackPhase::Idle if self.trajectory.is_empty() => PlayOutcome::NeedsTrajectory,
            PlaybackPhase::Idle | PlaybackPhase::Paused => {
                let resumed = self.phase == PlaybackPhase::Paused;
                self.set_phase(PlaybackPhase::Playing);
                self.schedule_next();
                if resumed {
                    debug!("Resuming at {}/{}", self.cursor, self.trajectory.len());
                    PlayOutcome::Resumed
                } else {
                    PlayOutcome::Started
                }
            }
        }
    }

    /// Stop ticking and keep the cursor where it is
    pub fn pause(&mut self) {
        if !self.require_device() {
            return;
        }
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        self.cancel();
        self.set_phase(PlaybackPhase::Paused);
        debug!("Paused at {}/{}", self.cursor, self.trajectory.len());
    }

    /// Set an explicit speed factor; the running schedule restarts at the new interval
    pub fn set_speed(&mut self, factor: f64) -> PlaybackResult<()> {
        let speed = SpeedFactor::new(factor, self.settings.fast_floor)
            .ok_or(PlaybackError::InvalidSpeed(factor))?;
        self.apply_speed(speed);
        Ok(())
    }

    pub fn slow(&mut self) {
        if !self.speed_control_allowed() {
            return;
        }
        if let Some(speed) = SpeedFactor::new(self.settings.slow_factor, self.settings.fast_floor) {
            self.apply_speed(speed);
        }
    }

    /// Halve the factor, i.e. shorten the interval, down to the floor
    pub fn fast(&mut self) {
        if !self.speed_control_allowed() {
            return;
        }
        let speed = self.speed.halved(self.settings.fast_floor);
        self.apply_speed(speed);
    }

    /// Drop the trajectory and return to an empty, centered map; keeps the device
    pub fn clear(&mut self, renderer: &mut dyn Renderer) {
        let had_points = !self.trajectory.is_empty();
        self.reset_session(renderer);
        self.trajectory = Trajectory::empty();
        renderer.clear_all();
        renderer.recenter_default(self.settings.default_view);

        if had_points {
            self.events.push(PlaybackEvent::DailyStats(Vec::new()));
        }
        debug!("Cleared session {}", self.session);
    }

    /// Switch to another vehicle; anything loaded or loading for the old one is dropped
    pub fn select_device(&mut self, device: VehicleId, renderer: &mut dyn Renderer) {
        self.clear(renderer);
        info!("Selected device {}", device);
        self.device = Some(device.clone());
        self.events.push(PlaybackEvent::DeviceSelected(device));
    }

    /// A new date range replaces the trajectory just like a device switch
    pub fn set_time_range(&mut self, range: TimeRange, renderer: &mut dyn Renderer) {
        self.clear(renderer);
        self.range = Some(range);
    }

    /// Run the tick `id`; stale ids and ticks outside Playing do nothing
    pub fn tick(&mut self, id: TickId, renderer: &mut dyn Renderer) -> Option<TickOutcome> {
        match self.pending {
            Some(pending) if pending.id == id => self.pending = None,
            _ => {
                debug!("Ignoring stale tick {:?}", id);
                return None;
            }
        }
        if self.phase != PlaybackPhase::Playing {
            return None;
        }

        if self.cursor >= self.trajectory.len() {
            self.finish(renderer);
            return None;
        }

        let index = self.cursor;
        let point = self.trajectory.get(index)?.clone();

        let Some(position) = point.valid_position() else {
            warn!("Skipping track point {} without a valid position: {:?}", index, point.position);
            self.cursor += 1;
            self.events.push(PlaybackEvent::PointSkipped { index });
            self.publish_cursor();
            self.schedule_next();
            return Some(TickOutcome {
                index,
                cursor: self.cursor,
                vehicle_speed: self.vehicle_speed,
                rendered: false,
                halt: None,
            });
        };

        let halt = self.halts.observe(&point);
        if let Some(event) = &halt {
            self.apply_halt(event, renderer);
        }

        if let Some(previous) = self.current.and_then(|i| self.trajectory.get(i)) {
            renderer.append_history(previous);
        }
        renderer.set_current_position(&point);
        renderer.pan_to(position);
        self.current = Some(index);

        self.cursor += 1;
        self.vehicle_speed = point.speed_or_zero();
        self.publish_cursor();
        self.schedule_next();

        Some(TickOutcome {
            index,
            cursor: self.cursor,
            vehicle_speed: self.vehicle_speed,
            rendered: true,
            halt,
        })
    }

    /// Cancel the schedule and let go of the renderer; called when the host disposes the session
    pub fn teardown(&mut self, renderer: &mut dyn Renderer) {
        self.cancel();
        if let Some(event) = self.halts.reset() {
            self.apply_halt(&event, renderer);
        }
        renderer.release();
        debug!("Playback torn down at {}/{}", self.cursor, self.trajectory.len());
    }

    fn require_device(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }
        self.report(ControlWarning::DeviceNotSelected);
        false
    }

    fn speed_control_allowed(&mut self) -> bool {
        if !self.require_device() {
            return false;
        }
        if self.trajectory.is_empty() {
            debug!("Speed change ignored: nothing loaded");
            return false;
        }
        true
    }

    fn apply_speed(&mut self, speed: SpeedFactor) {
        self.speed = speed;
        let interval = self.tick_interval();
        debug!("Speed factor {} ({}ms per tick)", speed.value(), interval.as_millis());
        self.events.push(PlaybackEvent::SpeedChanged {
            factor: speed.value(),
            interval,
        });

        if self.phase == PlaybackPhase::Playing {
            self.cancel();
            self.schedule_next();
        }
    }

    fn apply_halt(&mut self, event: &HaltEvent, renderer: &mut dyn Renderer) {
        match event {
            HaltEvent::Started(notice) | HaltEvent::Updated(notice) => {
                renderer.notify(&notice.id, &notice.message(), self.notification_lifetime());
            }
            HaltEvent::Ended { id, .. } => renderer.dismiss(id),
        }
        self.events.push(PlaybackEvent::Halt(event.clone()));
    }

    fn finish(&mut self, renderer: &mut dyn Renderer) {
        self.cancel();
        if let Some(event) = self.halts.reset() {
            self.apply_halt(&event, renderer);
        }
        self.set_phase(PlaybackPhase::Finished);
        info!("Playback finished after {} points", self.trajectory.len());
    }

    /// Shared by load, clear and device/range changes
    fn reset_session(&mut self, renderer: &mut dyn Renderer) {
        self.cancel();
        self.session += 1;
        if let Some(event) = self.halts.reset() {
            self.apply_halt(&event, renderer);
        }
        self.cursor = 0;
        self.current = None;
        self.vehicle_speed = 0.0;
        self.set_phase(PlaybackPhase::Idle);
    }

    fn schedule_next(&mut self) {
        self.tick_counter += 1;
        self.pending = Some(ScheduledTick {
            id: TickId(self.tick_counter),
            interval: self.tick_interval(),
        });
    }

    fn cancel(&mut self) {
        self.pending = None;
    }

    fn set_phase(&mut self, phase: PlaybackPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.events.push(PlaybackEvent::PhaseChanged(phase));
        }
    }

    fn publish_cursor(&mut self) {
        self.events.push(PlaybackEvent::CursorAdvanced {
            cursor: self.cursor,
            vehicle_speed: self.vehicle_speed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LonLat;
    use crate::halt::NotificationId;
    use crate::renderer::{RecordingRenderer, RenderCall};
    use chrono::{Duration as ChronoDuration, NaiveDateTime};

    fn base_time() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2023-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn point(minute: i64) -> TrackPoint {
        let mut p = TrackPoint::new(
            VehicleId::new("WAGON-1"),
            base_time() + ChronoDuration::minutes(minute),
            LonLat::new(77.0 + minute as f64 * 0.01, 23.0),
        );
        p.speed = Some(30.0 + minute as f64);
        p
    }

    fn halted(minute: i64) -> TrackPoint {
        let mut p = point(minute);
        p.is_halted = true;
        p.speed = Some(0.0);
        p
    }

    fn loaded(points: Vec<TrackPoint>) -> (PlaybackEngine, RecordingRenderer) {
        let mut renderer = RecordingRenderer::new();
        let mut engine = PlaybackEngine::new(PlaybackSettings::default());
        engine.select_device(VehicleId::new("WAGON-1"), &mut renderer);
        engine.load_trajectory(points, &mut renderer);
        renderer.take_calls();
        engine.take_events();
        (engine, renderer)
    }

    /// Fire whatever tick is pending
    fn fire(engine: &mut PlaybackEngine, renderer: &mut RecordingRenderer) -> Option<TickOutcome> {
        let pending = engine.pending_tick()?;
        engine.tick(pending.id, renderer)
    }

    #[test]
    fn test_load_resets_and_publishes_stats() {
        let mut renderer = RecordingRenderer::new();
        let mut engine = PlaybackEngine::new(PlaybackSettings::default());
        engine.load_trajectory(vec![point(0), point(1)], &mut renderer);

        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(engine.pending_tick().is_none());
        // Device adopted from the samples
        assert_eq!(engine.device(), Some(&VehicleId::new("WAGON-1")));
        assert_eq!(renderer.calls(), vec![RenderCall::ClearAll]);

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(e, PlaybackEvent::TrajectoryLoaded { points: 2, .. })));
        assert!(events.iter().any(|e| matches!(e, PlaybackEvent::DailyStats(rows) if rows.len() == 1)));
    }

    #[test]
    fn test_play_schedules_one_tick() {
        let (mut engine, _renderer) = loaded(vec![point(0), point(1)]);
        assert_eq!(engine.play(), PlayOutcome::Started);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);

        let pending = engine.pending_tick().unwrap();
        assert_eq!(pending.interval, Duration::from_millis(1000));

        // Repeated play is a no-op and keeps the same schedule
        assert_eq!(engine.play(), PlayOutcome::AlreadyPlaying);
        assert_eq!(engine.pending_tick(), Some(pending));
    }

    #[test]
    fn test_tick_renders_and_demotes_previous() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();

        let first = fire(&mut engine, &mut renderer).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.cursor, 1);
        assert!(first.rendered);
        assert_eq!(
            renderer.take_calls(),
            vec![
                RenderCall::SetCurrent(point(0)),
                RenderCall::PanTo(point(0).position.unwrap()),
            ]
        );

        let second = fire(&mut engine, &mut renderer).unwrap();
        assert_eq!(second.vehicle_speed, 31.0);
        assert_eq!(
            renderer.take_calls(),
            vec![
                RenderCall::AppendHistory(point(0)),
                RenderCall::SetCurrent(point(1)),
                RenderCall::PanTo(point(1).position.unwrap()),
            ]
        );
        assert_eq!(engine.status().vehicle_speed, 31.0);
    }

    #[test]
    fn test_end_of_trajectory_finishes() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();
        fire(&mut engine, &mut renderer);
        fire(&mut engine, &mut renderer);
        assert_eq!(engine.cursor(), 2);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);

        // The tick after the last sample ends playback without touching the renderer
        renderer.take_calls();
        assert!(fire(&mut engine, &mut renderer).is_none());
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert!(engine.pending_tick().is_none());
        assert!(renderer.calls().is_empty());

        assert_eq!(engine.play(), PlayOutcome::Finished);
        assert!(engine.pending_tick().is_none());
        assert_eq!(engine.cursor(), 2);
    }

    #[test]
    fn test_pause_is_idempotent_and_preserves_cursor() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1), point(2)]);
        engine.play();
        fire(&mut engine, &mut renderer);

        engine.pause();
        let after_first = (engine.cursor(), engine.phase());
        assert_eq!(after_first, (1, PlaybackPhase::Paused));
        assert!(engine.pending_tick().is_none());

        engine.pause();
        assert_eq!((engine.cursor(), engine.phase()), after_first);

        // Resume continues from the cursor, never from 0
        assert_eq!(engine.play(), PlayOutcome::Resumed);
        let outcome = fire(&mut engine, &mut renderer).unwrap();
        assert_eq!(outcome.index, 1);
    }

    #[test]
    fn test_pause_while_idle_is_noop() {
        let (mut engine, _renderer) = loaded(vec![point(0)]);
        engine.pause();
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_cancelled_tick_is_stale() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();
        let old = engine.pending_tick().unwrap();

        engine.pause();
        assert!(engine.tick(old.id, &mut renderer).is_none());
        assert_eq!(engine.cursor(), 0);

        engine.play();
        assert!(engine.tick(old.id, &mut renderer).is_none());
        assert_eq!(engine.cursor(), 0);
        assert!(renderer.calls().is_empty());
    }

    #[test]
    fn test_speed_change_reschedules_at_new_interval() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();
        let before = engine.pending_tick().unwrap();

        engine.slow();
        let after = engine.pending_tick().unwrap();
        assert_ne!(before.id, after.id);
        assert_eq!(after.interval, Duration::from_millis(2000));
        assert!(engine.tick(before.id, &mut renderer).is_none());

        engine.fast();
        assert_eq!(engine.pending_tick().unwrap().interval, Duration::from_millis(1000));
        assert_eq!(engine.speed().value(), 1.0);
    }

    #[test]
    fn test_speed_change_while_paused_keeps_schedule_empty() {
        let (mut engine, _renderer) = loaded(vec![point(0)]);
        engine.play();
        engine.pause();
        engine.slow();
        assert!(engine.pending_tick().is_none());
        assert_eq!(engine.play(), PlayOutcome::Resumed);
        assert_eq!(engine.pending_tick().unwrap().interval, Duration::from_millis(2000));
    }

    #[test]
    fn test_fast_floor() {
        let (mut engine, _renderer) = loaded(vec![point(0)]);
        engine.play();
        for _ in 0..20 {
            engine.fast();
            assert!(engine.speed().value() >= 0.125);
            assert!(engine.tick_interval() >= Duration::from_millis(500));
        }
        assert_eq!(engine.speed().value(), 0.125);
        assert_eq!(engine.pending_tick().unwrap().interval, Duration::from_millis(500));
    }

    #[test]
    fn test_set_speed_validation() {
        let (mut engine, _renderer) = loaded(vec![point(0)]);
        assert!(matches!(engine.set_speed(0.0), Err(PlaybackError::InvalidSpeed(_))));
        assert!(engine.set_speed(f64::NAN).is_err());
        engine.set_speed(0.01).unwrap();
        assert_eq!(engine.speed().value(), 0.125);
        engine.set_speed(3.0).unwrap();
        assert_eq!(engine.tick_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn test_oversized_speed_is_rejected() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();
        let pending = engine.pending_tick().unwrap();

        assert!(matches!(engine.set_speed(1e20), Err(PlaybackError::InvalidSpeed(_))));
        assert!(engine.set_speed(f64::MAX).is_err());
        // The running schedule is untouched
        assert_eq!(engine.pending_tick(), Some(pending));
        assert_eq!(engine.speed(), SpeedFactor::NORMAL);

        engine.set_speed(SpeedFactor::MAX).unwrap();
        assert!(engine.tick_interval() <= Duration::from_secs(3600));
        assert!(fire(&mut engine, &mut renderer).is_some());
    }

    #[test]
    fn test_speed_controls_need_a_trajectory() {
        let mut renderer = RecordingRenderer::new();
        let mut engine = PlaybackEngine::new(PlaybackSettings::default());
        engine.select_device(VehicleId::new("WAGON-1"), &mut renderer);
        engine.take_events();

        engine.slow();
        engine.fast();
        assert_eq!(engine.speed(), SpeedFactor::NORMAL);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_invalid_position_is_skipped() {
        let mut broken = point(1);
        broken.position = None;
        let (mut engine, mut renderer) = loaded(vec![point(0), broken, point(2)]);
        engine.play();

        fire(&mut engine, &mut renderer);
        renderer.take_calls();

        let skipped = fire(&mut engine, &mut renderer).unwrap();
        assert!(!skipped.rendered);
        assert_eq!(skipped.cursor, 2);
        assert!(renderer.calls().is_empty());
        assert!(engine.pending_tick().is_some());

        // The trail continues from the last drawn sample
        fire(&mut engine, &mut renderer);
        assert_eq!(renderer.calls()[0], RenderCall::AppendHistory(point(0)));
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::PointSkipped { index: 1 })));
    }

    #[test]
    fn test_halt_run_uses_single_notification() {
        let (mut engine, mut renderer) = loaded(vec![halted(0), halted(10), halted(75), point(80)]);
        engine.play();
        for _ in 0..4 {
            fire(&mut engine, &mut renderer);
        }

        let id = NotificationId::halt(&VehicleId::new("WAGON-1"));
        let notifies: Vec<RenderCall> = renderer
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RenderCall::Notify { .. }))
            .collect();
        assert_eq!(notifies.len(), 3);
        for call in &notifies {
            match call {
                RenderCall::Notify { id: got, duration, .. } => {
                    assert_eq!(got, &id);
                    assert_eq!(*duration, Duration::from_millis(1200));
                }
                _ => unreachable!(),
            }
        }
        match &notifies[2] {
            RenderCall::Notify { content, .. } => assert!(content.contains("1 hr 15 min")),
            _ => unreachable!(),
        }

        assert_eq!(renderer.count(|c| matches!(c, RenderCall::Dismiss(d) if d == &id)), 1);
        assert!(!engine.is_halted());
    }

    #[test]
    fn test_notification_lifetime_tracks_speed() {
        let (mut engine, mut renderer) = loaded(vec![halted(0)]);
        engine.play();
        engine.slow();
        fire(&mut engine, &mut renderer);
        assert!(renderer.calls().iter().any(|c| matches!(
            c,
            RenderCall::Notify { duration, .. } if *duration == Duration::from_millis(2200)
        )));
    }

    #[test]
    fn test_clear_resets_fully() {
        let (mut engine, mut renderer) = loaded(vec![halted(0), halted(5), point(6)]);
        engine.play();
        fire(&mut engine, &mut renderer);
        fire(&mut engine, &mut renderer);
        assert!(engine.is_halted());
        renderer.take_calls();

        engine.clear(&mut renderer);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(!engine.is_halted());
        assert!(engine.pending_tick().is_none());
        assert!(engine.trajectory().is_empty());
        // Device survives a clear
        assert_eq!(engine.device(), Some(&VehicleId::new("WAGON-1")));

        let calls = renderer.calls();
        assert!(calls.contains(&RenderCall::ClearAll));
        assert!(calls.contains(&RenderCall::RecenterDefault(engine.settings().default_view)));
        assert_eq!(calls.iter().filter(|c| matches!(c, RenderCall::Dismiss(_))).count(), 1);

        // Clearing twice is harmless
        engine.clear(&mut renderer);
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_select_device_bumps_session() {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1)]);
        engine.play();
        fire(&mut engine, &mut renderer);
        let session = engine.session();

        engine.select_device(VehicleId::new("WAGON-2"), &mut renderer);
        assert!(engine.session() > session);
        assert_eq!(engine.cursor(), 0);
        assert!(engine.trajectory().is_empty());
        assert!(engine.pending_tick().is_none());
        assert_eq!(engine.device(), Some(&VehicleId::new("WAGON-2")));
        assert_eq!(engine.play(), PlayOutcome::NeedsTrajectory);
    }

    /// Play one tick, then hand the engine and the id of the tick now pending
    fn playing_with_pending_tick() -> (PlaybackEngine, RecordingRenderer, TickId) {
        let (mut engine, mut renderer) = loaded(vec![point(0), point(1), point(2)]);
        engine.play();
        fire(&mut engine, &mut renderer);
        let pending = engine.pending_tick().unwrap();
        renderer.take_calls();
        (engine, renderer, pending.id)
    }

    fn assert_schedule_dropped(engine: &mut PlaybackEngine, renderer: &mut RecordingRenderer, old: TickId) {
        assert!(engine.pending_tick().is_none());
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.phase(), PlaybackPhase::Idle);

        renderer.take_calls();
        assert!(engine.tick(old, renderer).is_none());
        assert!(renderer.calls().is_empty());
        assert_eq!(engine.cursor(), 0);
    }

    #[test]
    fn test_reload_while_playing_cancels_tick() {
        let (mut engine, mut renderer, old) = playing_with_pending_tick();
        engine.load_trajectory(vec![point(10), point(11)], &mut renderer);
        assert_eq!(renderer.calls(), vec![RenderCall::ClearAll]);
        assert_schedule_dropped(&mut engine, &mut renderer, old);
    }

    #[test]
    fn test_select_device_while_playing_cancels_tick() {
        let (mut engine, mut renderer, old) = playing_with_pending_tick();
        engine.select_device(VehicleId::new("WAGON-2"), &mut renderer);
        assert_schedule_dropped(&mut engine, &mut renderer, old);
    }

    #[test]
    fn test_time_range_while_playing_cancels_tick() {
        let (mut engine, mut renderer, old) = playing_with_pending_tick();
        let range = TimeRange::new(base_time(), base_time() + ChronoDuration::hours(1));
        engine.set_time_range(range, &mut renderer);
        assert_eq!(engine.time_range(), Some(range));
        assert_schedule_dropped(&mut engine, &mut renderer, old);
    }

    #[test]
    fn test_clear_while_playing_cancels_tick() {
        let (mut engine, mut renderer, old) = playing_with_pending_tick();
        engine.clear(&mut renderer);
        assert_schedule_dropped(&mut engine, &mut renderer, old);
    }

    #[test]
    fn test_controls_without_device_warn() {
        let mut engine = PlaybackEngine::new(PlaybackSettings::default());
        assert_eq!(engine.play(), PlayOutcome::NoDevice);
        engine.pause();
        engine.fast();

        let warnings = engine
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::Warning(ControlWarning::DeviceNotSelected)))
            .count();
        assert_eq!(warnings, 3);

        // Clear needs no device
        let mut renderer = RecordingRenderer::new();
        engine.clear(&mut renderer);
        assert!(renderer.calls().contains(&RenderCall::ClearAll));
    }

    #[test]
    fn test_teardown_cancels_and_releases() {
        let (mut engine, mut renderer) = loaded(vec![halted(0), point(1)]);
        engine.play();
        fire(&mut engine, &mut renderer);
        let pending = engine.pending_tick().unwrap();

        engine.teardown(&mut renderer);
        assert!(engine.pending_tick().is_none());
        assert!(engine.tick(pending.id, &mut renderer).is_none());
        let calls = renderer.calls();
        assert_eq!(calls.last(), Some(&RenderCall::Release));
        assert!(calls.iter().any(|c| matches!(c, RenderCall::Dismiss(_))));
    }

    #[test]
    fn test_cursor_is_monotonic_under_controls() {
        let points: Vec<TrackPoint> = (0..40).map(point).collect();
        let (mut engine, mut renderer) = loaded(points);

        // Deterministic pseudo-random sequence of controls and ticks
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut last_cursor = 0;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            match seed % 6 {
                0 => {
                    engine.play();
                }
                1 => engine.pause(),
                2 => engine.slow(),
                3 => engine.fast(),
                _ => {
                    fire(&mut engine, &mut renderer);
                }
            }
            assert!(engine.cursor() >= last_cursor);
            assert!(engine.cursor() <= engine.trajectory().len());
            assert!(engine.tick_interval() >= Duration::from_millis(500));
            if engine.phase() != PlaybackPhase::Playing {
                assert!(engine.pending_tick().is_none());
            }
            last_cursor = engine.cursor();
        }
    }
}
