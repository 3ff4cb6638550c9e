use super::engine::RecordingConfig;
use super::timers::{TimerId, Timers};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Pressing,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Released,
    MaxDuration,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TakePhoto,
    StartRecording,
    StopRecording(StopReason),
    /// Fraction of the maximum duration elapsed, in [0, 1]
    Progress(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Timer {
    LongPress,
    MaxDuration,
    Progress,
}

/// Tap-for-photo / hold-to-record gesture handling
///
/// Idle -> Pressing on press. Releasing before the long-press threshold
/// takes a photo; holding past it starts a recording that ends on release or
/// at the duration cap, whichever comes first.
pub struct RecordingStateMachine {
    long_press: Duration,
    max_duration: Duration,
    progress_interval: Duration,
    mode: Mode,
    started_at: Option<Instant>,
    timers: Timers<Timer>,
    long_press_timer: Option<TimerId>,
}

impl RecordingStateMachine {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            long_press: config.long_press,
            max_duration: config.max_duration,
            progress_interval: config.progress_interval,
            mode: Mode::Idle,
            started_at: None,
            timers: Timers::default(),
            long_press_timer: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Progress of the live recording, 0 when idle
    pub fn progress(&self, now: Instant) -> f32 {
        match self.started_at {
            Some(start) if self.mode == Mode::Recording => self.fraction(start, now),
            _ => 0.0,
        }
    }

    fn fraction(&self, start: Instant, now: Instant) -> f32 {
        if self.max_duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(start);
        (elapsed.as_secs_f32() / self.max_duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Press on the capture control
    ///
    /// Ignored unless idle, so a press during a recording can never start a
    /// second one.
    pub fn press(&mut self, now: Instant) -> Vec<Command> {
        let commands = self.tick(now);
        match self.mode {
            Mode::Idle => {
                self.mode = Mode::Pressing;
                self.long_press_timer =
                    Some(self.timers.schedule(now + self.long_press, Timer::LongPress));
            }
            Mode::Pressing | Mode::Recording => {
                tracing::debug!("Press ignored in {:?}", self.mode);
            }
        }
        commands
    }

    /// Release of the capture control
    pub fn release(&mut self, now: Instant) -> Vec<Command> {
        let mut commands = self.tick(now);
        match self.mode {
            Mode::Pressing => {
                if let Some(id) = self.long_press_timer.take() {
                    self.timers.cancel(id);
                }
                self.mode = Mode::Idle;
                commands.push(Command::TakePhoto);
            }
            Mode::Recording => commands.extend(self.stop(StopReason::Released)),
            Mode::Idle => {}
        }
        commands
    }

    /// Fire due timers
    pub fn tick(&mut self, now: Instant) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Some((due, timer)) = self.timers.pop_due(now) {
            match (timer, self.mode) {
                (Timer::LongPress, Mode::Pressing) => {
                    self.long_press_timer = None;
                    self.mode = Mode::Recording;
                    self.started_at = Some(due);
                    self.timers
                        .schedule(due + self.max_duration, Timer::MaxDuration);
                    self.timers
                        .schedule(due + self.progress_interval, Timer::Progress);
                    tracing::info!("Long press, recording started");
                    commands.push(Command::StartRecording);
                    commands.push(Command::Progress(0.0));
                }
                (Timer::MaxDuration, Mode::Recording) => {
                    tracing::info!("Maximum recording duration reached");
                    commands.extend(self.stop(StopReason::MaxDuration));
                }
                (Timer::Progress, Mode::Recording) => {
                    if let Some(start) = self.started_at {
                        commands.push(Command::Progress(self.fraction(start, due)));
                    }
                    self.timers
                        .schedule(due + self.progress_interval, Timer::Progress);
                }
                (timer, mode) => {
                    tracing::debug!("Stale {:?} timer in {:?}", timer, mode);
                }
            }
        }
        commands
    }

    /// Abandon a recording that could not start (e.g. no codec)
    pub fn abort(&mut self) {
        if self.mode != Mode::Idle {
            tracing::warn!("Recording aborted");
        }
        self.reset();
    }

    fn stop(&mut self, reason: StopReason) -> Vec<Command> {
        self.reset();
        vec![Command::StopRecording(reason), Command::Progress(0.0)]
    }

    fn reset(&mut self) {
        self.timers.clear();
        self.long_press_timer = None;
        self.started_at = None;
        self.mode = Mode::Idle;
    }
}
