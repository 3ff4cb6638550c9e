use std::time::{Duration, Instant};

/// Hidden calibration gesture: N quick taps toggle keying debug mode
pub struct TapCounter {
    required: u32,
    window: Duration,
    count: u32,
    last_tap: Option<Instant>,
}

impl Default for TapCounter {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}

impl TapCounter {
    pub fn new(required: u32, window: Duration) -> Self {
        Self {
            required: required.max(1),
            window,
            count: 0,
            last_tap: None,
        }
    }

    /// Register a tap; true when it completes the gesture
    pub fn tap(&mut self, now: Instant) -> bool {
        let in_window = self
            .last_tap
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);
        self.count = if in_window { self.count + 1 } else { 1 };
        self.last_tap = Some(now);

        if self.count >= self.required {
            self.count = 0;
            self.last_tap = None;
            return true;
        }
        false
    }
}
