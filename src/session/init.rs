use crate::capture::CameraError;

/// Start-up progress, usable by any front end
#[derive(Debug, Clone, PartialEq)]
pub enum InitState {
    NotStarted,
    Acquiring,
    Ready,
    Failed(CameraError),
}

#[derive(Debug)]
pub struct Initializer {
    state: InitState,
    attempts: u32,
}

impl Default for Initializer {
    fn default() -> Self {
        Self {
            state: InitState::NotStarted,
            attempts: 0,
        }
    }
}

impl Initializer {
    #[cfg(test)]
    pub fn state(&self) -> &InitState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Begin an acquisition attempt; only valid from NotStarted or Failed
    pub fn begin(&mut self) -> bool {
        match self.state {
            InitState::NotStarted | InitState::Failed(_) => {
                self.attempts += 1;
                self.state = InitState::Acquiring;
                tracing::info!("Initialization attempt {}", self.attempts);
                true
            }
            InitState::Acquiring | InitState::Ready => false,
        }
    }

    pub fn succeed(&mut self) {
        if self.state == InitState::Acquiring {
            self.state = InitState::Ready;
        }
    }

    pub fn fail(&mut self, reason: CameraError) {
        if self.state == InitState::Acquiring {
            tracing::error!("Initialization failed: {}", reason);
            self.state = InitState::Failed(reason);
        }
    }

    /// Message for the retry prompt, if initialization failed
    pub fn retry_message(&self) -> Option<String> {
        match &self.state {
            InitState::Failed(reason) => Some(reason.user_message()),
            _ => None,
        }
    }
}
