use std::time::Duration;

use tokio::time::Instant;

/// Source of the server's notion of "now", measured from start-up.
pub trait GameTiming: Send {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct ServerTiming {
    started: Instant,
}

impl ServerTiming {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for ServerTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTiming for ServerTiming {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualTiming(std::sync::Arc<std::sync::Mutex<Duration>>);

#[cfg(test)]
impl ManualTiming {
    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl GameTiming for ManualTiming {
    fn now(&self) -> Duration {
        *self.0.lock().unwrap()
    }
}
