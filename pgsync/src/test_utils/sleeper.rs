use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::sync::retry::Sleeper;

/// A [`Sleeper`] that records the requested delays and returns right away.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);

        // Lets other workers make progress as a real wait would.
        tokio::task::yield_now().await;
    }
}
