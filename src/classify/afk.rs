use std::time::Duration;

/// Decides whether the user left the computer based on time since the last input.
pub struct AfkEvaluator {
    threshold: Duration,
}

impl AfkEvaluator {
    pub fn from_seconds(threshold_s: u64) -> Self {
        Self {
            threshold: Duration::from_secs(threshold_s),
        }
    }

    pub fn is_afk(&self, idle_ms: u32) -> bool {
        Duration::from_millis(idle_ms as u64) > self.threshold
    }
}
