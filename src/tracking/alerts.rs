use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::kind::ActivityKind;

/// One step of the escalation: after `after` of continuous unfocused time the user is shown
/// `badge` and `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertLevel {
    pub after: Duration,
    pub badge: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    Quiet,
    /// The level with this index became due.
    Fire(usize),
    /// The user came back after an unfocused stretch, visible alerts should go away.
    Refocused,
}

/// Tracks how long the user has been unfocused, independently of the session event log.
///
/// Levels fire in order, each at most once per unfocused stretch and at most one per
/// observation. Once all levels fired nothing else happens until the user refocuses.
pub struct AlertEscalation {
    levels: Vec<AlertLevel>,
    unfocused_since: Option<Instant>,
    fired: usize,
}

impl AlertEscalation {
    pub fn new(mut levels: Vec<AlertLevel>) -> Self {
        levels.sort_by_key(|v| v.after);
        Self {
            levels,
            unfocused_since: None,
            fired: 0,
        }
    }

    pub fn level(&self, index: usize) -> Option<&AlertLevel> {
        self.levels.get(index)
    }

    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Continuous unfocused time as of `now`, zero while focused.
    pub fn unfocused_for(&self, now: Instant) -> Duration {
        self.unfocused_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    pub fn observe(&mut self, kind: &ActivityKind, now: Instant) -> AlertDecision {
        if !kind.is_unfocused() {
            let was_tracking = self.unfocused_since.take().is_some();
            self.fired = 0;
            if was_tracking {
                debug!("User refocused, resetting alert tracking");
                return AlertDecision::Refocused;
            }
            return AlertDecision::Quiet;
        }

        let since = *self.unfocused_since.get_or_insert_with(|| {
            debug!("Started tracking unfocused time");
            now
        });
        let unfocused = now.saturating_duration_since(since);

        match self.levels.get(self.fired) {
            Some(level) if unfocused >= level.after => {
                let index = self.fired;
                self.fired += 1;
                AlertDecision::Fire(index)
            }
            _ => AlertDecision::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::tracking::kind::ActivityKind;

    use super::{AlertDecision, AlertEscalation, AlertLevel};

    fn levels() -> Vec<AlertLevel> {
        [20, 60, 120]
            .into_iter()
            .map(|s| AlertLevel {
                after: Duration::from_secs(s),
                badge: format!("badge {s}"),
                message: format!("message {s}"),
            })
            .collect()
    }

    fn observe_at(
        escalation: &mut AlertEscalation,
        start: Instant,
        seconds: u64,
        kind: ActivityKind,
    ) -> AlertDecision {
        escalation.observe(&kind, start + Duration::from_secs(seconds))
    }

    #[test]
    fn test_fires_each_level_once() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());

        let decisions = (0..=150)
            .step_by(3)
            .map(|s| observe_at(&mut escalation, start, s, ActivityKind::Away))
            .filter(|v| *v != AlertDecision::Quiet)
            .collect::<Vec<_>>();

        assert_eq!(
            decisions,
            vec![
                AlertDecision::Fire(0),
                AlertDecision::Fire(1),
                AlertDecision::Fire(2)
            ]
        );
        assert_eq!(escalation.fired(), 3);
    }

    #[test]
    fn test_first_alert_at_threshold() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());
        assert_eq!(observe_at(&mut escalation, start, 0, ActivityKind::Away), AlertDecision::Quiet);
        assert_eq!(observe_at(&mut escalation, start, 19, ActivityKind::Away), AlertDecision::Quiet);
        assert_eq!(
            observe_at(&mut escalation, start, 20, ActivityKind::GadgetSuspected),
            AlertDecision::Fire(0)
        );
        assert_eq!(escalation.unfocused_for(start + Duration::from_secs(25)), Duration::from_secs(25));
    }

    #[test]
    fn test_one_alert_per_observation() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());
        observe_at(&mut escalation, start, 0, ActivityKind::Away);
        // A long gap between samples still only fires the next level
        assert_eq!(observe_at(&mut escalation, start, 200, ActivityKind::Away), AlertDecision::Fire(0));
        assert_eq!(observe_at(&mut escalation, start, 201, ActivityKind::Away), AlertDecision::Fire(1));
        assert_eq!(observe_at(&mut escalation, start, 202, ActivityKind::Away), AlertDecision::Fire(2));
        assert_eq!(observe_at(&mut escalation, start, 500, ActivityKind::Away), AlertDecision::Quiet);
    }

    #[test]
    fn test_refocus_resets() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());
        observe_at(&mut escalation, start, 0, ActivityKind::Away);
        assert_eq!(observe_at(&mut escalation, start, 30, ActivityKind::Away), AlertDecision::Fire(0));
        assert_eq!(
            observe_at(&mut escalation, start, 33, ActivityKind::Present),
            AlertDecision::Refocused
        );
        assert_eq!(escalation.fired(), 0);
        assert_eq!(observe_at(&mut escalation, start, 36, ActivityKind::Present), AlertDecision::Quiet);

        // The timer starts over from the next unfocused sample
        assert_eq!(observe_at(&mut escalation, start, 40, ActivityKind::Away), AlertDecision::Quiet);
        assert_eq!(observe_at(&mut escalation, start, 59, ActivityKind::Away), AlertDecision::Quiet);
        assert_eq!(observe_at(&mut escalation, start, 60, ActivityKind::Away), AlertDecision::Fire(0));
    }

    #[test]
    fn test_switching_between_unfocused_kinds_keeps_timer() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());
        observe_at(&mut escalation, start, 0, ActivityKind::Away);
        observe_at(&mut escalation, start, 10, ActivityKind::ScreenDistraction);
        assert_eq!(
            observe_at(&mut escalation, start, 20, ActivityKind::GadgetSuspected),
            AlertDecision::Fire(0)
        );
    }

    #[test]
    fn test_paused_counts_as_focused() {
        let start = Instant::now();
        let mut escalation = AlertEscalation::new(levels());
        observe_at(&mut escalation, start, 0, ActivityKind::Away);
        assert_eq!(
            observe_at(&mut escalation, start, 10, ActivityKind::Paused),
            AlertDecision::Refocused
        );
        assert_eq!(observe_at(&mut escalation, start, 50, ActivityKind::Paused), AlertDecision::Quiet);
    }

    #[test]
    fn test_levels_are_sorted() {
        let mut unordered = levels();
        unordered.reverse();
        let escalation = AlertEscalation::new(unordered);
        assert_eq!(escalation.level(0).map(|v| v.after), Some(Duration::from_secs(20)));
        assert!(escalation.level(3).is_none());
    }
}
