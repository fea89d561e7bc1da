use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{classify::Classifier, notify::AlertNotifier, utils::clock::Clock};

use super::{
    alerts::{AlertDecision, AlertEscalation},
    display::{update_display, SharedDisplay},
    kind::ActivityKind,
    session::Session,
};

/// Polls the classifier at a fixed cadence and feeds every result into the session, the
/// alert escalation and the status display.
pub struct DetectionLoop {
    classifier: Box<dyn Classifier>,
    notifier: Box<dyn AlertNotifier>,
    alerts: AlertEscalation,
    session: Session,
    display: SharedDisplay,
    shutdown: CancellationToken,
    detection_interval: Duration,
    time_provider: Arc<dyn Clock>,
}

impl DetectionLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Box<dyn Classifier>,
        notifier: Box<dyn AlertNotifier>,
        alerts: AlertEscalation,
        session: Session,
        display: SharedDisplay,
        shutdown: CancellationToken,
        detection_interval: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            classifier,
            notifier,
            alerts,
            session,
            display,
            shutdown,
            detection_interval,
            time_provider,
        }
    }

    fn process(&mut self, kind: ActivityKind) {
        let now = self.time_provider.time();
        if !self.session.is_started() {
            self.session.start_at(now);
            update_display(&self.display, |v| v.started_at = Some(now));
        }

        let instant = self.time_provider.instant();
        match self.alerts.observe(&kind, instant) {
            AlertDecision::Fire(index) => {
                if let Some(level) = self.alerts.level(index) {
                    info!(
                        "Unfocused for {:?}, alert {}: {}",
                        self.alerts.unfocused_for(instant),
                        level.badge,
                        level.message
                    );
                    if let Err(e) = self.notifier.alert(level) {
                        warn!("Failed to show alert {e:?}");
                    }
                }
            }
            AlertDecision::Refocused => {
                if let Err(e) = self.notifier.dismiss() {
                    warn!("Failed to dismiss alerts {e:?}");
                }
            }
            AlertDecision::Quiet => (),
        }

        self.session.log_event_at(kind.clone(), now);
        update_display(&self.display, |v| v.status = Some(kind));
    }

    /// Executes the detection event loop. The session starts with the first successful
    /// classification and is ended at the moment cancellation was observed.
    #[instrument(skip(self), fields(session = self.session.id()))]
    pub async fn run(mut self) -> Result<Session> {
        let mut collection_point = self.time_provider.instant();
        let stop_time = loop {
            collection_point += self.detection_interval;

            // A slow classification must not delay stopping.
            let classified = tokio::select! {
                _ = self.shutdown.cancelled() => break self.time_provider.time(),
                result = self.classifier.classify() => result,
            };
            if self.shutdown.is_cancelled() {
                break self.time_provider.time();
            }

            match classified {
                Ok(kind) => {
                    debug!("Classified as {kind}");
                    self.process(kind);
                }
                Err(e) => error!("Encountered an error during classification {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break self.time_provider.time(),
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        };

        if self.session.is_started() {
            self.session.end_at(stop_time);
        } else {
            warn!("Stopped before the first successful classification, nothing was tracked");
        }
        Ok(self.session)
    }
}
