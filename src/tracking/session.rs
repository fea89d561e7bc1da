use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use tracing::{debug, info, warn};

use crate::{
    storage::{
        entities::{IntervalEntity, SessionEntity},
        session_storage::{read_session_document, write_session_document},
    },
    utils::time::{duration_to_seconds, format_duration},
};

use super::kind::ActivityKind;

const SESSION_ID_PREFIX: &str = "FocusDock";

/// A finalized stretch of time spent in a single [ActivityKind].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub kind: ActivityKind,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// The interval that hasn't been closed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenState {
    kind: ActivityKind,
    since: DateTime<Local>,
}

/// One tracked focus period.
///
/// A session is started once, receives a stream of classifications through
/// [Session::log_event_at] and is ended once. Only transitions are recorded: repeating the
/// current kind doesn't touch the event log, so a polling loop can report every sample.
/// Calls made in the wrong order (logging before start, anything after end) are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    open: Option<OpenState>,
    events: Vec<Interval>,
}

impl Session {
    /// Creates a session, generating a readable id from the current time when none is given.
    pub fn new(id: Option<String>) -> Self {
        let id = id.unwrap_or_else(|| generate_session_id(Local::now()));
        Self {
            id,
            start_time: None,
            end_time: None,
            open: None,
            events: vec![],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn current_state(&self) -> Option<&ActivityKind> {
        self.open.as_ref().map(|v| &v.kind)
    }

    pub fn state_start_time(&self) -> Option<DateTime<Local>> {
        self.open.as_ref().map(|v| v.since)
    }

    pub fn events(&self) -> &[Interval] {
        &self.events
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn start(&mut self) {
        self.start_at(Local::now())
    }

    /// Opens the session with a [ActivityKind::Present] interval.
    pub fn start_at(&mut self, time: DateTime<Local>) {
        if self.start_time.is_some() {
            warn!("Session {} was already started", self.id);
            return;
        }
        self.start_time = Some(time);
        self.open = Some(OpenState {
            kind: ActivityKind::Present,
            since: time,
        });
        info!("Session {} started at {}", self.id, time.format("%I:%M %p"));
    }

    pub fn log_event(&mut self, kind: ActivityKind) {
        self.log_event_at(kind, Local::now())
    }

    /// Records a classification. A different kind closes the open interval at `timestamp` and
    /// opens a new one, the same kind does nothing.
    pub fn log_event_at(&mut self, kind: ActivityKind, timestamp: DateTime<Local>) {
        if self.end_time.is_some() {
            debug!("Ignoring {kind} for ended session {}", self.id);
            return;
        }
        let Some(open) = self.open.take() else {
            debug!("Ignoring {kind} for session {} that wasn't started", self.id);
            return;
        };

        if open.kind == kind {
            self.open = Some(open);
            return;
        }

        self.finalize(open, timestamp);
        match kind {
            ActivityKind::Away => info!("Moved away from desk ({})", timestamp.format("%I:%M %p")),
            ActivityKind::Present => info!("Back at desk ({})", timestamp.format("%I:%M %p")),
            ActivityKind::GadgetSuspected => {
                info!("Phone usage detected ({})", timestamp.format("%I:%M %p"))
            }
            _ => debug!("State changed to {kind} ({})", timestamp.format("%I:%M %p")),
        }
        self.open = Some(OpenState {
            kind,
            since: timestamp,
        });
    }

    pub fn end(&mut self) {
        self.end_at(Local::now())
    }

    /// Closes the last open interval against `end_time` and freezes the session.
    pub fn end_at(&mut self, end_time: DateTime<Local>) {
        if self.start_time.is_none() {
            warn!("Session {} can't be ended before it's started", self.id);
            return;
        }
        if self.end_time.is_some() {
            warn!("Session {} was already ended", self.id);
            return;
        }

        if let Some(open) = self.open.take() {
            self.finalize(open, end_time);
        }
        self.end_time = Some(end_time);

        let duration = self.duration_at(end_time);
        info!("Session ended. Duration: {}", format_duration(duration));
    }

    /// Appends the closed interval. Intervals that would have no length are dropped.
    fn finalize(&mut self, open: OpenState, end: DateTime<Local>) {
        if end <= open.since {
            debug!(
                "Dropping empty {} interval at {} in session {}",
                open.kind, open.since, self.id
            );
            return;
        }
        self.events.push(Interval {
            kind: open.kind,
            start: open.since,
            end,
        });
    }

    pub fn duration(&self) -> Duration {
        self.duration_at(Local::now())
    }

    /// Elapsed time from start until the end, or until `now` while the session is running.
    pub fn duration_at(&self, now: DateTime<Local>) -> Duration {
        match self.start_time {
            Some(start) => self.end_time.unwrap_or(now) - start,
            None => Duration::zero(),
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        duration_to_seconds(self.duration())
    }

    /// Persisted form of the session.
    pub fn to_entity(&self) -> SessionEntity {
        SessionEntity {
            session_id: self.id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds(),
            events: self
                .events
                .iter()
                .map(|v| IntervalEntity {
                    kind: v.kind.clone(),
                    start: v.start,
                    end: v.end,
                    duration_seconds: duration_to_seconds(v.duration()),
                })
                .collect(),
        }
    }

    /// Rebuilds a session from its persisted form. Loaded sessions have no open interval, so
    /// an unfinished document stays frozen at its last transition.
    pub fn from_entity(entity: SessionEntity) -> Self {
        Self {
            id: entity.session_id,
            start_time: entity.start_time,
            end_time: entity.end_time,
            open: None,
            events: entity
                .events
                .into_iter()
                .map(|v| Interval {
                    kind: v.kind,
                    start: v.start,
                    end: v.end,
                })
                .collect(),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_session_document(path, &self.to_entity()).await
    }

    pub async fn load(path: &Path) -> Result<Session> {
        Ok(Self::from_entity(read_session_document(path).await?))
    }
}

/// Readable id such as `FocusDock Monday 02.45 PM`.
pub fn generate_session_id(now: DateTime<Local>) -> String {
    format!("{SESSION_ID_PREFIX} {}", now.format("%A %I.%M %p"))
}
