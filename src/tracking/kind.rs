use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};

pub const PRESENT: &str = "present";
pub const AWAY: &str = "away";
pub const GADGET_SUSPECTED: &str = "gadget_suspected";
pub const SCREEN_DISTRACTION: &str = "screen_distraction";
pub const PAUSED: &str = "paused";

/// Older documents and classifiers report phone usage under this label.
const PHONE_SUSPECTED_ALIAS: &str = "phone_suspected";

/// Classification of what the user is doing at a sample point.
///
/// Labels the application doesn't know about are kept as [ActivityKind::Other] instead of being
/// rejected, deciding what a label means is the job of whoever produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Present,
    Away,
    GadgetSuspected,
    ScreenDistraction,
    Paused,
    Other(Arc<str>),
}

impl ActivityKind {
    pub fn label(&self) -> &str {
        match self {
            ActivityKind::Present => PRESENT,
            ActivityKind::Away => AWAY,
            ActivityKind::GadgetSuspected => GADGET_SUSPECTED,
            ActivityKind::ScreenDistraction => SCREEN_DISTRACTION,
            ActivityKind::Paused => PAUSED,
            ActivityKind::Other(label) => label.as_ref(),
        }
    }

    /// Whether time spent in this kind counts towards unfocused alerts.
    pub fn is_unfocused(&self) -> bool {
        !matches!(self, ActivityKind::Present | ActivityKind::Paused)
    }

    /// Text shown in the status line and reports.
    pub fn display_name(&self) -> &str {
        match self {
            ActivityKind::Present => "Focused",
            ActivityKind::Away => "Away from Desk",
            ActivityKind::GadgetSuspected => "Phone Detected",
            ActivityKind::ScreenDistraction => "Screen Distraction",
            ActivityKind::Paused => "Paused",
            ActivityKind::Other(label) => label.as_ref(),
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(value: &str) -> Self {
        match value.trim() {
            PRESENT => ActivityKind::Present,
            AWAY => ActivityKind::Away,
            GADGET_SUSPECTED | PHONE_SUSPECTED_ALIAS => ActivityKind::GadgetSuspected,
            SCREEN_DISTRACTION => ActivityKind::ScreenDistraction,
            PAUSED => ActivityKind::Paused,
            other => ActivityKind::Other(other.into()),
        }
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<ActivityKind> for String {
    fn from(value: ActivityKind) -> Self {
        value.label().to_string()
    }
}

impl Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
