//! Summary of a finished session: time per category, focus rate and the event timeline,
//! rendered as plain text.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use tracing::info;

use crate::{
    tracking::{
        kind::ActivityKind,
        session::{Interval, Session},
    },
    utils::{
        percentage::{duration_percentage, Percentage},
        time::format_duration,
    },
};

const REPORT_TITLE: &str = "Focus Session Report";
const REPORT_FOOTER: &str = "Generated by FocusDock";

#[derive(Debug, Clone, PartialEq)]
pub struct FocusStatistics {
    pub present: Duration,
    pub away: Duration,
    pub gadget: Duration,
    pub screen_distraction: Duration,
    pub paused: Duration,
    /// Kinds this version doesn't know about.
    pub other: Duration,
    pub total: Duration,
    pub events: Vec<Interval>,
}

impl FocusStatistics {
    /// Share of the session spent focused.
    pub fn focus_rate(&self) -> Percentage {
        duration_percentage(self.present, self.total)
    }

    /// Categories with recorded time, in report order.
    pub fn categories(&self) -> Vec<(&'static str, Duration)> {
        [
            ("Present at Desk", self.present),
            ("Away from Desk", self.away),
            ("Phone Usage", self.gadget),
            ("Screen Distraction", self.screen_distraction),
            ("Paused", self.paused),
            ("Other", self.other),
        ]
        .into_iter()
        .filter(|(_, duration)| *duration > Duration::zero())
        .collect()
    }
}

/// Sums the event durations per kind. `total` is the whole session duration and may be larger
/// than the sum when the session started or ended without an open interval.
pub fn compute_statistics(events: &[Interval], total: Duration) -> FocusStatistics {
    let mut statistics = FocusStatistics {
        present: Duration::zero(),
        away: Duration::zero(),
        gadget: Duration::zero(),
        screen_distraction: Duration::zero(),
        paused: Duration::zero(),
        other: Duration::zero(),
        total,
        events: events.to_vec(),
    };
    for event in events {
        let slot = match event.kind {
            ActivityKind::Present => &mut statistics.present,
            ActivityKind::Away => &mut statistics.away,
            ActivityKind::GadgetSuspected => &mut statistics.gadget,
            ActivityKind::ScreenDistraction => &mut statistics.screen_distraction,
            ActivityKind::Paused => &mut statistics.paused,
            ActivityKind::Other(_) => &mut statistics.other,
        };
        *slot += event.duration();
    }
    statistics
}

pub fn session_statistics(session: &Session) -> FocusStatistics {
    compute_statistics(session.events(), session.duration())
}

/// `9:05AM` style used in the report header.
fn short_time(time: DateTime<Local>) -> String {
    time.format("%I:%M%p")
        .to_string()
        .trim_start_matches('0')
        .to_string()
}

/// Renders the report text for a session.
pub fn render_report(session: &Session) -> String {
    SessionReport(session).to_string()
}

struct SessionReport<'a>(&'a Session);

impl Display for SessionReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.0;
        let statistics = session_statistics(session);

        writeln!(f, "{REPORT_TITLE}")?;
        writeln!(f, "{}", "=".repeat(REPORT_TITLE.len()))?;
        writeln!(f, "{}", session.id())?;
        if let Some(start) = session.start_time() {
            let end = session.end_time().unwrap_or(start);
            writeln!(
                f,
                "{} from {} - {}",
                start.format("%B %d, %Y"),
                short_time(start),
                short_time(end)
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Summary Statistics")?;
        writeln!(f, "{:<24}{}", "Category", "Duration")?;
        for (category, duration) in statistics.categories() {
            writeln!(f, "{category:<24}{}", format_duration(duration))?;
        }
        writeln!(f, "{:<24}{}", "Total Time", format_duration(statistics.total))?;
        writeln!(f, "{:<24}{}", "Focus Rate", statistics.focus_rate())?;

        writeln!(f)?;
        writeln!(f, "Session Logs")?;
        let events = statistics
            .events
            .iter()
            .filter(|v| v.duration() > Duration::zero())
            .collect::<Vec<_>>();
        if events.is_empty() {
            writeln!(f, "No events recorded.")?;
        } else {
            writeln!(f, "{:<26}{:<22}{}", "Time", "Activity", "Duration")?;
            for event in events {
                writeln!(
                    f,
                    "{:<26}{:<22}{}",
                    format!(
                        "{} - {}",
                        event.start.format("%I:%M:%S %p"),
                        event.end.format("%I:%M:%S %p")
                    ),
                    event.kind.display_name(),
                    format_duration(event.duration())
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "{REPORT_FOOTER}")
    }
}

fn report_file_name(id: &str) -> String {
    let name = id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>();
    format!("{}.txt", name.trim())
}

/// Writes the report to `<dir>/<session id>.txt`, replacing an older report of the same session.
pub async fn write_report(dir: &Path, session: &Session) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create reports directory {}", dir.display()))?;
    let path = dir.join(report_file_name(session.id()));
    tokio::fs::write(&path, render_report(session))
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Report generated: {}", path.display());
    Ok(path)
}
