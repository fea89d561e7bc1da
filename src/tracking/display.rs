use std::{
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::utils::{clock::Clock, time::format_clock};

use super::kind::ActivityKind;

/// What the status line shows. Written by the detection loop, read by [run_status_ticker].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub status: Option<ActivityKind>,
    pub started_at: Option<DateTime<Local>>,
}

impl DisplayState {
    pub fn status_text(&self) -> &str {
        match (&self.status, self.started_at) {
            (Some(kind), _) => kind.display_name(),
            (None, None) => "Booting Up...",
            (None, Some(_)) => "Unknown",
        }
    }

    pub fn render(&self, now: DateTime<Local>) -> String {
        let elapsed = self
            .started_at
            .map(|start| now - start)
            .unwrap_or_else(chrono::Duration::zero);
        format!("{}  {}", format_clock(elapsed), self.status_text())
    }
}

pub type SharedDisplay = Arc<Mutex<DisplayState>>;

/// Snapshot of the shared display. A poisoned lock still holds a usable value.
pub fn read_display(display: &SharedDisplay) -> DisplayState {
    match display.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn update_display(display: &SharedDisplay, update: impl FnOnce(&mut DisplayState)) {
    match display.lock() {
        Ok(mut guard) => update(&mut guard),
        Err(poisoned) => update(&mut poisoned.into_inner()),
    }
}

/// Redraws the status line every second until cancelled.
pub async fn run_status_ticker(
    display: SharedDisplay,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) {
    let mut stdout = std::io::stdout();
    loop {
        let line = read_display(&display).render(clock.time());
        if let Err(e) = write!(stdout, "\r\x1b[2K{line}").and_then(|_| stdout.flush()) {
            warn!("Failed to draw status line {e:?}");
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = writeln!(stdout);
                return;
            }
            _ = clock.sleep(Duration::from_secs(1)) => ()
        }
    }
}
