use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::{
    tracking::kind::ActivityKind,
    window_api::{ActiveWindowData, WindowManager},
};

use super::{afk::AfkEvaluator, Classifier};

/// Window titles and executables considered distracting. Entries match case-insensitively
/// anywhere in the window title or the executable's file name.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    entries: Vec<String>,
}

impl Blocklist {
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    /// Returns the entry the window matched.
    pub fn matches(&self, window: &ActiveWindowData) -> Option<&str> {
        let title = window.window_title.to_lowercase();
        let process = clean_process_name(&window.process_name).to_lowercase();
        self.entries
            .iter()
            .find(|entry| title.contains(entry.as_str()) || process.contains(entry.as_str()))
            .map(|v| v.as_str())
    }
}

fn clean_process_name(value: &str) -> String {
    Path::new(value)
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Classifies from what's on screen: idle input means the user is away, a blocklisted window
/// means a distraction.
pub struct ScreenClassifier {
    manager: Box<dyn WindowManager>,
    afk_evaluator: AfkEvaluator,
    blocklist: Blocklist,
}

impl ScreenClassifier {
    pub fn new(
        manager: Box<dyn WindowManager>,
        afk_evaluator: AfkEvaluator,
        blocklist: Blocklist,
    ) -> Self {
        Self {
            manager,
            afk_evaluator,
            blocklist,
        }
    }
}

#[async_trait]
impl Classifier for ScreenClassifier {
    async fn classify(&mut self) -> Result<ActivityKind> {
        let idle_ms = self.manager.get_idle_time()?;
        if self.afk_evaluator.is_afk(idle_ms) {
            return Ok(ActivityKind::Away);
        }

        let window = self.manager.get_active_window_data()?;
        match self.blocklist.matches(&window) {
            Some(entry) => {
                debug!("Window {:?} matched blocklist entry {entry}", window.window_title);
                Ok(ActivityKind::ScreenDistraction)
            }
            None => Ok(ActivityKind::Present),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};

    use crate::{
        classify::{afk::AfkEvaluator, Classifier},
        tracking::kind::ActivityKind,
        window_api::{ActiveWindowData, MockWindowManager},
    };

    use super::{Blocklist, ScreenClassifier};

    fn window(title: &str, process: &str) -> ActiveWindowData {
        ActiveWindowData {
            window_title: title.into(),
            process_name: process.into(),
        }
    }

    fn blocklist() -> Blocklist {
        Blocklist::new(["YouTube".to_string(), "steam".to_string(), "  ".to_string()])
    }

    #[test]
    fn test_blocklist_matches_title_and_process() {
        let blocklist = blocklist();
        assert_eq!(
            blocklist.matches(&window("Lofi beats - YouTube - Firefox", "/usr/bin/firefox")),
            Some("youtube")
        );
        assert_eq!(
            blocklist.matches(&window("Library", "/home/user/.steam/bin/steam")),
            Some("steam")
        );
        assert_eq!(blocklist.matches(&window("main.rs - nvim", "/usr/bin/nvim")), None);
    }

    #[test]
    fn test_blocklist_ignores_directories() {
        // Only the executable name counts, not the directory it lives in
        let blocklist = Blocklist::new(["games".to_string()]);
        assert_eq!(blocklist.matches(&window("Editor", "/opt/games/editor")), None);
    }

    #[tokio::test]
    async fn test_idle_user_is_away() -> Result<()> {
        let mut manager = MockWindowManager::new();
        manager.expect_get_idle_time().returning(|| Ok(600_000));
        manager.expect_get_active_window_data().never();

        let mut classifier =
            ScreenClassifier::new(Box::new(manager), AfkEvaluator::from_seconds(120), blocklist());
        assert_eq!(classifier.classify().await?, ActivityKind::Away);
        Ok(())
    }

    #[tokio::test]
    async fn test_blocklisted_window() -> Result<()> {
        let mut manager = MockWindowManager::new();
        manager.expect_get_idle_time().returning(|| Ok(0));
        let mut windows = vec![
            window("Rust docs", "/usr/bin/firefox"),
            window("YouTube", "/usr/bin/firefox"),
        ]
        .into_iter();
        manager
            .expect_get_active_window_data()
            .times(2)
            .returning(move || windows.next().ok_or_else(|| anyhow!("no more windows")));

        let mut classifier =
            ScreenClassifier::new(Box::new(manager), AfkEvaluator::from_seconds(120), blocklist());
        assert_eq!(classifier.classify().await?, ActivityKind::Present);
        assert_eq!(classifier.classify().await?, ActivityKind::ScreenDistraction);
        Ok(())
    }

    #[tokio::test]
    async fn test_window_error_propagates() {
        let mut manager = MockWindowManager::new();
        manager.expect_get_idle_time().returning(|| Ok(0));
        manager
            .expect_get_active_window_data()
            .returning(|| Err(anyhow!("no focused window")));

        let mut classifier =
            ScreenClassifier::new(Box::new(manager), AfkEvaluator::from_seconds(120), blocklist());
        assert!(classifier.classify().await.is_err());
    }
}
