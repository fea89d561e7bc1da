//! Application configuration. Everything has a default, `config.json` in the application
//! directory only needs the values that differ.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    classify::MonitoringMode, tracking::alerts::AlertLevel, utils::time::positive_std_duration,
};

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub alerts: AlertsConfig,
    pub vision: VisionConfig,
    pub screen: ScreenConfig,
    pub licensing: LicensingConfig,
    /// Where reports are written. Defaults to the Downloads folder.
    pub reports_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub mode: MonitoringMode,
    /// Time between two classifications.
    pub interval_seconds: f64,
    /// Idle input time after which screen monitoring reports the user as away.
    pub afk_seconds: u64,
    /// Program and arguments for the `command` mode.
    pub command: Option<Vec<String>>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: MonitoringMode::Camera,
            interval_seconds: 3.,
            afk_seconds: 120,
            command: None,
        }
    }
}

const MIN_DETECTION_INTERVAL: Duration = Duration::from_millis(100);

impl DetectionConfig {
    pub fn interval(&self) -> Result<Duration> {
        let interval = positive_std_duration(self.interval_seconds)
            .context("detection.interval_seconds must be a positive number")?;
        Ok(interval.max(MIN_DETECTION_INTERVAL))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub after_seconds: u64,
    pub badge: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub levels: Vec<AlertMessage>,
    /// Played with every alert when set.
    pub sound_file: Option<PathBuf>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        let level = |after_seconds, badge: &str, message: &str| AlertMessage {
            after_seconds,
            badge: badge.into(),
            message: message.into(),
        };
        Self {
            levels: vec![
                level(20, "Focus paused", "We noticed you stepped away!"),
                level(60, "Quick check-in", "We are waiting for you :)"),
                level(120, "Reminder", "Don't forget to come back ;)"),
            ],
            sound_file: None,
        }
    }
}

impl AlertsConfig {
    pub fn alert_levels(&self) -> Vec<AlertLevel> {
        self.levels
            .iter()
            .map(|v| AlertLevel {
                after: Duration::from_secs(v.after_seconds),
                badge: v.badge.clone(),
                message: v.message.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub model: String,
    pub base_url: String,
    /// Program and arguments that print a single JPEG frame to stdout.
    pub capture_command: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            capture_command: default_capture_command(),
            timeout_seconds: 30,
        }
    }
}

fn default_capture_command() -> Vec<String> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            let input = ["-f", "v4l2", "-video_size", "1280x720", "-i", "/dev/video0"];
        } else if #[cfg(target_os = "macos")] {
            let input = ["-f", "avfoundation", "-video_size", "1280x720", "-framerate", "30", "-i", "0"];
        } else {
            let input = ["-f", "dshow", "-video_size", "1280x720", "-i", "video=Integrated Camera"];
        }
    }
    ["ffmpeg", "-loglevel", "error"]
        .into_iter()
        .chain(input)
        .chain(["-frames:v", "1", "-f", "image2", "-c:v", "mjpeg", "-"])
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub blocklist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensingConfig {
    /// Refuse to track without an activated license.
    pub required: bool,
    /// SHA-256 hex digests of the accepted promo codes.
    pub promo_code_hashes: Vec<String>,
}

impl AppConfig {
    /// Reads `config.json` from `app_dir`. A missing file yields the defaults, a malformed one
    /// is an error so that typos don't silently reset settings.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config: Self = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?;
                config
                    .detection
                    .interval()
                    .with_context(|| format!("Invalid config {}", path.display()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config {}", path.display())),
        }
    }

    pub fn reports_dir(&self, app_dir: &Path) -> PathBuf {
        self.reports_dir
            .clone()
            .unwrap_or_else(|| crate::utils::dir::default_reports_path(app_dir))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::classify::MonitoringMode;

    use super::{AppConfig, DetectionConfig, CONFIG_FILE_NAME};

    #[test]
    fn test_missing_config_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load(dir.path())?;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.detection.interval()?, Duration::from_secs(3));
        assert_eq!(
            config
                .alerts
                .alert_levels()
                .iter()
                .map(|v| v.after.as_secs())
                .collect::<Vec<_>>(),
            vec![20, 60, 120]
        );
        Ok(())
    }

    #[test]
    fn test_partial_config() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{
                "detection": { "mode": "screen", "interval_seconds": 1.5 },
                "screen": { "blocklist": ["youtube.com", "reddit"] },
                "licensing": { "required": true }
            }"#,
        )?;
        let config = AppConfig::load(dir.path())?;
        assert_eq!(config.detection.mode, MonitoringMode::Screen);
        assert_eq!(config.detection.interval()?, Duration::from_millis(1500));
        assert_eq!(config.detection.afk_seconds, 120);
        assert_eq!(config.screen.blocklist.len(), 2);
        assert!(config.licensing.required);
        assert_eq!(config.vision.model, "gpt-4o-mini");
        Ok(())
    }

    #[test]
    fn test_malformed_config_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ detection: ")?;
        assert!(AppConfig::load(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_unusable_interval_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        for interval in ["1e300", "0", "-3"] {
            std::fs::write(
                dir.path().join(CONFIG_FILE_NAME),
                format!(r#"{{ "detection": {{ "interval_seconds": {interval} }} }}"#),
            )?;
            assert!(AppConfig::load(dir.path()).is_err(), "{interval} was accepted");
        }

        let detection = DetectionConfig {
            interval_seconds: f64::NAN,
            ..DetectionConfig::default()
        };
        assert!(detection.interval().is_err());
        Ok(())
    }

    #[test]
    fn test_tiny_interval_is_raised() -> Result<()> {
        let detection = DetectionConfig {
            interval_seconds: 0.001,
            ..DetectionConfig::default()
        };
        assert_eq!(detection.interval()?, Duration::from_millis(100));
        Ok(())
    }

    #[test]
    fn test_explicit_reports_dir() {
        let config = AppConfig {
            reports_dir: Some("/tmp/reports".into()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.reports_dir(std::path::Path::new("/ignored")),
            std::path::PathBuf::from("/tmp/reports")
        );
    }
}
