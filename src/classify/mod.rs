//! Classification sources. Every source implements [Classifier] and reports one
//! [ActivityKind] per sample; [create_classifier] picks the implementation for the configured
//! [MonitoringMode] once at startup.

pub mod afk;
pub mod command;
pub mod screen;
pub mod vision;

use std::fmt::Display;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::ValueEnum;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::AppConfig,
    tracking::kind::ActivityKind,
    window_api::GenericWindowManager,
};

use self::{
    afk::AfkEvaluator,
    command::CommandClassifier,
    screen::{Blocklist, ScreenClassifier},
    vision::VisionClassifier,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Classifier: Send {
    async fn classify(&mut self) -> Result<ActivityKind>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    #[default]
    Camera,
    Screen,
    Both,
    Command,
}

impl Display for MonitoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitoringMode::Camera => write!(f, "camera"),
            MonitoringMode::Screen => write!(f, "screen"),
            MonitoringMode::Both => write!(f, "both"),
            MonitoringMode::Command => write!(f, "command"),
        }
    }
}

/// What a camera frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct DetectionState {
    #[serde(default)]
    pub person_present: bool,
    #[serde(default, alias = "phone_suspected")]
    pub gadget_suspected: bool,
}

impl DetectionState {
    /// Nobody at the desk wins over anything else seen in the frame.
    pub fn kind(&self) -> ActivityKind {
        if !self.person_present {
            ActivityKind::Away
        } else if self.gadget_suspected {
            ActivityKind::GadgetSuspected
        } else {
            ActivityKind::Present
        }
    }
}

/// Camera and screen together. The camera decides unless it sees a focused user, then the
/// screen gets a say.
pub struct CombinedClassifier {
    camera: Box<dyn Classifier>,
    screen: Box<dyn Classifier>,
}

impl CombinedClassifier {
    pub fn new(camera: Box<dyn Classifier>, screen: Box<dyn Classifier>) -> Self {
        Self { camera, screen }
    }
}

#[async_trait]
impl Classifier for CombinedClassifier {
    async fn classify(&mut self) -> Result<ActivityKind> {
        let camera = self.camera.classify().await?;
        if camera != ActivityKind::Present {
            return Ok(camera);
        }
        match self.screen.classify().await {
            Ok(screen) => Ok(screen),
            Err(e) => {
                warn!("Screen classification failed, using camera result {e:?}");
                Ok(camera)
            }
        }
    }
}

/// Builds the classifier for `mode`. The vision client is only created when the camera is used.
pub fn create_classifier(
    mode: MonitoringMode,
    config: &AppConfig,
    api_key: Option<String>,
) -> Result<Box<dyn Classifier>> {
    let camera = |api_key: Option<String>| -> Result<Box<dyn Classifier>> {
        let api_key = api_key.ok_or_else(|| {
            anyhow!("OpenAI API key not found. Set OPENAI_API_KEY or pass --api-key")
        })?;
        Ok(Box::new(VisionClassifier::new(&config.vision, api_key)?))
    };
    let screen = || -> Result<Box<dyn Classifier>> {
        Ok(Box::new(ScreenClassifier::new(
            Box::new(GenericWindowManager::new()?),
            AfkEvaluator::from_seconds(config.detection.afk_seconds),
            Blocklist::new(config.screen.blocklist.clone()),
        )))
    };

    match mode {
        MonitoringMode::Camera => camera(api_key),
        MonitoringMode::Screen => screen(),
        MonitoringMode::Both => Ok(Box::new(CombinedClassifier::new(camera(api_key)?, screen()?))),
        MonitoringMode::Command => {
            let command = config
                .detection
                .command
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("Command mode needs detection.command in the config"))?;
            Ok(Box::new(CommandClassifier::new(command)?))
        }
    }
}
