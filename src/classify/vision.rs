use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::{config::VisionConfig, tracking::kind::ActivityKind};

use super::{Classifier, DetectionState};

const SYSTEM_PROMPT: &str = "You monitor a person working at a desk through a webcam. \
Answer with a JSON object with two boolean fields. \
\"person_present\": true when a person is sitting at the desk facing the computer. \
\"gadget_suspected\": true only when the person is actively looking at a phone or tablet \
with its screen on. A phone lying on the desk, or held while looking elsewhere, is false.";

/// Captures a webcam frame with an external command and asks an OpenAI compatible vision
/// model what it shows.
pub struct VisionClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    capture: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl VisionClassifier {
    pub fn new(config: &VisionConfig, api_key: String) -> Result<Self> {
        if config.capture_command.is_empty() {
            bail!("vision.capture_command must name a program that prints a JPEG frame");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            capture: config.capture_command.clone(),
        })
    }

    async fn capture_frame(&self) -> Result<Vec<u8>> {
        let (program, args) = self
            .capture
            .split_first()
            .ok_or_else(|| anyhow!("Capture command is empty"))?;
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run capture command {program}"))?;
        if !output.status.success() {
            bail!(
                "Capture command {program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            bail!("Capture command {program} produced no frame");
        }
        Ok(output.stdout)
    }

    async fn detect(&self, frame: &[u8]) -> Result<DetectionState> {
        let body = request_body(&self.model, frame);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Vision request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Vision request failed with status {status}: {text}");
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Vision response is not a chat completion")?;
        parse_detection(response)
    }
}

#[async_trait]
impl Classifier for VisionClassifier {
    #[instrument(skip(self))]
    async fn classify(&mut self) -> Result<ActivityKind> {
        let frame = self.capture_frame().await?;
        debug!("Captured frame of {} bytes", frame.len());
        let state = self.detect(&frame).await?;
        debug!("Vision model reported {state:?}");
        Ok(state.kind())
    }
}

fn request_body(model: &str, frame: &[u8]) -> Value {
    let image = format!("data:image/jpeg;base64,{}", STANDARD.encode(frame));
    json!({
        "model": model,
        "max_tokens": 100,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": "Analyse this webcam frame." },
                    { "type": "image_url", "image_url": { "url": image, "detail": "low" } }
                ]
            }
        ]
    })
}

fn parse_detection(response: ChatResponse) -> Result<DetectionState> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|v| v.message.content)
        .ok_or_else(|| anyhow!("Vision response has no content"))?;
    // Models occasionally wrap the object in a markdown fence
    let content = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(content).with_context(|| format!("Unexpected vision answer {content}"))
}
