use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::tracking::kind::ActivityKind;

use super::Classifier;

/// Runs an external program for every sample and takes its trimmed stdout as the activity
/// label. Lets any detector that can print `present`/`away`/... drive a session.
#[derive(Debug)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut command = command.into_iter();
        let program = command
            .next()
            .ok_or_else(|| anyhow!("Classifier command is empty"))?;
        Ok(Self {
            program,
            args: command.collect(),
        })
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn classify(&mut self) -> Result<ActivityKind> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run classifier {}", self.program))?;

        if !output.status.success() {
            bail!(
                "Classifier {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let label = String::from_utf8_lossy(&output.stdout);
        let label = label.trim();
        if label.is_empty() {
            bail!("Classifier {} printed no label", self.program);
        }
        debug!("Classifier printed {label}");
        Ok(ActivityKind::from(label))
    }
}
