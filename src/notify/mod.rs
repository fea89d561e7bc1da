//! Delivery of escalation alerts to the user.

use std::path::PathBuf;

use ansi_term::Colour;
use anyhow::Result;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::tracking::alerts::AlertLevel;

#[cfg_attr(test, automock)]
pub trait AlertNotifier: Send {
    /// Shows an alert that just became due.
    fn alert(&mut self, level: &AlertLevel) -> Result<()>;

    /// The user refocused, alerts still visible can go away.
    fn dismiss(&mut self) -> Result<()>;
}

/// Prints alerts into the terminal, below the status line.
#[derive(Default)]
pub struct ConsoleNotifier {
    showing: bool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn render_alert(level: &AlertLevel) -> String {
    format!(
        "{} {}",
        Colour::Yellow.bold().paint(format!("[{}]", level.badge)),
        level.message
    )
}

impl AlertNotifier for ConsoleNotifier {
    fn alert(&mut self, level: &AlertLevel) -> Result<()> {
        // \x07 rings the terminal bell
        println!("\r\x1b[2K{}\x07", render_alert(level));
        self.showing = true;
        Ok(())
    }

    fn dismiss(&mut self) -> Result<()> {
        if self.showing {
            println!("\r\x1b[2K{}", Colour::Green.paint("Welcome back"));
            self.showing = false;
        }
        Ok(())
    }
}

/// Plays a sound file with the platform's player next to another notifier. Playback problems
/// are logged and never stop the alert itself.
pub struct SoundNotifier {
    inner: Box<dyn AlertNotifier>,
    sound: PathBuf,
}

impl SoundNotifier {
    pub fn new(inner: Box<dyn AlertNotifier>, sound: PathBuf) -> Self {
        Self { inner, sound }
    }

    fn play(&self) {
        let mut command = player_command(&self.sound);
        command.kill_on_drop(false);
        match command.spawn() {
            Ok(mut child) => {
                // Reap the player in the background so it doesn't linger as a zombie
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        warn!("Sound player failed {e:?}");
                    }
                });
            }
            Err(e) => warn!("Failed to play {} {e:?}", self.sound.display()),
        }
    }
}

fn player_command(sound: &std::path::Path) -> Command {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            let mut command = Command::new("afplay");
            command.arg(sound);
        } else if #[cfg(windows)] {
            let mut command = Command::new("powershell");
            command.args(["-NoProfile", "-Command"]).arg(format!(
                "(New-Object Media.SoundPlayer '{}').PlaySync()",
                sound.display()
            ));
        } else {
            let mut command = Command::new("paplay");
            command.arg(sound);
        }
    }
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    command
}

impl AlertNotifier for SoundNotifier {
    fn alert(&mut self, level: &AlertLevel) -> Result<()> {
        self.inner.alert(level)?;
        debug!("Playing alert sound {}", self.sound.display());
        self.play();
        Ok(())
    }

    fn dismiss(&mut self) -> Result<()> {
        self.inner.dismiss()
    }
}

/// Console alerts, with a sound when a file is configured and exists.
pub fn create_notifier(sound: Option<PathBuf>) -> Box<dyn AlertNotifier> {
    let console = Box::new(ConsoleNotifier::new());
    match sound {
        Some(sound) if sound.is_file() => {
            info!("Alerts will play {}", sound.display());
            Box::new(SoundNotifier::new(console, sound))
        }
        Some(sound) => {
            warn!("Alert sound {} doesn't exist, alerts will be silent", sound.display());
            console
        }
        None => console,
    }
}
