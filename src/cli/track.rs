use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    classify::{create_classifier, MonitoringMode},
    licensing::manager::LicenseManager,
    notify::create_notifier,
    report::{render_report, write_report},
    storage::session_storage::{SessionStorage, SessionStorageImpl},
    tracking::{
        alerts::AlertEscalation,
        detection::DetectionLoop,
        display::{run_status_ticker, DisplayState},
        session::Session,
        shutdown::detect_shutdown,
    },
    utils::{
        clock::{Clock, DefaultClock},
        time::positive_std_duration,
    },
};

use super::AppContext;

#[derive(Debug, Parser)]
pub struct TrackCommand {
    #[arg(long, value_enum, help = "What to watch. Defaults to detection.mode from the config")]
    mode: Option<MonitoringMode>,
    #[arg(
        long,
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the vision model used by camera monitoring"
    )]
    api_key: Option<String>,
    #[arg(long, help = "Stop automatically after this many minutes")]
    minutes: Option<f64>,
    #[arg(long, help = "Session name. By default it's generated from the current time")]
    id: Option<String>,
    #[arg(long, help = "Don't write a report when the session ends")]
    no_report: bool,
}

fn session_limit(minutes: Option<f64>) -> Result<Option<Duration>> {
    minutes
        .map(|m| positive_std_duration(m * 60.).context("--minutes must be a positive number"))
        .transpose()
}

/// Runs a session until Ctrl-C or the time limit, then saves it and writes the report.
pub async fn process_track_command(
    TrackCommand {
        mode,
        api_key,
        minutes,
        id,
        no_report,
    }: TrackCommand,
    context: &AppContext,
) -> Result<()> {
    let config = &context.config;
    if config.licensing.required {
        let license = LicenseManager::load(&context.app_dir, config.licensing.promo_code_hashes.clone());
        if !license.is_licensed() {
            bail!("Tracking needs an activated license. Run `focusdock license activate <code>`");
        }
    }

    let limit = session_limit(minutes)?;

    let mode = mode.unwrap_or(config.detection.mode);
    let classifier = create_classifier(mode, config, api_key.filter(|v| !v.trim().is_empty()))?;
    let notifier = create_notifier(config.alerts.sound_file.clone());
    let storage = SessionStorageImpl::new(context.sessions_dir())?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let shutdown = CancellationToken::new();
    let display = Arc::new(Mutex::new(DisplayState::default()));
    let session = Session::new(id);

    println!("Tracking {} using {mode} monitoring. Press Ctrl-C to stop.", session.id());
    info!("Starting session {} in {mode} mode", session.id());

    let detection = DetectionLoop::new(
        classifier,
        notifier,
        AlertEscalation::new(config.alerts.alert_levels()),
        session,
        display.clone(),
        shutdown.clone(),
        config.detection.interval()?,
        clock.clone(),
    );

    let (_, _, session) = tokio::join!(
        detect_shutdown(shutdown.clone(), limit),
        run_status_ticker(display, clock, shutdown.clone()),
        detection.run(),
    );
    let session = session?;

    if !session.is_started() {
        warn!("Session {} never started", session.id());
        println!("Nothing was tracked.");
        return Ok(());
    }

    let path = storage.save(&session).await?;
    println!("Session saved to {}", path.display());

    if !no_report {
        let report = write_report(&context.reports_dir(), &session).await?;
        println!();
        println!("{}", render_report(&session));
        println!("Report saved to {}", report.display());
    }
    Ok(())
}
