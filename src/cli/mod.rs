pub mod history;
pub mod license;
pub mod track;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use history::{process_history_command, process_show_command, HistoryCommand, ShowCommand};
use license::{process_license_command, LicenseCommand};
use tracing::{debug, level_filters::LevelFilter};
use track::{process_track_command, TrackCommand};

use crate::{
    config::AppConfig,
    utils::{
        dir::{create_application_default_path, create_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "FocusDock", version, long_about = None)]
#[command(about = "Tracks focus sessions and nudges you back when you drift away", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Mirror detailed logs into the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_STATE_HOME/focusdock or $HOME/.local/state/focusdock"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start a focus session in this console. Stop it with Ctrl-C")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "List recorded sessions")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Print the report of a recorded session")]
    Show {
        #[command(flatten)]
        command: ShowCommand,
    },
    #[command(about = "Inspect or change the license")]
    License {
        #[command(subcommand)]
        command: LicenseCommand,
    },
}

/// Everything a command needs from the environment, resolved once.
pub struct AppContext {
    pub app_dir: PathBuf,
    pub config: AppConfig,
}

impl AppContext {
    pub fn sessions_dir(&self) -> PathBuf {
        self.app_dir.join("sessions")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.config.reports_dir(&self.app_dir)
    }
}

pub async fn run_cli() -> Result<()> {
    // Before parsing, so .env values can fill in `env` backed arguments
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => create_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&app_dir.join("logs"), logging_level, args.log)?;
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded {e}"),
    }

    let context = AppContext {
        config: AppConfig::load(&app_dir)?,
        app_dir,
    };

    match args.commands {
        Commands::Track { command } => process_track_command(command, &context).await,
        Commands::History { command } => process_history_command(command, &context).await,
        Commands::Show { command } => process_show_command(command, &context).await,
        Commands::License { command } => process_license_command(command, &context),
    }
}
