use std::{fmt::Display, path::PathBuf};

use ansi_term::Colour;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    report::{render_report, session_statistics, write_report},
    storage::session_storage::{SessionStorage, SessionStorageImpl, StoredSession},
    tracking::session::Session,
    utils::{percentage::Percentage, time::format_duration},
};

use super::{AppContext, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 week ago\", \"15/03/2025\". Defaults to 7 days ago"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"today\", \"1 hour ago\", \"16/03/2025\". Defaults to now"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. For example if start and end are both 15/03/2025 this option includes the whole day"
    )]
    treat_as_days: bool,
}

#[derive(Debug, Parser)]
pub struct ShowCommand {
    #[arg(help = "Session id. The latest session is shown when neither id nor --path is given")]
    id: Option<String>,
    #[arg(long, conflicts_with = "id", help = "Session document to read")]
    path: Option<PathBuf>,
    #[arg(long, help = "Also write the report into the reports directory")]
    save: bool,
}

const DEFAULT_HISTORY_DAYS: i64 = 7;

struct HistoryRange {
    start: DateTime<Local>,
    end: DateTime<Local>,
}

impl HistoryRange {
    fn contains(&self, session: &Session) -> bool {
        session
            .start_time()
            .is_some_and(|start| start >= self.start && start < self.end)
    }
}

fn parse_date(
    value: &str,
    now: DateTime<Local>,
    dialect: chrono_english::Dialect,
    name: &str,
) -> Result<DateTime<Local>> {
    parse_date_string(value, now, dialect)
        .map(|v| v.with_timezone(&Local))
        .map_err(|e| {
            Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate {name} date {e}"),
                )
                .into()
        })
}

/// Also provides sensible defaults for the `history` command.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    treat_as_days: bool,
    now: DateTime<Local>,
) -> Result<HistoryRange> {
    let dialect: chrono_english::Dialect = date_style.into();
    let mut start = match start_date {
        Some(v) => parse_date(&v, now, dialect, "start")?,
        None => now - chrono::Duration::days(DEFAULT_HISTORY_DAYS),
    };
    let mut end = match end_date {
        Some(v) => parse_date(&v, now, dialect, "end")?,
        None => now,
    };
    if treat_as_days {
        start = start.beginning_of_day();
        end = end.end_of_day();
    }
    if start > end {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start {start} is after end {end}"),
            )
            .into());
    }
    Ok(HistoryRange { start, end })
}

fn colour_rate(rate: Percentage) -> String {
    let colour = if *rate >= 75. {
        Colour::Green
    } else if *rate >= 50. {
        Colour::Yellow
    } else {
        Colour::Red
    };
    colour.paint(format!("{:>6}", rate.to_string())).to_string()
}

/// Lists sessions that started within the requested range, oldest first.
pub async fn process_history_command(
    HistoryCommand {
        start_date,
        end_date,
        date_style,
        treat_as_days,
    }: HistoryCommand,
    context: &AppContext,
) -> Result<()> {
    let range = parse_range(start_date, end_date, date_style, treat_as_days, Local::now())?;
    let storage = SessionStorageImpl::new(context.sessions_dir())?;

    let sessions = storage
        .list()
        .await?
        .into_iter()
        .filter(|v| range.contains(&v.session))
        .collect::<Vec<_>>();

    if sessions.is_empty() {
        println!(
            "No sessions between {} and {}",
            range.start.format("%x %H:%M"),
            range.end.format("%x %H:%M")
        );
        return Ok(());
    }

    for StoredSession { session, .. } in sessions {
        let statistics = session_statistics(&session);
        let Some(start) = session.start_time() else {
            continue;
        };
        println!(
            "{}\t{:>10}\t{}\t{}",
            start.format("%x %H:%M"),
            format_duration(statistics.total),
            colour_rate(statistics.focus_rate()),
            session.id()
        );
    }
    Ok(())
}

/// Prints the report of one recorded session.
pub async fn process_show_command(
    ShowCommand { id, path, save }: ShowCommand,
    context: &AppContext,
) -> Result<()> {
    let session = match path {
        Some(path) => Session::load(&path).await?,
        None => {
            let storage = SessionStorageImpl::new(context.sessions_dir())?;
            let stored = match &id {
                Some(id) => storage.find(id).await?,
                None => storage.list().await?.pop(),
            };
            stored
                .map(|v| v.session)
                .ok_or_else(|| match id {
                    Some(id) => anyhow!("No session named {id:?}"),
                    None => anyhow!("No sessions recorded yet"),
                })?
        }
    };

    println!("{}", render_report(&session));
    if save {
        let path = write_report(&context.reports_dir(), &session).await?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}
