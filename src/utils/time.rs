use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone};

/// This is the standard way of naming a session file after its start time.
pub fn session_file_stem<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Human readable duration used in reports. Under a minute only seconds are shown, zero
/// components at the tail are dropped.
pub fn format_duration(v: Duration) -> String {
    let total = v.num_seconds().max(0);
    if total < 60 {
        return format!("{total}s");
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    match (hours, seconds) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{minutes}m {seconds}s"),
        (_, 0) => format!("{hours}h {minutes}m"),
        (_, _) => format!("{hours}h {minutes}m {seconds}s"),
    }
}

/// Stopwatch form, `HH:MM:SS`.
pub fn format_clock(v: Duration) -> String {
    let total = v.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

pub fn duration_to_seconds(duration: Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.,
        None => duration.num_milliseconds() as f64 / 1000.,
    }
}

/// Converts user supplied seconds, rejecting values a timer can't wait for.
pub fn positive_std_duration(seconds: f64) -> Result<std::time::Duration> {
    if !(seconds > 0.) {
        bail!("{seconds} is not a positive number of seconds");
    }
    std::time::Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{seconds} seconds is out of range"))
}
