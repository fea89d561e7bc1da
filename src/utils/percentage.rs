use std::{fmt::Display, ops::Deref};

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    /// Whole values are printed without a fraction, others with one decimal.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.fract() == 0. {
            write!(f, "{}%", self.0 as i64)
        } else {
            write!(f, "{:.1}%", self.0)
        }
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }

    pub fn zero() -> Percentage {
        Percentage(0.)
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` taken by `value`. An empty whole yields 0%.
pub fn duration_percentage(value: Duration, whole: Duration) -> Percentage {
    let Some(whole_ms) = whole.num_milliseconds().checked_abs().filter(|v| *v > 0) else {
        return Percentage::zero();
    };
    Percentage::new_opt(value.num_milliseconds().max(0) as f64 / whole_ms as f64 * 100.)
        .unwrap_or_else(Percentage::zero)
}
