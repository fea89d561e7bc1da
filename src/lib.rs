//! Focus session tracker for the terminal. A session polls a classifier (webcam through a
//! vision model, the focused window, or an external command), records every change of the
//! user's state, escalates alerts while they stay unfocused and ends with a saved session
//! document plus a summary report.
//!

pub mod classify;
pub mod cli;
pub mod config;
pub mod licensing;
pub mod notify;
pub mod report;
pub mod storage;
pub mod tracking;
pub mod utils;
pub mod window_api;
