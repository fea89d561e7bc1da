//! Access to the desktop for screen monitoring: the focused window and time since the last
//! user input. [GenericWindowManager] picks the backend compiled in through the `x11` or `win`
//! feature.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

use std::sync::Arc;

use anyhow::Result;
#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone)]
pub struct ActiveWindowData {
    /// Title of the focused window. For example 'Document 1' or 'Vibing in YouTube - Chrome'
    pub window_title: Arc<str>,
    /// Full path to the executable owning the window. For example /usr/bin/firefox
    pub process_name: Arc<str>,
}

/// Contract the platform backends implement.
#[cfg_attr(test, automock)]
pub trait WindowManager: Send {
    fn get_active_window_data(&mut self) -> Result<ActiveWindowData>;

    /// Retrieve amount of time user has been inactive in milliseconds
    fn get_idle_time(&mut self) -> Result<u32>;
}

/// Serves as a cross-compatible WindowManager implementation.
pub struct GenericWindowManager {
    inner: Box<dyn WindowManager>,
}

impl GenericWindowManager {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Ok(Self {
                    inner: Box::new(win::WindowsWindowManager::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                Ok(Self {
                    inner: Box::new(x11::LinuxWindowManager::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "Screen monitoring needs a build with the `x11` or `win` feature"
                ))
            }
        }
    }
}

impl WindowManager for GenericWindowManager {
    fn get_active_window_data(&mut self) -> Result<ActiveWindowData> {
        self.inner.get_active_window_data()
    }

    fn get_idle_time(&mut self) -> Result<u32> {
        self.inner.get_idle_time()
    }
}
