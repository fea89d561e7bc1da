use anyhow::{anyhow, Result};
use tracing::{error, instrument};
use windows::{
    core::PWSTR,
    Win32::{
        Foundation::{CloseHandle, GetLastError, BOOL, HANDLE, HWND},
        System::{
            SystemInformation::GetTickCount64,
            Threading::{
                OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
                PROCESS_QUERY_LIMITED_INFORMATION,
            },
        },
        UI::{
            Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
            WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId},
        },
    },
};

use super::{ActiveWindowData, WindowManager};

fn foreground_process_id(window: HWND) -> Result<u32> {
    let mut id = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut id)) };
    if id == 0 {
        let err = unsafe { GetLastError() };
        return Err(anyhow!("Failed to get process of the foreground window {err:?}"));
    }
    Ok(id)
}

unsafe fn process_path(process: HANDLE, text: &mut [u16]) -> Result<String> {
    unsafe {
        let mut length = text.len() as u32;
        QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(text.as_mut_ptr()), &mut length)?;
        Ok(String::from_utf16_lossy(&text[..length as usize]))
    }
}

unsafe fn window_title(window: HWND, text: &mut [u16]) -> String {
    let len = unsafe { GetWindowTextW(window, text) };
    String::from_utf16_lossy(&text[..len.max(0) as usize])
}

#[instrument]
fn active_window() -> Result<ActiveWindowData> {
    let window = unsafe { GetForegroundWindow() };
    if window.is_invalid() {
        return Err(anyhow!("No window is focused"));
    }

    let id = foreground_process_id(window)?;
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), id) }
        .inspect_err(|e| error!("Failed to open process {id} {e:?}"))?;

    let mut text = [0u16; 4096];
    let process_name = unsafe { process_path(process, &mut text) };
    let title = unsafe { window_title(window, &mut text) };
    unsafe { CloseHandle(process) }.inspect_err(|e| error!("Failed to close handle {e:?}"))?;

    Ok(ActiveWindowData {
        window_title: title.into(),
        process_name: process_name?.into(),
    })
}

fn idle_time() -> Result<u32> {
    let mut last = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    if !unsafe { GetLastInputInfo(&mut last) }.as_bool() {
        return Err(anyhow!("Failed to retrieve user idle time"));
    }
    // GetTickCount64 keeps counting after the 32-bit input tick wraps
    let now = unsafe { GetTickCount64() } as u32;
    Ok(now.wrapping_sub(last.dwTime))
}

#[derive(Default)]
pub struct WindowsWindowManager;

impl WindowsWindowManager {
    pub fn new() -> Self {
        Self
    }
}

impl WindowManager for WindowsWindowManager {
    fn get_active_window_data(&mut self) -> Result<ActiveWindowData> {
        active_window()
    }

    fn get_idle_time(&mut self) -> Result<u32> {
        idle_time()
    }
}
