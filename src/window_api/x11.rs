use anyhow::{anyhow, Result};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::instrument;
use xcb::{
    screensaver::QueryInfo,
    x::{self, Atom, Drawable, GetProperty, InternAtom, Window, ATOM_ANY},
    Connection,
};

use super::{ActiveWindowData, WindowManager};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

/// Reads up to `length` 32-bit units of a window property.
fn read_property(
    conn: &Connection,
    window: Window,
    property: Atom,
    length: u32,
) -> Result<x::GetPropertyReply> {
    Ok(conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: length,
    }))?)
}

pub struct LinuxWindowManager {
    connection: Connection,
    root: Window,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
    system: System,
}

impl LinuxWindowManager {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        let root = connection
            .get_setup()
            .roots()
            .nth(preferred_screen.max(0) as usize)
            .map(|v| v.root())
            .ok_or_else(|| anyhow!("X11 screen {preferred_screen} doesn't exist"))?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            root,
            active_window_atom,
            window_name_atom,
            pid_atom,
            system: System::new(),
        })
    }

    fn active_window(&self) -> Result<Window> {
        let reply = read_property(&self.connection, self.root, self.active_window_atom, 1)?;
        reply
            .value::<Window>()
            .first()
            .copied()
            .ok_or_else(|| anyhow!("No window is focused"))
    }

    fn window_title(&self, window: Window) -> Result<String> {
        let reply = read_property(&self.connection, window, self.window_name_atom, 1024)?;
        Ok(String::from_utf8_lossy(reply.value::<u8>()).into_owned())
    }

    fn window_process(&mut self, window: Window) -> Result<String> {
        let reply = read_property(&self.connection, window, self.pid_atom, 1)?;
        let pid = reply
            .value::<u32>()
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Focused window has no _NET_WM_PID"))?;
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| anyhow!("Process {pid} of the focused window is gone"))?;
        Ok(process
            .exe()
            .and_then(|v| v.to_str())
            .map(|v| v.to_string())
            .unwrap_or_else(|| process.name().to_string_lossy().into_owned()))
    }
}

impl WindowManager for LinuxWindowManager {
    #[instrument(skip(self))]
    fn get_active_window_data(&mut self) -> Result<ActiveWindowData> {
        let window = self.active_window()?;
        let window_title = self.window_title(window)?;
        let process_name = self.window_process(window)?;
        Ok(ActiveWindowData {
            window_title: window_title.into(),
            process_name: process_name.into(),
        })
    }

    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<u32> {
        let reply = self
            .connection
            .wait_for_reply(self.connection.send_request(&QueryInfo {
                drawable: Drawable::Window(self.root),
            }))?;
        Ok(reply.ms_since_user_input())
    }
}
