//! Preview surface and operator overlay.
//!
//! The rig hands every preview frame to a [`Display`], which answers with
//! whatever overlay actions the operator requested since the last frame.

use crate::capture::{CameraSettings, Frame, SettingKind};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Operator request raised from the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    /// Same as a primary button press.
    Picture,
    /// Same as a confirmed secondary hold.
    Video,
    /// Moves one camera setting (clamped to its range).
    Set(SettingKind, i32),
    RestoreDefaults,
    Quit,
}

impl OverlayAction {
    /// Parses one console command.
    ///
    /// Accepts `p`, `v`, `d`, `q` and `<setting> <value>`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?;
        let action = match (head, words.next()) {
            ("p" | "picture", None) => Self::Picture,
            ("v" | "video", None) => Self::Video,
            ("d" | "defaults", None) => Self::RestoreDefaults,
            ("q" | "quit", None) => Self::Quit,
            (name, Some(value)) => {
                let kind: SettingKind = name.parse().ok()?;
                Self::Set(kind, value.parse().ok()?)
            }
            _ => return None,
        };
        match words.next() {
            Some(_) => None,
            None => Some(action),
        }
    }
}

/// What the rig is doing while a frame is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    Idle,
    Recording { frames: u64 },
}

/// Sink for preview frames.
pub trait Display {
    /// Shows one frame and returns pending operator actions.
    fn present(
        &mut self,
        frame: &Frame,
        status: PreviewStatus,
        settings: &CameraSettings,
    ) -> Vec<OverlayAction>;

    /// Returns pending operator actions while there is no frame to show.
    fn poll(&mut self) -> Vec<OverlayAction> {
        Vec::new()
    }
}

/// Drops frames; never requests anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn present(&mut self, _: &Frame, _: PreviewStatus, _: &CameraSettings) -> Vec<OverlayAction> {
        Vec::new()
    }
}

/// Overlay fed by a channel of actions.
///
/// [`ChannelDisplay::console`] attaches the channel to stdin so the rig
/// can be driven from a terminal.
pub struct ChannelDisplay {
    actions: Receiver<OverlayAction>,
    connected: bool,
    last_status: Option<PreviewStatus>,
}

impl ChannelDisplay {
    pub fn new(actions: Receiver<OverlayAction>) -> Self {
        Self {
            actions,
            connected: true,
            last_status: None,
        }
    }

    /// Creates a display plus the sender that feeds it.
    pub fn channel() -> (Self, Sender<OverlayAction>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(rx), tx)
    }

    /// Reads commands from stdin on a helper thread.
    pub fn console() -> Self {
        let (display, tx) = Self::channel();
        let spawned = std::thread::Builder::new()
            .name("console-overlay".to_owned())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match OverlayAction::parse(&line) {
                        Some(action) => {
                            if tx.send(action).is_err() {
                                break;
                            }
                        }
                        None => tracing::warn!(command = %line.trim(), "Unknown console command"),
                    }
                }
                tracing::debug!("Console input closed");
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Console overlay unavailable");
        }
        display
    }
}

impl Display for ChannelDisplay {
    fn present(
        &mut self,
        _frame: &Frame,
        status: PreviewStatus,
        settings: &CameraSettings,
    ) -> Vec<OverlayAction> {
        if self.last_status.as_ref().map(std::mem::discriminant) != Some(std::mem::discriminant(&status)) {
            tracing::debug!(?status, frame_period = ?settings.frame_period(), "Preview status changed");
        }
        self.last_status = Some(status);
        self.poll()
    }

    fn poll(&mut self) -> Vec<OverlayAction> {
        let mut pending = Vec::new();
        while self.connected {
            match self.actions.try_recv() {
                Ok(action) => pending.push(action),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.connected = false,
            }
        }
        pending
    }
}
