use std::path::PathBuf;

use crate::progress::ProgressUpdate;

/// What the user asked for: one URL saved into one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
}

/// Control signal shared between the UI handlers and the running worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    /// Download proceeds normally
    #[default]
    Running,
    /// External process is stopped until resumed
    Paused,
    /// Download is abandoned
    Cancelled,
}

/// Messages sent from the worker back to the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Started,
    Progress(ProgressUpdate),
    Paused,
    Resumed,
    Completed,
    Failed(String),
    Cancelled,
}

impl DownloadEvent {
    /// Whether this event ends the download
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// Colour hint for the status label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Busy,
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Error,
}

/// Blocking message box shown over the main window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

impl Dialog {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}
