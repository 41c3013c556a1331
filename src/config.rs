use std::{path::PathBuf, time::Duration};

/// Application settings. Everything is fixed at startup; nothing is persisted.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Window title
    pub window_title: String,
    /// Initial window size in points
    pub window_size: [f32; 2],
    /// Destination folder pre-filled in the UI
    pub default_destination: String,
    /// yt-dlp output template, joined onto the destination folder
    pub output_template: String,
    /// Explicit yt-dlp binary; skips the bundled/PATH lookup
    pub binary_path: Option<PathBuf>,
    /// Pass `--quiet` to yt-dlp
    pub quiet: bool,
    /// Pass `--no-progress` to yt-dlp
    pub no_progress: bool,
    /// How often the UI polls for worker events
    pub repaint_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_title: "Video Downloader".to_string(),
            window_size: [460.0, 420.0],
            default_destination: String::new(),
            output_template: "%(title)s.%(ext)s".to_string(),
            binary_path: None,
            quiet: false,
            no_progress: false,
            repaint_interval: Duration::from_millis(100),
        }
    }
}
