use thiserror::Error;

/// Input problems caught before any download starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a video URL")]
    EmptyUrl,

    #[error("Please select a save location")]
    EmptyDestination,
}

/// Why a submit click did not start a download
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("A download is already in progress")]
    Busy,
}

/// Failures from the external download tool
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("yt-dlp binary not found; install it or bundle it under assets/")]
    MissingBinary,

    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Exited { code: Option<i32>, message: String },

    #[error("Download canceled by user")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
