//! Background download task: one per submit, never on the UI thread.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    downloader::{EventSender, MediaFetcher},
    error::DownloadError,
    model::{ControlState, DownloadEvent, DownloadRequest},
};

/// Runs one download and always finishes with exactly one terminal event.
pub async fn run_download(
    fetcher: Arc<dyn MediaFetcher>,
    request: DownloadRequest,
    control: watch::Receiver<ControlState>,
    events: EventSender,
) {
    let _ = events.send(DownloadEvent::Started);

    // Cancel is honoured even if it lands before the tool is started.
    let cancelled = *control.borrow() == ControlState::Cancelled;
    let result = if cancelled {
        Err(DownloadError::Cancelled)
    } else {
        fetcher.fetch(&request, &events, control).await
    };

    let terminal = match result {
        Ok(()) => {
            info!(url = %request.url, "download completed");
            DownloadEvent::Completed
        }
        Err(DownloadError::Cancelled) => {
            info!(url = %request.url, "download canceled");
            DownloadEvent::Cancelled
        }
        Err(e) => {
            warn!(url = %request.url, "download failed: {e}");
            DownloadEvent::Failed(e.to_string())
        }
    };
    let _ = events.send(terminal);
}
