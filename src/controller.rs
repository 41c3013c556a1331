//! UI-independent state behind the main window.
//!
//! Button handlers call into [`DownloadController`]; the worker reports back
//! over a channel that [`DownloadController::poll`] drains on the UI thread.

use std::{path::PathBuf, sync::Arc};

use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
};
use tracing::{debug, info};

use crate::{
    downloader::MediaFetcher,
    error::{SubmitError, ValidationError},
    model::{ControlState, Dialog, DownloadEvent, DownloadRequest, StatusTone},
    progress::{ProgressUpdate, format_progress},
    worker::run_download,
};

pub struct DownloadController {
    /// URL text field
    pub url: String,
    /// Destination folder text field
    pub destination: String,
    status: String,
    tone: StatusTone,
    progress: Option<ProgressUpdate>,
    dialog: Option<Dialog>,
    in_flight: usize,
    control: Option<watch::Sender<ControlState>>,
    events_tx: UnboundedSender<DownloadEvent>,
    events_rx: UnboundedReceiver<DownloadEvent>,
    fetcher: Arc<dyn MediaFetcher>,
    runtime: Handle,
}

impl DownloadController {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, runtime: Handle, destination: String) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            url: String::new(),
            destination,
            status: "Ready".to_string(),
            tone: StatusTone::Neutral,
            progress: None,
            dialog: None,
            in_flight: 0,
            control: None,
            events_tx,
            events_rx,
            fetcher,
            runtime,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn tone(&self) -> StatusTone {
        self.tone
    }

    pub fn progress(&self) -> Option<ProgressUpdate> {
        self.progress
    }

    pub fn progress_text(&self) -> String {
        self.progress.as_ref().map(format_progress).unwrap_or_default()
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = None;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn submit_enabled(&self) -> bool {
        self.in_flight == 0
    }

    fn control_state(&self) -> Option<ControlState> {
        self.control.as_ref().map(|tx| *tx.borrow())
    }

    pub fn is_paused(&self) -> bool {
        self.control_state() == Some(ControlState::Paused)
    }

    pub fn can_pause(&self) -> bool {
        self.in_flight > 0 && self.control_state() == Some(ControlState::Running)
    }

    pub fn can_cancel(&self) -> bool {
        self.in_flight > 0 && self.control_state() != Some(ControlState::Cancelled)
    }

    /// Stores a folder picked from the directory chooser.
    pub fn set_destination(&mut self, folder: PathBuf) {
        // Rebuilding from components drops `.` segments and doubled separators.
        let normalised: PathBuf = folder.components().collect();
        self.destination = normalised.display().to_string();
    }

    pub fn destination_label(&self) -> String {
        match self.destination.trim() {
            "" => "No directory selected".to_string(),
            folder => format!("Selected: {folder}"),
        }
    }

    fn validate(&self) -> Result<DownloadRequest, ValidationError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        let destination = self.destination.trim();
        if destination.is_empty() {
            return Err(ValidationError::EmptyDestination);
        }
        Ok(DownloadRequest {
            url: url.to_string(),
            destination: PathBuf::from(destination),
        })
    }

    /// Handles a click on the download button.
    pub fn submit(&mut self) -> Result<(), SubmitError> {
        if !self.submit_enabled() {
            return Err(SubmitError::Busy);
        }
        let request = match self.validate() {
            Ok(request) => request,
            Err(e) => {
                self.dialog = Some(Dialog::error("Input Error", e.to_string()));
                return Err(e.into());
            }
        };

        info!(url = %request.url, destination = %request.destination.display(), "starting download");
        let (control_tx, control_rx) = watch::channel(ControlState::Running);
        self.control = Some(control_tx);
        self.in_flight += 1;
        self.progress = None;
        self.set_status("Starting download...", StatusTone::Busy);

        self.runtime.spawn(run_download(
            Arc::clone(&self.fetcher),
            request,
            control_rx,
            self.events_tx.clone(),
        ));
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.can_pause() {
            return;
        }
        if let Some(tx) = &self.control {
            tx.send_replace(ControlState::Paused);
        }
        self.set_status("Paused", StatusTone::Warning);
    }

    pub fn resume(&mut self) {
        if !self.is_paused() {
            return;
        }
        if let Some(tx) = &self.control {
            tx.send_replace(ControlState::Running);
        }
        self.set_status("Downloading...", StatusTone::Busy);
    }

    pub fn cancel(&mut self) {
        if !self.can_cancel() {
            return;
        }
        if let Some(tx) = &self.control {
            tx.send_replace(ControlState::Cancelled);
        }
        self.set_status("Canceling...", StatusTone::Warning);
    }

    /// Applies every event the worker has sent since the last frame.
    pub fn poll(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: DownloadEvent) {
        debug!(?event, "download event");
        let terminal = event.is_terminal();
        match event {
            // Late transition events must not overwrite a pending pause or cancel.
            DownloadEvent::Started | DownloadEvent::Resumed => {
                if self.control_state() == Some(ControlState::Running) {
                    self.set_status("Downloading...", StatusTone::Busy);
                }
            }
            DownloadEvent::Progress(update) => self.progress = Some(update),
            DownloadEvent::Paused => {
                if self.control_state() == Some(ControlState::Paused) {
                    self.set_status("Paused", StatusTone::Warning);
                }
            }
            DownloadEvent::Completed => {
                self.set_status("Download completed", StatusTone::Success);
                self.dialog = Some(Dialog::info(
                    "Success",
                    "The video has been downloaded successfully!",
                ));
            }
            DownloadEvent::Failed(message) => {
                self.set_status(format!("Error: {message}"), StatusTone::Error);
                self.dialog = Some(Dialog::error("Error", format!("An error occurred: {message}")));
            }
            DownloadEvent::Cancelled => {
                self.set_status("Download canceled by user", StatusTone::Warning);
            }
        }

        if terminal {
            self.in_flight = self.in_flight.saturating_sub(1);
            if self.in_flight == 0 {
                self.control = None;
            }
        }
    }

    fn set_status(&mut self, text: impl Into<String>, tone: StatusTone) {
        self.status = text.into();
        self.tone = tone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{downloader::EventSender, error::DownloadError};
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::Notify;

    /// Stand-in for the external tool
    #[derive(Default)]
    struct StubFetcher {
        calls: AtomicUsize,
        progress: Option<ProgressUpdate>,
        fail_with: Option<&'static str>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl MediaFetcher for StubFetcher {
        async fn fetch(
            &self,
            _request: &DownloadRequest,
            events: &EventSender,
            _control: watch::Receiver<ControlState>,
        ) -> Result<(), DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(update) = self.progress {
                let _ = events.send(DownloadEvent::Progress(update));
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.fail_with {
                Some(msg) => Err(DownloadError::Other(msg.to_string())),
                None => Ok(()),
            }
        }
    }

    fn controller(fetcher: Arc<StubFetcher>) -> DownloadController {
        let mut c = DownloadController::new(fetcher, Handle::current(), String::new());
        c.url = "https://example.com/watch?v=abc".to_string();
        c.destination = "/tmp/videos".to_string();
        c
    }

    async fn settle(c: &mut DownloadController) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                c.poll();
                if c.in_flight() == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("download did not finish");
    }

    #[tokio::test]
    async fn empty_url_shows_error_and_skips_download() {
        let fetcher = Arc::new(StubFetcher::default());
        let mut c = controller(fetcher.clone());
        c.url = "   ".to_string();

        assert_eq!(c.submit(), Err(SubmitError::Invalid(ValidationError::EmptyUrl)));
        let dialog = c.dialog().unwrap();
        assert_eq!(dialog.kind, crate::model::DialogKind::Error);
        assert_eq!(dialog.message, "Please enter a video URL");

        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(c.submit_enabled());
    }

    #[tokio::test]
    async fn empty_destination_shows_error_and_skips_download() {
        let fetcher = Arc::new(StubFetcher::default());
        let mut c = controller(fetcher.clone());
        c.destination.clear();

        assert_eq!(
            c.submit(),
            Err(SubmitError::Invalid(ValidationError::EmptyDestination))
        );
        assert_eq!(c.dialog().unwrap().message, "Please select a save location");
        c.dismiss_dialog();
        assert!(c.dialog().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_call_per_submit_and_submit_disabled_meanwhile() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(StubFetcher {
            gate: Some(gate.clone()),
            ..StubFetcher::default()
        });
        let mut c = controller(fetcher.clone());

        assert_eq!(c.submit(), Ok(()));
        assert!(!c.submit_enabled());
        assert_eq!(c.in_flight(), 1);
        assert_eq!(c.status(), "Starting download...");

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        c.poll();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.status(), "Downloading...");
        assert_eq!(c.submit(), Err(SubmitError::Busy));

        gate.notify_one();
        settle(&mut c).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(c.submit_enabled());
        assert_eq!(c.status(), "Download completed");
        assert_eq!(c.dialog().unwrap().title, "Success");
    }

    #[tokio::test]
    async fn progress_update_is_shown_as_percentage() {
        let fetcher = Arc::new(StubFetcher {
            progress: Some(ProgressUpdate::new(500_000, Some(1_000_000))),
            ..StubFetcher::default()
        });
        let mut c = controller(fetcher);

        c.submit().unwrap();
        settle(&mut c).await;
        assert!(c.progress_text().contains("50.0%"));
    }

    #[tokio::test]
    async fn failure_message_reaches_status_and_submit_is_reenabled() {
        let fetcher = Arc::new(StubFetcher {
            fail_with: Some("network unreachable"),
            ..StubFetcher::default()
        });
        let mut c = controller(fetcher);

        c.submit().unwrap();
        settle(&mut c).await;
        assert!(c.status().contains("network unreachable"));
        assert_eq!(c.tone(), StatusTone::Error);
        assert!(c.dialog().unwrap().message.contains("network unreachable"));
        assert_eq!(c.in_flight(), 0);
        assert!(c.submit_enabled());
    }

    #[tokio::test]
    async fn cancel_before_start_issues_no_call() {
        let fetcher = Arc::new(StubFetcher::default());
        let mut c = controller(fetcher.clone());

        c.submit().unwrap();
        assert!(c.can_cancel());
        c.cancel();
        settle(&mut c).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.status(), "Download canceled by user");
        assert!(c.submit_enabled());
        assert!(!c.can_cancel());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_control_state() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(StubFetcher {
            gate: Some(gate.clone()),
            ..StubFetcher::default()
        });
        let mut c = controller(fetcher);

        assert!(!c.can_pause());
        c.submit().unwrap();
        c.pause();
        assert!(c.is_paused());
        assert_eq!(c.status(), "Paused");
        assert!(!c.can_pause());

        c.resume();
        assert!(!c.is_paused());
        assert_eq!(c.status(), "Downloading...");

        gate.notify_one();
        settle(&mut c).await;
        assert!(!c.is_paused());
    }

    #[tokio::test]
    async fn chosen_folder_fills_destination() {
        let mut c = controller(Arc::new(StubFetcher::default()));
        let dir = tempfile::tempdir().unwrap();
        c.set_destination(dir.path().join(".").join("clips"));
        let expected = dir.path().join("clips").display().to_string();
        assert_eq!(c.destination, expected);
        assert_eq!(c.destination_label(), format!("Selected: {expected}"));

        c.destination.clear();
        assert_eq!(c.destination_label(), "No directory selected");
    }

    #[tokio::test]
    async fn started_event_does_not_hide_pending_cancel() {
        let mut c = controller(Arc::new(StubFetcher::default()));

        c.submit().unwrap();
        c.cancel();
        c.apply(DownloadEvent::Started);
        assert_eq!(c.status(), "Canceling...");

        settle(&mut c).await;
        assert_eq!(c.status(), "Download canceled by user");
    }

    #[tokio::test]
    async fn cancel_while_paused_finishes_as_cancelled() {
        let mut c = DownloadController::new(
            Arc::new(PausingFetcher),
            Handle::current(),
            "/tmp/videos".to_string(),
        );
        c.url = "https://example.com/watch?v=abc".to_string();

        c.submit().unwrap();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        c.poll();
        c.pause();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        c.poll();
        assert!(c.is_paused());
        assert_eq!(c.status(), "Paused");
        c.cancel();
        assert!(!c.is_paused());

        settle(&mut c).await;
        assert_eq!(c.status(), "Download canceled by user");
        assert!(c.submit_enabled());
        assert_eq!(c.in_flight(), 0);
        assert!(c.dialog().is_none());
    }

    /// Waits on the control channel the way the yt-dlp fetcher does
    struct PausingFetcher;

    #[async_trait]
    impl MediaFetcher for PausingFetcher {
        async fn fetch(
            &self,
            _request: &DownloadRequest,
            events: &EventSender,
            mut control: watch::Receiver<ControlState>,
        ) -> Result<(), DownloadError> {
            let state = *control
                .wait_for(|state| *state != ControlState::Running)
                .await
                .map_err(|_| DownloadError::Cancelled)?;
            if state == ControlState::Cancelled {
                return Err(DownloadError::Cancelled);
            }
            let _ = events.send(DownloadEvent::Paused);
            let state = *control
                .wait_for(|state| *state != ControlState::Paused)
                .await
                .map_err(|_| DownloadError::Cancelled)?;
            match state {
                ControlState::Cancelled => Err(DownloadError::Cancelled),
                _ => Ok(()),
            }
        }
    }
}
