//! External download tool integration (yt-dlp).

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use rust_embed::RustEmbed;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::{mpsc::UnboundedSender, watch},
};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    error::DownloadError,
    model::{ControlState, DownloadEvent, DownloadRequest},
    progress::{PROGRESS_TEMPLATE, parse_progress_line},
};

/// Channel the fetcher reports progress and pause/resume transitions on
pub type EventSender = UnboundedSender<DownloadEvent>;

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// Something that can turn a [`DownloadRequest`] into a file on disk.
///
/// Implementations send `Progress`, `Paused` and `Resumed` events while they run
/// and watch `control` for pause and cancel requests. Terminal events are the
/// caller's job.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        events: &EventSender,
        control: watch::Receiver<ControlState>,
    ) -> Result<(), DownloadError>;
}

/// Runs the yt-dlp executable as a child process.
#[derive(Debug, Clone)]
pub struct YtDlp {
    output_template: String,
    binary_path: Option<PathBuf>,
    quiet: bool,
    no_progress: bool,
}

/// How one child process run ended
enum RunOutcome {
    Finished,
    Interrupted(ControlState),
}

impl YtDlp {
    pub fn new(settings: &Settings) -> Self {
        Self {
            output_template: settings.output_template.clone(),
            binary_path: settings.binary_path.clone(),
            quiet: settings.quiet,
            no_progress: settings.no_progress,
        }
    }

    fn binary_name() -> &'static str {
        if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }
    }

    /// Configured path, then the bundled binary, then `PATH`.
    pub fn resolve_binary(&self) -> Result<PathBuf, DownloadError> {
        if let Some(path) = &self.binary_path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(DownloadError::MissingBinary)
            };
        }
        if let Some(path) = extract_bundled(Self::binary_name())? {
            return Ok(path);
        }
        which::which(Self::binary_name()).map_err(|_| DownloadError::MissingBinary)
    }

    pub fn build_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            request.destination.join(&self.output_template).into_os_string(),
            "--newline".into(),
            "--encoding".into(),
            "utf-8".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
        ];
        if self.quiet {
            args.push("--quiet".into());
        }
        if self.no_progress {
            args.push("--no-progress".into());
        }
        args.push(request.url.clone().into());
        args
    }

    async fn run_once(
        &self,
        binary: &Path,
        args: &[OsString],
        events: &EventSender,
        control: &mut watch::Receiver<ControlState>,
    ) -> Result<RunOutcome, DownloadError> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DownloadError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Other("yt-dlp stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Other("yt-dlp stderr was not captured".into()))?;
        let stderr_task = tokio::spawn(last_error_line(stderr));

        let mut stdout = BufReader::new(stdout);
        // Partial reads stay in `buf` when the control branch wins the select.
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut buf) => {
                    let read = read?;
                    if !buf.is_empty() {
                        forward_stdout_line(&decode_line(&buf), events);
                        buf.clear();
                    }
                    if read == 0 {
                        break;
                    }
                },
                changed = control.changed() => {
                    let state = match changed {
                        Ok(()) => *control.borrow_and_update(),
                        Err(_) => ControlState::Cancelled,
                    };
                    if state != ControlState::Running {
                        if let Err(e) = child.kill().await {
                            warn!("failed to stop yt-dlp: {e}");
                        }
                        stderr_task.abort();
                        return Ok(RunOutcome::Interrupted(state));
                    }
                }
            }
        }

        let status = child.wait().await?;
        let captured = stderr_task.await.ok().flatten();
        if status.success() {
            Ok(RunOutcome::Finished)
        } else {
            let message = captured.unwrap_or_else(|| format!("yt-dlp exited with {status}"));
            Err(DownloadError::Exited {
                code: status.code(),
                message,
            })
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlp {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        events: &EventSender,
        mut control: watch::Receiver<ControlState>,
    ) -> Result<(), DownloadError> {
        let binary = self.resolve_binary()?;
        let args = self.build_args(request);
        info!(binary = %binary.display(), url = %request.url, "running yt-dlp");

        loop {
            let state = *control.borrow_and_update();
            match state {
                ControlState::Cancelled => return Err(DownloadError::Cancelled),
                ControlState::Paused => {
                    wait_for_resume(&mut control, events).await?;
                    continue;
                }
                ControlState::Running => {}
            }

            match self.run_once(&binary, &args, events, &mut control).await? {
                RunOutcome::Finished => return Ok(()),
                RunOutcome::Interrupted(ControlState::Paused) => {
                    info!("yt-dlp stopped for pause");
                    wait_for_resume(&mut control, events).await?;
                }
                RunOutcome::Interrupted(_) => return Err(DownloadError::Cancelled),
            }
        }
    }
}

/// Blocks until the control leaves `Paused`. yt-dlp picks up its `.part`
/// file on the next run, so the transfer continues where it stopped.
async fn wait_for_resume(
    control: &mut watch::Receiver<ControlState>,
    events: &EventSender,
) -> Result<(), DownloadError> {
    let _ = events.send(DownloadEvent::Paused);
    let state = *control
        .wait_for(|state| *state != ControlState::Paused)
        .await
        .map_err(|_| DownloadError::Cancelled)?;
    if state == ControlState::Cancelled {
        return Err(DownloadError::Cancelled);
    }
    info!("resuming yt-dlp");
    let _ = events.send(DownloadEvent::Resumed);
    Ok(())
}

/// Output is decoded lossily; titles are not always valid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

fn forward_stdout_line(line: &str, events: &EventSender) {
    match parse_progress_line(line) {
        Some(update) => {
            let _ = events.send(DownloadEvent::Progress(update));
        }
        None => debug!(target: "yt-dlp", "{line}"),
    }
}

/// Last `ERROR:` line on stderr, or the last non-empty one. Drains the pipe
/// to the end so the child never blocks on a full stderr.
async fn last_error_line<R: AsyncRead + Unpin>(stderr: R) -> Option<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut last_error = None;
    let mut last_line = None;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("stopped reading yt-dlp stderr: {e}");
                break;
            }
        }
        let line = decode_line(&buf).trim().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(target: "yt-dlp", "stderr: {line}");
        if line.starts_with("ERROR:") {
            last_error = Some(line.clone());
        }
        last_line = Some(line);
    }
    last_error.or(last_line)
}

/// Writes the embedded binary to the temp dir once and returns its path.
fn extract_bundled(bin: &str) -> Result<Option<PathBuf>, DownloadError> {
    let Some(data) = Asset::get(bin) else {
        return Ok(None);
    };
    let path = std::env::temp_dir().join(bin);
    if write_if_stale(&path, &data.data)? {
        info!(path = %path.display(), "extracted bundled yt-dlp");
    }
    Ok(Some(path))
}

/// Rewrites `path` unless it already holds `data.len()` bytes, so a copy cut
/// short by an earlier run is replaced. Returns whether it wrote.
fn write_if_stale(path: &Path, data: &[u8]) -> std::io::Result<bool> {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() && meta.len() == data.len() as u64 {
            return Ok(false);
        }
    }
    std::fs::write(path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(true)
}
