//! Parsing and formatting of yt-dlp progress output.

/// Tag that prefixes every line produced by [`PROGRESS_TEMPLATE`].
pub const PROGRESS_TAG: &str = "progress:";

/// Value passed to `--progress-template`: downloaded, total and estimated bytes.
pub const PROGRESS_TEMPLATE: &str = "download:progress:%(progress.downloaded_bytes)s/%(progress.total_bytes)s/%(progress.total_bytes_estimate)s";

/// A single progress report from the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes written so far
    pub downloaded: u64,
    /// Exact total if known, otherwise the tool's estimate
    pub total: Option<u64>,
}

impl ProgressUpdate {
    pub fn new(downloaded: u64, total: Option<u64>) -> Self {
        Self { downloaded, total }
    }

    /// Completion in percent. Unknown or zero totals report 0.
    pub fn percentage(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => self.downloaded as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }
}

/// Parses a line emitted through [`PROGRESS_TEMPLATE`].
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let rest = line.trim().strip_prefix(PROGRESS_TAG)?;
    let mut fields = rest.split('/');
    let downloaded = parse_byte_field(fields.next()?)?;
    let total = fields.next().and_then(parse_byte_field).filter(|t| *t > 0);
    let estimate = fields.next().and_then(parse_byte_field).filter(|t| *t > 0);
    Some(ProgressUpdate::new(downloaded, total.or(estimate)))
}

// yt-dlp prints missing fields as "NA" and estimates as floats.
fn parse_byte_field(field: &str) -> Option<u64> {
    let value = field.trim().parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Human-readable progress text, e.g. `500,000 / 1,000,000 bytes | 50.0%`.
pub fn format_progress(update: &ProgressUpdate) -> String {
    format!(
        "{} / {} bytes | {:.1}%",
        group_thousands(update.downloaded),
        group_thousands(update.total.unwrap_or(0)),
        update.percentage()
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
