//! Main application for the video downloader GUI

// Application settings and defaults
mod config;
// UI-independent download state and button handlers
mod controller;
// External downloader spawning logic (yt-dlp)
mod downloader;
// Error types
mod error;
// Data models for requests, events and dialogs
mod model;
// Progress parsing and formatting
mod progress;
// Background task wrapping one download
mod worker;

use std::sync::Arc;

use config::Settings;
use controller::DownloadController;
use downloader::YtDlp;
use model::{DialogKind, StatusTone};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, Visuals};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tracing::info;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let runtime = RUNTIME.get_or_try_init(|| Runtime::new().map(Arc::new))?;
    let handle = runtime.handle().clone();

    let settings = Settings::default();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(settings.window_size),
        ..Default::default()
    };
    let title = settings.window_title.clone();
    info!("launching {title}");

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(settings, handle))
        }),
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

/// Log level comes from RUST_LOG (default: info).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Application state for the GUI
struct DownloaderApp {
    settings: Settings,
    controller: DownloadController,
}

impl DownloaderApp {
    fn new(settings: Settings, runtime: tokio::runtime::Handle) -> Self {
        let fetcher = Arc::new(YtDlp::new(&settings));
        let controller =
            DownloadController::new(fetcher, runtime, settings.default_destination.clone());
        Self { settings, controller }
    }

    /// Opens the native directory chooser; keeps the old value if dismissed
    fn browse(&mut self) {
        let mut dialog = FileDialog::new();
        let current = self.controller.destination.trim();
        if !current.is_empty() {
            dialog = dialog.set_directory(current);
        }
        if let Some(folder) = dialog.pick_folder() {
            self.controller.set_destination(folder);
        }
    }

    fn main_panel(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| ui.heading(&self.settings.window_title));
        ui.add_space(12.0);

        ui.label("Video URL:");
        ui.add(
            egui::TextEdit::singleline(&mut self.controller.url)
                .hint_text("Enter video URL")
                .desired_width(f32::INFINITY),
        );

        ui.add_space(8.0);
        ui.label("Save location:");
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.controller.destination)
                    .hint_text("No directory selected"),
            );
            if ui.button("Browse…").clicked() {
                self.browse();
            }
        });
        ui.small(self.controller.destination_label());

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            let download = ui.add_enabled(
                self.controller.submit_enabled(),
                egui::Button::new("Download"),
            );
            if download.clicked() {
                // Validation failures surface through the dialog.
                let _ = self.controller.submit();
            }

            if self.controller.is_paused() {
                if ui.button("Resume").clicked() {
                    self.controller.resume();
                }
            } else if ui
                .add_enabled(self.controller.can_pause(), egui::Button::new("Pause"))
                .clicked()
            {
                self.controller.pause();
            }

            if ui
                .add_enabled(self.controller.can_cancel(), egui::Button::new("Cancel"))
                .clicked()
            {
                self.controller.cancel();
            }
        });

        ui.separator();
        ui.colored_label(tone_color(self.controller.tone()), self.controller.status());
        if let Some(update) = self.controller.progress() {
            if update.total.is_some() {
                ui.add(egui::ProgressBar::new((update.percentage() / 100.0) as f32));
            }
            ui.label(self.controller.progress_text());
        }
    }

    fn dialog_window(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.controller.dialog().cloned() else {
            return;
        };
        let color = match dialog.kind {
            DialogKind::Info => Color32::LIGHT_GREEN,
            DialogKind::Error => Color32::LIGHT_RED,
        };
        egui::Window::new(dialog.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(color, dialog.message.as_str());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    self.controller.dismiss_dialog();
                }
            });
    }
}

fn tone_color(tone: StatusTone) -> Color32 {
    match tone {
        StatusTone::Neutral => Color32::WHITE,
        StatusTone::Busy => Color32::LIGHT_BLUE,
        StatusTone::Warning => Color32::from_rgb(255, 165, 0),
        StatusTone::Success => Color32::GREEN,
        StatusTone::Error => Color32::RED,
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Apply worker events on the UI thread
        self.controller.poll();

        // The dialog blocks the rest of the window until dismissed
        let blocked = self.controller.dialog().is_some();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!blocked, |ui| self.main_panel(ui));
        });
        self.dialog_window(ctx);

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(self.settings.repaint_interval);
    }
}
