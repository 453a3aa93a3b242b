//! Focus radio window: egui/eframe application.
//!
//! # Architecture
//!
//! [`FocusApp`] is the top-level [`eframe::App`].  It never touches the
//! audio engine, radio or timer directly:
//!
//! * reads [`SharedState`] once per frame (short lock, copied into a
//!   [`Snapshot`]),
//! * sends [`UiCommand`]s to the coordinator with `try_send`.
//!
//! # Layout
//!
//! | Row | Content |
//! |-----|---------|
//! | Header | status dot, status text |
//! | Timer | phase, `n/total`, `MM:SS` |
//! | Transport | play/pause, rain, vinyl, reset |
//! | Mixer | music / rain / vinyl volume (`%`), speed (`1.00x`) |
//! | Footer | `Now Playing: …` or the version |
//!
//! Closing the window writes the mixer and speed positions back to
//! `settings.toml`, so the next start opens where this one left off.

use std::sync::PoisonError;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::Lane;
use crate::config::AppConfig;
use crate::coordinator::{PlaybackStatus, SharedState, UiCommand};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything one frame draws, copied out of [`SharedState`] so the lock is
/// not held while laying out widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: &'static str,
    pub period: String,
    pub clock: String,
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub rain_on: bool,
    pub vinyl_on: bool,
    pub track_line: String,
    pub music_volume: f32,
    pub rain_volume: f32,
    pub vinyl_volume: f32,
    pub speed: f32,
}

impl Snapshot {
    pub fn capture(state: &SharedState) -> Self {
        let s = state.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            phase: s.phase_label(),
            period: s.period_label(),
            clock: s.clock(),
            status: s.status,
            is_playing: s.is_playing,
            rain_on: s.rain_on,
            vinyl_on: s.vinyl_on,
            track_line: s.track_line(),
            music_volume: s.music_volume,
            rain_volume: s.rain_volume,
            vinyl_volume: s.vinyl_volume,
            speed: s.speed,
        }
    }

    fn volume(&self, lane: Lane) -> f32 {
        match lane {
            Lane::Music => self.music_volume,
            Lane::Rain => self.rain_volume,
            Lane::Vinyl => self.vinyl_volume,
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Colour of the status dot.
pub fn status_color(status: PlaybackStatus) -> egui::Color32 {
    match status {
        PlaybackStatus::Playing => egui::Color32::from_rgb(34, 197, 94),
        PlaybackStatus::Paused | PlaybackStatus::Buffering | PlaybackStatus::Blocked => {
            egui::Color32::from_rgb(245, 158, 11)
        }
        PlaybackStatus::StreamError => egui::Color32::from_rgb(239, 68, 68),
        PlaybackStatus::Ready => egui::Color32::from_rgb(120, 120, 120),
    }
}

/// `0.6` → `"60%"`.
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// `1.0` → `"1.00x"`.
pub fn format_speed(value: f64) -> String {
    format!("{:.2}x", value)
}

// ---------------------------------------------------------------------------
// FocusApp
// ---------------------------------------------------------------------------

/// eframe application for the timer, radio and mixer window.
pub struct FocusApp {
    state: SharedState,
    command_tx: mpsc::Sender<UiCommand>,
    /// Slider ranges and steps; saved with the final mixer on exit.
    config: AppConfig,
}

impl FocusApp {
    pub fn new(state: SharedState, command_tx: mpsc::Sender<UiCommand>, config: AppConfig) -> Self {
        Self {
            state,
            command_tx,
            config,
        }
    }

    /// The loaded settings with the current volumes and speed as the new
    /// defaults.
    pub fn settings_to_save(&self) -> AppConfig {
        let view = Snapshot::capture(&self.state);
        let mut config = self.config.clone();
        config.audio.music_volume = view.music_volume;
        config.audio.rain_volume = view.rain_volume;
        config.audio.vinyl_volume = view.vinyl_volume;
        config.audio.default_speed = view.speed;
        config
    }

    fn send(&self, command: UiCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("UI command dropped: {e}");
        }
    }

    // ── Panels ────────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui, view: &Snapshot) {
        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
            ui.painter()
                .circle_filled(rect.center(), 5.0, status_color(view.status));
            ui.label(
                egui::RichText::new(view.status.label())
                    .color(egui::Color32::from_rgb(200, 200, 200))
                    .size(13.0),
            );
        });
    }

    fn draw_timer(&self, ui: &mut egui::Ui, view: &Snapshot) {
        ui.add_space(6.0);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new(format!("{}  {}", view.phase, view.period))
                    .color(egui::Color32::from_rgb(160, 160, 160))
                    .size(14.0),
            );
            ui.label(
                egui::RichText::new(view.clock.as_str())
                    .color(egui::Color32::from_rgb(235, 235, 235))
                    .size(48.0)
                    .monospace(),
            );
        });
        ui.add_space(6.0);
    }

    fn draw_transport(&self, ui: &mut egui::Ui, view: &Snapshot) {
        ui.horizontal(|ui| {
            let play = if view.is_playing { "Pause" } else { "Play" };
            if ui
                .add(egui::Button::new(egui::RichText::new(play).size(13.0)))
                .clicked()
            {
                self.send(UiCommand::TogglePlay);
            }
            if ui
                .add(egui::Button::new(egui::RichText::new("Rain").size(13.0)).selected(view.rain_on))
                .clicked()
            {
                self.send(UiCommand::ToggleLane(Lane::Rain));
            }
            if ui
                .add(egui::Button::new(egui::RichText::new("Vinyl").size(13.0)).selected(view.vinyl_on))
                .clicked()
            {
                self.send(UiCommand::ToggleLane(Lane::Vinyl));
            }
            if ui
                .add(egui::Button::new(egui::RichText::new("Reset").size(13.0)))
                .clicked()
            {
                self.send(UiCommand::ResetTimer);
            }
        });
    }

    fn draw_mixer(&self, ui: &mut egui::Ui, view: &Snapshot) {
        ui.add_space(4.0);
        egui::Grid::new("mixer").num_columns(2).spacing([8.0, 6.0]).show(ui, |ui| {
            for lane in Lane::ALL {
                ui.label(
                    egui::RichText::new(lane.label())
                        .color(egui::Color32::from_rgb(180, 180, 180))
                        .size(12.0),
                );
                let mut value = view.volume(lane);
                let slider = egui::Slider::new(&mut value, 0.0..=1.0)
                    .step_by(f64::from(self.config.audio.volume_step))
                    .custom_formatter(|v, _| format_percent(v));
                if ui.add(slider).changed() {
                    self.send(UiCommand::SetVolume(lane, value));
                }
                ui.end_row();
            }

            ui.label(
                egui::RichText::new("Speed")
                    .color(egui::Color32::from_rgb(180, 180, 180))
                    .size(12.0),
            );
            let mut speed = view.speed;
            let slider = egui::Slider::new(&mut speed, self.config.audio.min_speed..=self.config.audio.max_speed)
                .step_by(f64::from(self.config.audio.speed_step))
                .custom_formatter(|v, _| format_speed(v));
            if ui.add(slider).changed() {
                self.send(UiCommand::SetSpeed(speed));
            }
            ui.end_row();
        });
    }

    fn draw_footer(&self, ui: &mut egui::Ui, view: &Snapshot) {
        ui.add_space(4.0);
        ui.label(
            egui::RichText::new(view.track_line.as_str())
                .color(egui::Color32::from_rgb(140, 140, 140))
                .size(11.0),
        );
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for FocusApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = Snapshot::capture(&self.state);

        // The clock only moves once a second, but status and track changes
        // arrive from the coordinator without a repaint request.
        ctx.request_repaint_after(Duration::from_millis(250));

        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgba_premultiplied(30, 30, 30, 240))
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::same(12));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_header(ui, &view);
            ui.separator();
            self.draw_timer(ui, &view);
            self.draw_transport(ui, &view);
            ui.separator();
            self.draw_mixer(ui, &view);
            ui.separator();
            self.draw_footer(ui, &view);
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Focus radio window closing");
        match self.settings_to_save().save() {
            Ok(()) => log::info!("mixer settings saved"),
            Err(e) => log::warn!("failed to save mixer settings: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
