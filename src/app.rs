use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::clip::AudioClip;
use crate::overlay::{self, OverlayFrame};
use crate::settings::{OverlaySettings, MAX_BAR_HEIGHT, MIN_BAR_HEIGHT};
use crate::sync::{SyncConfig, SyncStateMachine, TimelineSampler};
use crate::transport::CpalTransport;
use crate::waveform::{self, WaveformImage};

/// Options gathered from the command line before the app starts.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub open_file: Option<PathBuf>,
    pub open_folder: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub volume: Option<f32>,
    pub fade: Option<bool>,
    pub debug_summary: bool,
    pub debug_summary_delay_frames: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            open_file: None,
            open_folder: None,
            settings_path: None,
            volume: None,
            fade: None,
            debug_summary: false,
            debug_summary_delay_frames: 10,
        }
    }
}

/// The built-in timeline that stands in for a host sequencer. `update`
/// advances the cursor by wall-clock dt; the sync machine only ever sees
/// the per-frame samples this produces.
#[derive(Debug)]
pub struct HostTimeline {
    pub playing: bool,
    pub looping: bool,
    pub cursor: f32,
    tick: u64,
}

impl Default for HostTimeline {
    fn default() -> Self {
        Self {
            playing: false,
            looping: true,
            cursor: 0.0,
            tick: 0,
        }
    }
}

impl TimelineSampler for HostTimeline {
    fn sample(&mut self) -> Option<crate::sync::TimelineSample> {
        self.tick = self.tick.wrapping_add(1);
        Some(crate::sync::TimelineSample {
            playing: self.playing,
            position: self.cursor,
            tick: self.tick,
        })
    }
}

pub struct TimelinePreviewer {
    pub settings: OverlaySettings,
    settings_path: PathBuf,
    transport: CpalTransport,
    machine: SyncStateMachine,
    pub timeline: HostTimeline,
    pub files: Vec<PathBuf>,
    pub selected: Option<usize>,
    clip: Option<Arc<AudioClip>>,
    waveform: Option<WaveformImage>,
    texture: Option<egui::TextureHandle>,
    waveform_rx: Option<mpsc::Receiver<(WaveformImage, u64)>>,
    waveform_gen_counter: u64,
    waveform_expected_gen: u64,
    pub overlay_enabled: bool,
    pub lane_expanded: bool,
    pub view_start: f32,
    pub zoom_pps: f32,
    pub status: String,
    debug_summary: bool,
    debug_summary_delay_frames: u32,
    frame_count: u64,
}

impl TimelinePreviewer {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup: StartupConfig) -> Self {
        let transport = match CpalTransport::new() {
            Ok(t) => t,
            Err(err) => {
                log::warn!("audio output unavailable ({err:#}); preview runs detached");
                CpalTransport::detached()
            }
        };
        Self::with_transport(transport, startup)
    }

    /// Streamless variant for headless tests.
    pub fn new_for_test(_cc: &eframe::CreationContext<'_>, startup: StartupConfig) -> Self {
        Self::with_transport(CpalTransport::detached(), startup)
    }

    fn with_transport(transport: CpalTransport, startup: StartupConfig) -> Self {
        let settings_path = startup
            .settings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("wavesync.toml"));
        let mut settings = match OverlaySettings::load(&settings_path) {
            Ok(s) => s,
            Err(err) => {
                if settings_path.exists() {
                    log::warn!("settings unreadable ({err:#}); using defaults");
                }
                OverlaySettings::default()
            }
        };
        if let Some(v) = startup.volume {
            settings.volume = v;
        }
        if let Some(f) = startup.fade {
            settings.fade = f;
        }
        settings.sanitize();

        let mut app = Self {
            settings,
            settings_path,
            transport,
            machine: SyncStateMachine::new(SyncConfig::default()),
            timeline: HostTimeline::default(),
            files: Vec::new(),
            selected: None,
            clip: None,
            waveform: None,
            texture: None,
            waveform_rx: None,
            waveform_gen_counter: 0,
            waveform_expected_gen: 0,
            overlay_enabled: true,
            lane_expanded: true,
            view_start: 0.0,
            zoom_pps: 100.0,
            status: String::new(),
            debug_summary: startup.debug_summary,
            debug_summary_delay_frames: startup.debug_summary_delay_frames,
            frame_count: 0,
        };
        if let Some(dir) = startup.open_folder.clone() {
            app.scan_folder(&dir);
        }
        if let Some(path) = startup.open_file.clone() {
            app.open_file(&path);
        }
        app
    }

    pub fn open_file(&mut self, path: &Path) {
        match AudioClip::from_wav_file(path) {
            Ok(clip) => {
                let clip = Arc::new(clip);
                self.transport.set_clip(Some(clip.clone()));
                self.machine.reset();
                self.timeline.cursor = 0.0;
                self.timeline.playing = false;
                self.status = format!("{} ({:.2}s)", clip.name(), clip.duration());
                self.selected = self.files.iter().position(|p| p == path);
                self.clip = Some(clip);
                self.request_waveform();
            }
            Err(err) => {
                log::warn!("open failed: {err:#}");
                self.status = format!("open failed: {}", path.display());
            }
        }
    }

    pub fn scan_folder(&mut self, dir: &Path) {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"))
            })
            .collect();
        files.sort();
        self.status = format!("{} clips in {}", files.len(), dir.display());
        self.files = files;
        self.selected = None;
    }

    pub fn toggle_play(&mut self) {
        let Some(clip) = self.clip.as_ref() else {
            return;
        };
        if !self.timeline.playing && self.timeline.cursor >= clip.duration() {
            self.timeline.cursor = 0.0;
        }
        self.timeline.playing = !self.timeline.playing;
    }

    fn advance_timeline(&mut self, dt: f32) {
        let Some(clip) = self.clip.as_ref() else {
            return;
        };
        let duration = clip.duration();
        if !self.timeline.playing || duration <= 0.0 {
            return;
        }
        let mut next = self.timeline.cursor + dt;
        if next >= duration {
            if self.timeline.looping {
                next %= duration;
            } else {
                next = duration;
                self.timeline.playing = false;
            }
        }
        self.timeline.cursor = next;
    }

    fn run_sync_tick(&mut self) {
        let Some(clip) = self.clip.as_ref() else {
            return;
        };
        let duration = clip.duration();
        let sample = self.timeline.sample();
        self.machine
            .tick(sample, duration, self.settings.volume, &mut self.transport);
    }

    fn request_waveform(&mut self) {
        // Cancel any in-flight job by dropping its receiver.
        self.waveform_rx = None;
        let Some(clip) = self.clip.clone() else {
            self.waveform = None;
            self.texture = None;
            return;
        };
        self.waveform_gen_counter = self.waveform_gen_counter.wrapping_add(1);
        let gen = self.waveform_gen_counter;
        self.waveform_expected_gen = gen;
        let fade = self.settings.fade;
        let (tx, rx) = mpsc::channel::<(WaveformImage, u64)>();
        std::thread::spawn(move || {
            let image = waveform::generate(&clip, fade);
            let _ = tx.send((image, gen));
        });
        self.waveform_rx = Some(rx);
    }

    fn drain_waveform_result(&mut self, ctx: &egui::Context) {
        if let Some(rx) = &self.waveform_rx {
            if let Ok((image, gen)) = rx.try_recv() {
                // Generation guard avoids applying a stale image after rapid reloads.
                if gen == self.waveform_expected_gen {
                    self.texture = Some(ctx.load_texture(
                        "waveform",
                        color_image_from(&image),
                        egui::TextureOptions::NEAREST,
                    ));
                    self.waveform = Some(image);
                    ctx.request_repaint();
                }
                self.waveform_rx = None;
            }
        }
    }

    pub fn debug_summary_text(&self) -> String {
        let mut lines = Vec::new();
        match self.clip.as_ref() {
            Some(clip) => {
                lines.push(format!(
                    "clip: {} ({}ch {}Hz)",
                    clip.name(),
                    clip.channels(),
                    clip.sample_rate()
                ));
                lines.push(format!("duration: {:.3}", clip.duration()));
            }
            None => lines.push("clip: none".to_string()),
        }
        lines.push(format!(
            "timeline: {:.3} playing {} loop {}",
            self.timeline.cursor, self.timeline.playing, self.timeline.looping
        ));
        lines.push(format!(
            "sync: {:?} scrubbing {}",
            self.machine.phase(),
            self.machine.is_scrubbing()
        ));
        lines.push(format!(
            "sampled: last {:.3} prev {:.3}",
            self.machine.last_position(),
            self.machine.previous_position()
        ));
        lines.push(format!(
            "transport: {:.3} playing {}",
            self.transport.position_seconds(),
            self.transport.is_playing()
        ));
        let waveform = if self.waveform.is_some() {
            "ready"
        } else if self.waveform_rx.is_some() {
            "pending"
        } else {
            "none"
        };
        lines.push(format!("waveform: {}", waveform));
        lines.join("\n")
    }

    fn ui_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                let play_text = if self.timeline.playing {
                    "Pause (Space)"
                } else {
                    "Play (Space)"
                };
                if ui.button(play_text).clicked() {
                    self.toggle_play();
                }
                ui.checkbox(&mut self.timeline.looping, "Loop");
                ui.separator();
                if ui.button("Open File...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("WAV", &["wav"])
                        .pick_file()
                    {
                        self.open_file(&path);
                    }
                }
                if ui.button("Open Folder...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                        self.scan_folder(&dir);
                    }
                }
                ui.separator();
                if !self.status.is_empty() {
                    ui.label(egui::RichText::new(&self.status).weak());
                }
            });
        });
    }

    fn ui_library_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("library")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Clips");
                let mut open_request: Option<PathBuf> = None;
                egui::ScrollArea::vertical()
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        for (i, path) in self.files.iter().enumerate() {
                            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("?");
                            if ui.selectable_label(self.selected == Some(i), name).clicked() {
                                open_request = Some(path.clone());
                            }
                        }
                        if self.files.is_empty() {
                            ui.label(egui::RichText::new("no folder scanned").weak());
                        }
                    });
                if let Some(path) = open_request {
                    self.open_file(&path);
                }
                ui.separator();
                self.ui_settings(ui);
            });
    }

    fn ui_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Overlay");
        ui.checkbox(&mut self.overlay_enabled, "Show waveform");
        ui.horizontal(|ui| {
            ui.label("Waveform");
            ui.color_edit_button_srgba_unmultiplied(&mut self.settings.waveform_color);
        });
        ui.horizontal(|ui| {
            ui.label("Background");
            ui.color_edit_button_srgba_unmultiplied(&mut self.settings.background_color);
        });
        ui.checkbox(&mut self.settings.fade, "Fade waveform");
        ui.horizontal(|ui| {
            ui.label("Volume");
            ui.add(egui::Slider::new(&mut self.settings.volume, 0.0..=1.0));
        });
    }

    fn ui_timeline_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(clip) = self.clip.clone() else {
                ui.centered_and_justified(|ui| {
                    ui.label("Open a WAV file to begin");
                });
                return;
            };
            let duration = clip.duration();

            ui.horizontal(|ui| {
                ui.label("Zoom");
                ui.add(
                    egui::Slider::new(&mut self.zoom_pps, 10.0..=500.0)
                        .logarithmic(true)
                        .suffix(" px/s"),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!(
                            "{:.2}s / {:.2}s",
                            self.timeline.cursor, duration
                        ))
                        .monospace(),
                    );
                });
            });

            // Lane header mirrors a track row: the name toggles the body.
            ui.horizontal(|ui| {
                let header = format!("♪ {}", clip.name());
                if ui.selectable_label(self.lane_expanded, header).clicked() {
                    self.lane_expanded = !self.lane_expanded;
                }
                if self.lane_expanded {
                    ui.label("Size:");
                    ui.add(
                        egui::Slider::new(
                            &mut self.settings.bar_height,
                            MIN_BAR_HEIGHT..=MAX_BAR_HEIGHT,
                        )
                        .show_value(false),
                    );
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new(format!("{duration:.2}s")).weak());
                });
            });

            if !self.lane_expanded {
                return;
            }

            let lane_h = (self.settings.bar_height - 20.0).max(20.0);
            let avail_w = ui.available_width().max(1.0);
            let (rect, resp) =
                ui.allocate_exact_size(egui::vec2(avail_w, lane_h), egui::Sense::click_and_drag());

            // Scrub: pointer sets the cursor and pauses the timeline.
            if resp.clicked() || resp.dragged() {
                if let Some(pos) = resp.interact_pointer_pos() {
                    let t = self.view_start + (pos.x - rect.left()) / self.zoom_pps.max(1.0);
                    self.timeline.cursor = t.clamp(0.0, duration);
                    self.timeline.playing = false;
                }
            }

            // Wheel pans the visible window.
            let pointer_over = ui
                .input(|i| i.pointer.hover_pos())
                .map_or(false, |p| rect.contains(p));
            if pointer_over {
                let wheel = ui.input(|i| i.raw_scroll_delta);
                let d = if wheel.x.abs() > wheel.y.abs() {
                    wheel.x
                } else {
                    wheel.y
                };
                if d != 0.0 {
                    self.view_start -= d / self.zoom_pps.max(1.0);
                }
            }

            let view_span = rect.width() / self.zoom_pps.max(1.0);
            // Keep a playing cursor inside the window.
            if self.timeline.playing
                && (self.timeline.cursor < self.view_start
                    || self.timeline.cursor > self.view_start + view_span)
            {
                self.view_start = self.timeline.cursor - view_span * 0.1;
            }
            let max_start = (duration - view_span).max(0.0);
            self.view_start = self.view_start.clamp(0.0, max_start);

            if self.overlay_enabled {
                let frame = OverlayFrame {
                    rect,
                    view_start: self.view_start,
                    view_span,
                    current_time: self.timeline.cursor,
                    duration,
                };
                let layout = overlay::layout(&frame);
                overlay::paint(ui.painter(), &layout, &self.settings, self.texture.as_ref());
            }
        });
    }
}

impl eframe::App for TimelinePreviewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.drain_waveform_result(ctx);

        let dt = ctx.input(|i| i.stable_dt).clamp(0.0, 0.1);
        self.advance_timeline(dt);
        self.run_sync_tick();

        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.toggle_play();
        }

        let settings_before = self.settings.clone();

        self.ui_top_bar(ctx);
        self.ui_library_panel(ctx);
        self.ui_timeline_panel(ctx);

        if self.settings != settings_before {
            self.settings.sanitize();
            if self.settings.fade != settings_before.fade {
                self.request_waveform();
            }
            if let Err(err) = self.settings.save(&self.settings_path) {
                log::warn!("settings save failed: {err:#}");
            }
        }

        if self.debug_summary && self.frame_count >= u64::from(self.debug_summary_delay_frames) {
            println!("{}", self.debug_summary_text());
            self.debug_summary = false;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        ctx.request_repaint_after(Duration::from_millis(16));
    }
}

/// White pixels with the waveform intensity in the alpha channel; the
/// overlay tints it with the configured color at paint time.
fn color_image_from(image: &WaveformImage) -> egui::ColorImage {
    let (w, h) = (image.width(), image.height());
    let mut rgba = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let a = (image.intensity(x, y).clamp(0.0, 1.0) * 255.0).round() as u8;
            let at = (y * w + x) * 4;
            rgba[at] = 255;
            rgba[at + 1] = 255;
            rgba[at + 2] = 255;
            rgba[at + 3] = a;
        }
    }
    egui::ColorImage::from_rgba_unmultiplied([w, h], &rgba)
}
