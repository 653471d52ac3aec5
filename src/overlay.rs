//! Timeline overlay: layout is pure geometry, painting replays it.
//!
//! The waveform blit is anchored at the timeline's time-zero pixel and
//! clipped to the lane by narrowing both the destination rect and the UV
//! range, never by shifting the image. That keeps the texture aligned with
//! the host's time axis at every scroll position.

use egui::{pos2, vec2, Align2, Color32, FontId, Rect};

use crate::settings::OverlaySettings;

pub const GRID_STEP_SECONDS: f32 = 5.0;
pub const PLAYHEAD_WIDTH: f32 = 2.0;

/// Inputs for one overlay frame.
#[derive(Debug, Clone, Copy)]
pub struct OverlayFrame {
    /// Lane content rect in screen pixels.
    pub rect: Rect,
    /// Clip time at the lane's left edge, seconds.
    pub view_start: f32,
    /// Seconds of clip time spanned by the lane width.
    pub view_span: f32,
    /// Host timeline cursor, seconds.
    pub current_time: f32,
    /// Clip length, seconds.
    pub duration: f32,
}

impl OverlayFrame {
    pub fn pixels_per_second(&self) -> f32 {
        if self.view_span <= 0.0 {
            return 0.0;
        }
        self.rect.width() / self.view_span
    }
}

/// Waveform blit: destination rect plus the UV sub-range left after
/// clipping against the lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveBlit {
    pub dest: Rect,
    pub uv: Rect,
}

/// A vertical grid line with an optional time label.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub x: f32,
    pub label: Option<String>,
}

/// Playhead line plus its top marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playhead {
    pub line: Rect,
    pub marker: Rect,
}

/// Draw commands for one overlay frame.
#[derive(Debug, Clone)]
pub struct OverlayLayout {
    pub background: Rect,
    pub top_border: Rect,
    pub bottom_border: Rect,
    pub wave: Option<WaveBlit>,
    pub grid: Vec<GridLine>,
    pub playhead: Option<Playhead>,
}

/// Computes all overlay geometry for one frame. Pure; holds no state
/// between calls.
pub fn layout(frame: &OverlayFrame) -> OverlayLayout {
    let rect = frame.rect;
    let mut out = OverlayLayout {
        background: rect,
        top_border: Rect::from_min_size(rect.min, vec2(rect.width(), 1.0)),
        bottom_border: Rect::from_min_size(
            pos2(rect.left(), rect.bottom() - 1.0),
            vec2(rect.width(), 1.0),
        ),
        wave: None,
        grid: Vec::new(),
        playhead: None,
    };
    if frame.view_span <= 0.0 || frame.duration <= 0.0 {
        return out;
    }
    let pps = frame.pixels_per_second();

    let zero_x = rect.left() - frame.view_start * pps;
    let full_width = frame.duration * pps;
    let left = zero_x.max(rect.left());
    let right = (zero_x + full_width).min(rect.right());
    if right > left {
        let u0 = (left - zero_x) / full_width;
        let u1 = (right - zero_x) / full_width;
        out.wave = Some(WaveBlit {
            dest: Rect::from_min_max(pos2(left, rect.top()), pos2(right, rect.bottom())),
            uv: Rect::from_min_max(pos2(u0, 0.0), pos2(u1, 1.0)),
        });
    }

    let mut t = 0.0f32;
    while t <= frame.duration {
        let x = rect.left() + (t - frame.view_start) * pps;
        if x >= rect.left() && x <= rect.right() {
            let label = if t > 0.0 { Some(format!("{t:.0}s")) } else { None };
            out.grid.push(GridLine { x, label });
        }
        t += GRID_STEP_SECONDS;
    }

    let x = rect.left() + (frame.current_time - frame.view_start) * pps;
    if x >= rect.left() && x <= rect.right() {
        out.playhead = Some(Playhead {
            line: Rect::from_min_size(
                pos2(x - PLAYHEAD_WIDTH / 2.0, rect.top()),
                vec2(PLAYHEAD_WIDTH, rect.height()),
            ),
            marker: Rect::from_min_size(pos2(x - 3.0, rect.top() - 1.0), vec2(6.0, 3.0)),
        });
    }

    out
}

/// Replays a layout into the painter. `texture` is the white-intensity
/// waveform texture; it picks up the configured color via tint.
pub fn paint(
    painter: &egui::Painter,
    layout: &OverlayLayout,
    settings: &OverlaySettings,
    texture: Option<&egui::TextureHandle>,
) {
    let rect = layout.background;
    painter.rect_filled(rect, 0.0, settings.background_color32());
    painter.rect_filled(
        layout.top_border,
        0.0,
        Color32::from_rgba_unmultiplied(38, 38, 38, 204),
    );
    painter.rect_filled(
        layout.bottom_border,
        0.0,
        Color32::from_rgba_unmultiplied(102, 102, 102, 128),
    );
    if let (Some(wave), Some(texture)) = (&layout.wave, texture) {
        painter.image(texture.id(), wave.dest, wave.uv, settings.waveform_color32());
    }
    for line in &layout.grid {
        painter.rect_filled(
            Rect::from_min_size(pos2(line.x, rect.top()), vec2(1.0, rect.height())),
            0.0,
            Color32::from_white_alpha(20),
        );
        if let Some(label) = &line.label {
            painter.text(
                pos2(line.x + 2.0, rect.top() + 2.0),
                Align2::LEFT_TOP,
                label,
                FontId::proportional(9.0),
                Color32::from_rgba_unmultiplied(153, 153, 153, 204),
            );
        }
    }
    if let Some(playhead) = &layout.playhead {
        painter.rect_filled(
            playhead.line,
            0.0,
            Color32::from_rgba_unmultiplied(255, 77, 77, 230),
        );
        painter.rect_filled(
            playhead.marker,
            0.0,
            Color32::from_rgba_unmultiplied(255, 77, 77, 255),
        );
    }
}
