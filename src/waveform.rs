//! Fixed-resolution waveform images.
//!
//! A clip of any length renders into the same 16000x80 intensity grid, so
//! the timeline can blit one texture regardless of zoom. Columns hold the
//! peak of their sample window (not RMS), which keeps transient spikes
//! visible after downsampling.

use crate::clip::AudioClip;

pub const WAVEFORM_WIDTH: usize = 16000;
pub const WAVEFORM_HEIGHT: usize = 80;
pub const FADE_STEPS: usize = 256;

/// Opacity lookup from normalized distance-from-center, non-increasing.
/// Sampled from the first half of a white-to-transparent ramp, so it runs
/// 1.0 at the center down to 0.5 at the tip of a bar.
#[derive(Debug, Clone)]
pub struct FadeProfile {
    table: Vec<f32>,
}

impl FadeProfile {
    pub fn new() -> Self {
        let mut table = vec![0.0f32; FADE_STEPS];
        for (i, v) in table.iter_mut().enumerate() {
            let t = i as f32 / (FADE_STEPS - 1) as f32 * 0.5;
            *v = 1.0 - t;
        }
        Self { table }
    }

    pub fn opacity(&self, index: usize) -> f32 {
        self.table[index.min(self.table.len() - 1)]
    }
}

impl Default for FadeProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Row-major intensity grid in [0, 1]. Regenerated whole; never patched.
#[derive(Debug, Clone)]
pub struct WaveformImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl WaveformImage {
    pub fn transparent(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn intensity(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn is_transparent(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }
}

/// Column owning time `t` on a timeline `duration` seconds long.
///
/// The renderer anchors the image by the same linear mapping, which is what
/// keeps the playhead and the waveform pixel-aligned at every zoom.
pub fn column_for_time(t: f32, duration: f32, width: usize) -> usize {
    if duration <= 0.0 || width == 0 {
        return 0;
    }
    ((t / duration * width as f32).floor() as usize).min(width - 1)
}

/// Renders `clip` into a fresh image. Pure; an empty clip yields a fully
/// transparent image rather than an error.
pub fn generate(clip: &AudioClip, fade: bool) -> WaveformImage {
    let mut image = WaveformImage::transparent(WAVEFORM_WIDTH, WAVEFORM_HEIGHT);
    let samples = clip.samples();
    let total = samples.len();
    if total == 0 {
        return image;
    }
    let profile = if fade { Some(FadeProfile::new()) } else { None };
    let step = (total / WAVEFORM_WIDTH).max(1);
    let half = WAVEFORM_HEIGHT / 2;
    for x in 0..WAVEFORM_WIDTH {
        let start = x * step;
        if start >= total {
            break;
        }
        let end = ((x + 1) * step).min(total);
        let mut peak = 0.0f32;
        for &s in &samples[start..end] {
            if !s.is_finite() {
                continue;
            }
            peak = peak.max(s.abs());
        }
        let bar = (peak.clamp(0.0, 1.0) * half as f32).ceil() as usize;
        for y in 0..bar {
            let value = match &profile {
                Some(profile) => {
                    let idx = (y as f32 / bar as f32 * (FADE_STEPS - 1) as f32).round() as usize;
                    profile.opacity(idx)
                }
                None => 1.0,
            };
            image.set(x, half + y, value);
            image.set(x, half - y, value);
        }
    }
    image
}
