//! Persisted overlay and preview settings.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const MIN_BAR_HEIGHT: f32 = 60.0;
pub const MAX_BAR_HEIGHT: f32 = 200.0;

/// The configuration surface shared by the settings panel, the overlay
/// painter, and the sync tick. Plain values; only clamping, no validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// RGBA, straight (unmultiplied) alpha.
    pub waveform_color: [u8; 4],
    pub background_color: [u8; 4],
    /// Lane height in pixels, including the 20 px header.
    pub bar_height: f32,
    /// Pre-multiply the vertical fade profile into the waveform image.
    pub fade: bool,
    /// Preview volume in [0, 1].
    pub volume: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            waveform_color: [255, 77, 77, 153],
            background_color: [38, 38, 38, 128],
            bar_height: 80.0,
            fade: true,
            volume: 1.0,
        }
    }
}

impl OverlaySettings {
    pub fn sanitize(&mut self) {
        self.bar_height = if self.bar_height.is_finite() {
            self.bar_height.clamp(MIN_BAR_HEIGHT, MAX_BAR_HEIGHT)
        } else {
            Self::default().bar_height
        };
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            Self::default().volume
        };
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read settings {}", path.display()))?;
        let mut settings: Self = toml::from_str(&text)
            .with_context(|| format!("parse settings {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("write settings {}", path.display()))?;
        Ok(())
    }

    pub fn waveform_color32(&self) -> egui::Color32 {
        let [r, g, b, a] = self.waveform_color;
        egui::Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    pub fn background_color32(&self) -> egui::Color32 {
        let [r, g, b, a] = self.background_color;
        egui::Color32::from_rgba_unmultiplied(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let mut settings = OverlaySettings::default();
        let unchanged = settings.clone();
        settings.sanitize();
        assert_eq!(settings, unchanged);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut settings = OverlaySettings {
            bar_height: 20.0,
            volume: 3.0,
            ..OverlaySettings::default()
        };
        settings.sanitize();
        assert_eq!(settings.bar_height, MIN_BAR_HEIGHT);
        assert_eq!(settings.volume, 1.0);

        settings.bar_height = 900.0;
        settings.volume = -0.5;
        settings.sanitize();
        assert_eq!(settings.bar_height, MAX_BAR_HEIGHT);
        assert_eq!(settings.volume, 0.0);
    }

    #[test]
    fn sanitize_replaces_non_finite_values() {
        let mut settings = OverlaySettings {
            bar_height: f32::NAN,
            volume: f32::INFINITY,
            ..OverlaySettings::default()
        };
        settings.sanitize();
        assert_eq!(settings.bar_height, OverlaySettings::default().bar_height);
        assert_eq!(settings.volume, OverlaySettings::default().volume);
    }

    #[test]
    fn toml_round_trip_preserves_fields() {
        let settings = OverlaySettings {
            waveform_color: [10, 20, 30, 40],
            background_color: [1, 2, 3, 4],
            bar_height: 120.0,
            fade: false,
            volume: 0.25,
        };
        let text = toml::to_string_pretty(&settings).expect("serialize");
        let parsed: OverlaySettings = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn partial_toml_fills_defaults_and_clamps() {
        let parsed: OverlaySettings =
            toml::from_str("volume = 9.0\n").expect("parse partial");
        // serde fills the rest; load() is what clamps
        assert_eq!(parsed.fade, OverlaySettings::default().fade);
        let mut clamped = parsed;
        clamped.sanitize();
        assert_eq!(clamped.volume, 1.0);
    }
}
