use egui::Vec2;
use egui_kittest::Harness;

use crate::{StartupConfig, TimelinePreviewer};

/// The headless harness reports no GPU texture limit, so egui falls back to
/// 2048 and rejects the 16000-wide waveform texture; report the common
/// desktop limit a real glow/wgpu backend would.
const MAX_TEXTURE_SIDE: usize = 16384;

pub fn harness_with_startup(startup: StartupConfig) -> Harness<'static, TimelinePreviewer> {
    Harness::builder()
        .with_size(Vec2::new(1280.0, 720.0))
        .with_os(egui::os::OperatingSystem::from_target_os())
        .build_eframe(|cc| {
            cc.egui_ctx
                .input_mut(|i| i.max_texture_side = MAX_TEXTURE_SIDE);
            TimelinePreviewer::new_for_test(cc, startup)
        })
}

pub fn harness_default() -> Harness<'static, TimelinePreviewer> {
    harness_with_startup(StartupConfig::default())
}
