#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use wavesync::app;
use wavesync::clip::AudioClip;
use wavesync::settings::OverlaySettings;

struct CliOptions {
    startup: app::StartupConfig,
    export: Option<(PathBuf, PathBuf)>,
}

fn parse_cli() -> CliOptions {
    let mut cli = CliOptions {
        startup: app::StartupConfig::default(),
        export: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--open-file" => {
                if let Some(p) = args.next() {
                    cli.startup.open_file = Some(PathBuf::from(p));
                }
            }
            "--open-folder" => {
                if let Some(p) = args.next() {
                    cli.startup.open_folder = Some(PathBuf::from(p));
                }
            }
            "--settings" => {
                if let Some(p) = args.next() {
                    cli.startup.settings_path = Some(PathBuf::from(p));
                }
            }
            "--volume" => {
                if let Some(v) = args.next() {
                    if let Ok(v) = v.parse::<f32>() {
                        cli.startup.volume = Some(v);
                    }
                }
            }
            "--fade" => {
                if let Some(v) = args.next() {
                    let flag = match v.to_lowercase().as_str() {
                        "on" | "true" | "1" => Some(true),
                        "off" | "false" | "0" => Some(false),
                        _ => None,
                    };
                    if let Some(flag) = flag {
                        cli.startup.fade = Some(flag);
                    }
                }
            }
            "--export-waveform" => {
                if let (Some(input), Some(output)) = (args.next(), args.next()) {
                    cli.export = Some((PathBuf::from(input), PathBuf::from(output)));
                }
            }
            "--debug-summary" => {
                cli.startup.debug_summary = true;
            }
            "--debug-summary-delay" => {
                if let Some(v) = args.next() {
                    if let Ok(n) = v.parse::<u32>() {
                        cli.startup.debug_summary_delay_frames = n;
                    }
                }
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage:\n  wavesync [options] [file.wav|folder]\n\nOptions:\n  --open-file <clip.wav>\n  --open-folder <dir>\n  --settings <path.toml>\n  --volume <0..1>\n  --fade <on|off>\n  --export-waveform <in.wav> <out.png>\n  --debug-summary\n  --debug-summary-delay <frames>\n  --help"
                );
                std::process::exit(0);
            }
            _ => {
                if arg.starts_with('-') {
                    continue;
                }
                let path = PathBuf::from(&arg);
                if path.is_dir() {
                    cli.startup.open_folder = Some(path);
                } else {
                    cli.startup.open_file = Some(path);
                }
            }
        }
    }
    cli
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
    let cli = parse_cli();
    if let Some((input, output)) = cli.export {
        if let Err(err) = export_waveform(&input, &output, &cli.startup) {
            eprintln!("export failed: {err:#}");
            std::process::exit(1);
        }
        return Ok(());
    }
    let startup = cli.startup;
    let viewport = egui::ViewportBuilder::default()
        .with_min_inner_size([900.0, 540.0])
        .with_inner_size([1180.0, 640.0]);
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "WaveSync",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::TimelinePreviewer::new(cc, startup.clone())))),
    )
}

/// Headless render of a clip's waveform strip, colored like the overlay.
fn export_waveform(input: &Path, output: &Path, startup: &app::StartupConfig) -> anyhow::Result<()> {
    let clip = AudioClip::from_wav_file(input)?;
    let mut settings = match startup.settings_path.as_deref() {
        Some(path) => match OverlaySettings::load(path) {
            Ok(s) => s,
            Err(err) => {
                log::warn!("settings unreadable ({err:#}); using defaults");
                OverlaySettings::default()
            }
        },
        None => OverlaySettings::default(),
    };
    if let Some(fade) = startup.fade {
        settings.fade = fade;
    }
    let wave = wavesync::waveform::generate(&clip, settings.fade);
    let [r, g, b, a] = settings.waveform_color;
    let mut out = image::RgbaImage::new(wave.width() as u32, wave.height() as u32);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let alpha = wave.intensity(x as usize, y as usize) * a as f32;
        *pixel = image::Rgba([r, g, b, alpha.round() as u8]);
    }
    out.save(output)
        .with_context(|| format!("write {}", output.display()))?;
    Ok(())
}
