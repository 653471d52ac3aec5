//! cpal-backed preview transport.
//!
//! The stream callback shares state with the UI thread through atomics and
//! an `ArcSwapOption` clip slot only; no locks. Clip sample rates that
//! differ from the device rate are bridged by a fractional frame cursor
//! with linear interpolation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arc_swap::ArcSwapOption;
use atomic_float::AtomicF32;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::clip::AudioClip;
use crate::sync::PreviewTransport;

pub struct SharedPreview {
    pub clip: ArcSwapOption<AudioClip>,
    pub volume: AtomicF32, // 0.0..1.0 linear gain
    pub playing: AtomicBool,
    pub frame_pos: AtomicUsize,
    pub frame_pos_f: AtomicF32, // fractional frame for rate conversion
    pub out_sample_rate: u32,
}

pub struct CpalTransport {
    _stream: Option<cpal::Stream>,
    pub shared: Arc<SharedPreview>,
    volume_warned: bool,
}

impl CpalTransport {
    fn new_shared(out_sample_rate: u32) -> Arc<SharedPreview> {
        Arc::new(SharedPreview {
            clip: ArcSwapOption::from(None),
            volume: AtomicF32::new(1.0),
            playing: AtomicBool::new(false),
            frame_pos: AtomicUsize::new(0),
            frame_pos_f: AtomicF32::new(0.0),
            out_sample_rate,
        })
    }

    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default output device")?;
        let cfg = device
            .default_output_config()
            .context("no default output config")?;

        let shared = Self::new_shared(cfg.sample_rate());

        let stream = match cfg.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &cfg.into(), shared.clone())?
            }
            _ => bail!("unsupported sample format"),
        };

        Ok(Self {
            _stream: Some(stream),
            shared,
            volume_warned: false,
        })
    }

    /// Transport without an output stream. Accepts every call and tracks
    /// position, but produces no sound; used when no device is available
    /// and by tests.
    pub fn detached() -> Self {
        Self {
            _stream: None,
            shared: Self::new_shared(48_000),
            volume_warned: false,
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        shared: Arc<SharedPreview>,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let out_channels = cfg.channels as usize;
        let err_fn = |e| log::warn!("audio stream error: {e}");
        let stream = device.build_output_stream(
            cfg,
            move |data: &mut [T], _| {
                let maybe_clip = shared.clip.load();
                let playing = shared.playing.load(Ordering::Relaxed);
                let volume = shared.volume.load(Ordering::Relaxed);
                let clip = match maybe_clip.as_ref() {
                    Some(clip) if playing && !clip.is_empty() => clip,
                    _ => {
                        for s in data.iter_mut() {
                            *s = T::from_sample(0.0);
                        }
                        return;
                    }
                };
                let frames = clip.frames();
                let src_channels = clip.channels();
                let samples = clip.samples();
                let step = clip.sample_rate() as f32 / shared.out_sample_rate.max(1) as f32;
                let mut pos_f = shared.frame_pos_f.load(Ordering::Relaxed);
                if !pos_f.is_finite() || pos_f < 0.0 {
                    pos_f = 0.0;
                }
                for frame in data.chunks_mut(out_channels) {
                    if pos_f.floor() as usize >= frames {
                        shared.playing.store(false, Ordering::Relaxed);
                        for ch in frame.iter_mut() {
                            *ch = T::from_sample(0.0);
                        }
                        continue;
                    }
                    let i0 = pos_f.floor() as usize;
                    let i1 = (i0 + 1).min(frames - 1);
                    let t = (pos_f - i0 as f32).clamp(0.0, 1.0);
                    for (out_ch, out_sample) in frame.iter_mut().enumerate() {
                        let src_ch = if src_channels == 1 {
                            0
                        } else {
                            out_ch.min(src_channels - 1)
                        };
                        let a = samples[i0 * src_channels + src_ch];
                        let b = samples[i1 * src_channels + src_ch];
                        let s = ((a * (1.0 - t) + b * t) * volume).clamp(-1.0, 1.0);
                        *out_sample = T::from_sample(s);
                    }
                    pos_f += step;
                }
                shared
                    .frame_pos
                    .store((pos_f.floor() as usize).min(frames), Ordering::Relaxed);
                shared.frame_pos_f.store(pos_f, Ordering::Relaxed);
            },
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// Publishes a new clip (or clears it) and rewinds. Stops playback; the
    /// sync machine decides when to start again.
    pub fn set_clip(&self, clip: Option<Arc<AudioClip>>) {
        self.shared.clip.store(clip);
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.frame_pos.store(0, Ordering::Relaxed);
        self.shared.frame_pos_f.store(0.0, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn position_seconds(&self) -> f32 {
        let clip = self.shared.clip.load();
        let Some(clip) = clip.as_ref() else {
            return 0.0;
        };
        self.shared.frame_pos.load(Ordering::Relaxed) as f32 / clip.sample_rate() as f32
    }

    fn seek_seconds(&self, clip: &AudioClip, at: f32) {
        // Clamp to the final frame like any in-range seek.
        let frame = ((at.max(0.0) * clip.sample_rate() as f32) as usize)
            .min(clip.frames().saturating_sub(1));
        self.shared.frame_pos.store(frame, Ordering::Relaxed);
        self.shared.frame_pos_f.store(frame as f32, Ordering::Relaxed);
    }
}

impl PreviewTransport for CpalTransport {
    fn start(&mut self, at_seconds: f32) -> Result<()> {
        let clip = self.shared.clip.load();
        let Some(clip) = clip.as_ref() else {
            bail!("no clip loaded");
        };
        self.seek_seconds(clip, at_seconds);
        self.shared.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.shared.playing.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn seek(&mut self, at_seconds: f32) -> Result<()> {
        let clip = self.shared.clip.load();
        let Some(clip) = clip.as_ref() else {
            bail!("no clip loaded");
        };
        self.seek_seconds(clip, at_seconds);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) && !self.volume_warned {
            log::warn!("preview volume {volume} out of range, clamping to [0, 1]");
            self.volume_warned = true;
        }
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_clip() -> Arc<AudioClip> {
        // 1 kHz rate, 2 channels, 500 frames -> 0.5 s
        Arc::new(AudioClip::new("t", 1000, 2, vec![0.1; 1000]))
    }

    #[test]
    fn start_without_clip_fails() {
        let mut transport = CpalTransport::detached();
        assert!(transport.start(0.0).is_err());
        assert!(transport.seek(0.0).is_err());
        assert!(!transport.is_playing());
    }

    #[test]
    fn start_seeks_and_plays() {
        let mut transport = CpalTransport::detached();
        transport.set_clip(Some(test_clip()));
        transport.start(0.25).expect("start");
        assert!(transport.is_playing());
        assert!((transport.position_seconds() - 0.25).abs() < 2e-3);
        transport.stop().expect("stop");
        assert!(!transport.is_playing());
    }

    #[test]
    fn seek_clamps_to_final_frame() {
        let mut transport = CpalTransport::detached();
        transport.set_clip(Some(test_clip()));
        transport.seek(99.0).expect("seek");
        assert_eq!(transport.shared.frame_pos.load(Ordering::Relaxed), 499);
        transport.seek(-1.0).expect("seek");
        assert_eq!(transport.shared.frame_pos.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn volume_clamps_into_unit_range() {
        let mut transport = CpalTransport::detached();
        transport.set_volume(1.7).expect("set volume");
        assert!((transport.shared.volume.load(Ordering::Relaxed) - 1.0).abs() < 1e-6);
        transport.set_volume(-0.3).expect("set volume");
        assert_eq!(transport.shared.volume.load(Ordering::Relaxed), 0.0);
    }

    #[test]
    fn set_clip_rewinds_and_stops() {
        let mut transport = CpalTransport::detached();
        transport.set_clip(Some(test_clip()));
        transport.start(0.4).expect("start");
        transport.set_clip(Some(test_clip()));
        assert!(!transport.is_playing());
        assert_eq!(transport.position_seconds(), 0.0);
    }
}
