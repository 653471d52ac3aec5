use std::path::Path;

use anyhow::{bail, Context, Result};

/// Immutable decoded audio: interleaved f32 samples in [-1, 1].
///
/// The preview transport and the waveform generator both read clips through
/// a shared reference; nothing mutates one after construction.
#[derive(Debug, Clone)]
pub struct AudioClip {
    name: String,
    sample_rate: u32,
    channels: usize,
    samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(name: impl Into<String>, sample_rate: u32, channels: usize, samples: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            samples,
        }
    }

    /// Decodes a WAV file. Integer PCM is normalized by its bit depth,
    /// float PCM is passed through unchanged.
    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("open {}", path.display()))?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("decode {}", path.display()))?,
            hound::SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                if bits == 0 || bits > 32 {
                    bail!("unsupported bit depth {bits} in {}", path.display());
                }
                let scale = 1.0f32 / (1i64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("decode {}", path.display()))?
            }
        };
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip")
            .to_string();
        Ok(Self::new(name, spec.sample_rate, spec.channels as usize, samples))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Interleaved samples, `frames() * channels()` long.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
