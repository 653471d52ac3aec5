pub mod app;
pub mod clip;
pub mod overlay;
pub mod settings;
pub mod sync;
pub mod transport;
pub mod waveform;

pub use app::{StartupConfig, TimelinePreviewer};

#[cfg(feature = "kittest")]
pub mod kittest;
