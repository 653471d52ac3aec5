//! Timeline-to-preview synchronization.
//!
//! The host never emits play/seek events; all we get is a polled
//! `(playing, position)` pair once per tick. The state machine infers
//! playback starts, stops, scrubs, seeks, and loop wraps from consecutive
//! observations and drives the preview transport accordingly.

use anyhow::Result;

/// One polled observation of the host timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSample {
    pub playing: bool,
    pub position: f32,
    pub tick: u64,
}

/// Reads the host timeline once per polling tick. Must not block;
/// `None` means the host state could not be read this tick.
pub trait TimelineSampler {
    fn sample(&mut self) -> Option<TimelineSample>;
}

/// Preview playback primitives. All calls are fire-and-forget from the
/// machine's point of view; errors are reported and retried next tick.
pub trait PreviewTransport {
    fn start(&mut self, at_seconds: f32) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn seek(&mut self, at_seconds: f32) -> Result<()>;
    fn set_volume(&mut self, volume: f32) -> Result<()>;
}

/// Thresholds for interpreting polled cursor motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Minimum delta counted as real movement; filters polling jitter.
    pub micro_threshold: f32,
    /// Minimum delta counted as a discontinuous jump rather than playback
    /// advance.
    pub jump_threshold: f32,
    /// Window for the wrap-around heuristic, capped at half the clip so
    /// sub-second clips still loop-detect.
    pub loop_window: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            micro_threshold: 0.001,
            jump_threshold: 0.1,
            loop_window: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
}

/// Drives a [`PreviewTransport`] from polled [`TimelineSample`]s.
#[derive(Debug)]
pub struct SyncStateMachine {
    config: SyncConfig,
    phase: Phase,
    last_position: f32,
    previous_position: f32,
    stop_latched: bool,
    scrubbing: bool,
    fault_logged: bool,
}

impl SyncStateMachine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            last_position: 0.0,
            previous_position: 0.0,
            stop_latched: false,
            scrubbing: false,
            fault_logged: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while the transport is running only to give scrub feedback,
    /// i.e. the host itself is paused.
    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    pub fn last_position(&self) -> f32 {
        self.last_position
    }

    pub fn previous_position(&self) -> f32 {
        self.previous_position
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    /// Forget all observed history, e.g. after switching clips. Does not
    /// touch the transport.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.last_position = 0.0;
        self.previous_position = 0.0;
        self.stop_latched = false;
        self.scrubbing = false;
    }

    /// One polling tick. `sample` is the latest host observation (`None`
    /// skips the tick entirely), `duration` the clip length in seconds,
    /// `volume` the configured preview volume. Never fails; transport
    /// errors are logged once and retried on later ticks.
    pub fn tick(
        &mut self,
        sample: Option<TimelineSample>,
        duration: f32,
        volume: f32,
        transport: &mut dyn PreviewTransport,
    ) {
        let Some(sample) = sample else { return };
        let position = sample.position;
        let delta = (position - self.last_position).abs();
        let changed = delta > self.config.micro_threshold;
        let jumped = delta > self.config.jump_threshold;
        let epoch = self.config.loop_window.min(duration * 0.5);
        let looped = sample.playing
            && position < self.last_position
            && position < epoch
            && self.last_position > epoch;
        let in_range = position >= 0.0 && position <= duration;

        if self.phase == Phase::Playing {
            self.push_volume(transport, volume);
        }

        if looped && in_range {
            // Wrap-around: the device has no notion of the host's loop
            // point, so re-seek via a stop/start pair.
            self.do_stop(transport);
            if self.phase == Phase::Idle {
                self.do_start(transport, position, volume, false);
            }
        } else if sample.playing && changed && self.phase == Phase::Idle && in_range {
            self.do_start(transport, position, volume, false);
        } else if changed && !sample.playing && in_range {
            self.scrub(transport, position, volume, jumped);
        } else if !sample.playing && !changed && self.phase == Phase::Playing {
            self.do_stop(transport);
        } else if sample.playing && self.phase == Phase::Playing && jumped && !looped && in_range {
            self.do_seek(transport, position);
        }

        self.previous_position = self.last_position;
        self.last_position = position;
    }

    /// Cursor moved while the host is paused. Start the transport once from
    /// idle, then keep repositioning in place so a continuous drag does not
    /// stutter through restarts.
    fn scrub(
        &mut self,
        transport: &mut dyn PreviewTransport,
        at: f32,
        volume: f32,
        jumped: bool,
    ) {
        if self.phase == Phase::Idle {
            self.do_start(transport, at, volume, true);
        } else {
            if jumped {
                self.stop_latched = false;
            }
            self.do_seek(transport, at);
        }
    }

    fn do_start(
        &mut self,
        transport: &mut dyn PreviewTransport,
        at: f32,
        volume: f32,
        scrubbing: bool,
    ) {
        match transport.start(at) {
            Ok(()) => {
                self.phase = Phase::Playing;
                self.stop_latched = false;
                self.scrubbing = scrubbing;
                self.fault_logged = false;
                self.push_volume(transport, volume);
            }
            Err(err) => self.report_fault(err),
        }
    }

    fn do_stop(&mut self, transport: &mut dyn PreviewTransport) {
        // The latch keeps the transport call idempotent without blocking
        // the phase transition.
        if self.stop_latched {
            self.phase = Phase::Idle;
            self.scrubbing = false;
            return;
        }
        match transport.stop() {
            Ok(()) => {
                self.phase = Phase::Idle;
                self.stop_latched = true;
                self.scrubbing = false;
                self.fault_logged = false;
            }
            Err(err) => self.report_fault(err),
        }
    }

    fn do_seek(&mut self, transport: &mut dyn PreviewTransport, at: f32) {
        match transport.seek(at) {
            Ok(()) => self.fault_logged = false,
            Err(err) => self.report_fault(err),
        }
    }

    fn push_volume(&mut self, transport: &mut dyn PreviewTransport, volume: f32) {
        match transport.set_volume(volume) {
            Ok(()) => self.fault_logged = false,
            Err(err) => self.report_fault(err),
        }
    }

    fn report_fault(&mut self, err: anyhow::Error) {
        if !self.fault_logged {
            log::warn!("preview transport unavailable, will retry: {err:#}");
            self.fault_logged = true;
        }
    }
}
