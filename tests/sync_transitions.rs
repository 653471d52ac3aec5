use anyhow::bail;
use wavesync::sync::{Phase, PreviewTransport, SyncConfig, SyncStateMachine, TimelineSample};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    Start(f32),
    Stop,
    Seek(f32),
    Volume(f32),
}

#[derive(Default)]
struct RecordingTransport {
    calls: Vec<Call>,
    fail: bool,
}

impl RecordingTransport {
    fn non_volume(&self) -> Vec<Call> {
        self.calls
            .iter()
            .copied()
            .filter(|c| !matches!(c, Call::Volume(_)))
            .collect()
    }

    fn starts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Start(_)))
            .count()
    }

    fn stops(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Stop)).count()
    }

    fn volumes(&self) -> Vec<f32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Volume(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl PreviewTransport for RecordingTransport {
    fn start(&mut self, at_seconds: f32) -> anyhow::Result<()> {
        if self.fail {
            bail!("transport offline");
        }
        self.calls.push(Call::Start(at_seconds));
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        if self.fail {
            bail!("transport offline");
        }
        self.calls.push(Call::Stop);
        Ok(())
    }

    fn seek(&mut self, at_seconds: f32) -> anyhow::Result<()> {
        if self.fail {
            bail!("transport offline");
        }
        self.calls.push(Call::Seek(at_seconds));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        if self.fail {
            bail!("transport offline");
        }
        self.calls.push(Call::Volume(volume));
        Ok(())
    }
}

fn machine() -> SyncStateMachine {
    SyncStateMachine::new(SyncConfig::default())
}

fn drive(
    machine: &mut SyncStateMachine,
    transport: &mut RecordingTransport,
    duration: f32,
    script: &[(bool, f32)],
) {
    for (i, &(playing, position)) in script.iter().enumerate() {
        let sample = TimelineSample {
            playing,
            position,
            tick: i as u64 + 1,
        };
        machine.tick(Some(sample), duration, 0.8, transport);
    }
}

#[test]
fn continuous_playback_starts_exactly_once() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    let mut script = Vec::new();
    let mut pos = 0.0f32;
    while pos <= 3.0 {
        script.push((true, pos));
        pos += 0.016;
    }
    drive(&mut m, &mut t, 10.0, &script);
    assert_eq!(m.phase(), Phase::Playing);
    assert_eq!(t.starts(), 1);
    assert_eq!(t.stops(), 0);
    // The first tick shows no movement yet; the start lands on the second.
    assert_eq!(t.non_volume()[0], Call::Start(script[1].1));
}

#[test]
fn playback_advance_below_jump_threshold_leaves_transport_alone() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(true, 0.5)]);
    t.calls.clear();
    drive(&mut m, &mut t, 10.0, &[(true, 0.55), (true, 0.60)]);
    assert!(t.non_volume().is_empty());
}

#[test]
fn loop_wrap_issues_stop_then_start() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 3.0, &[(true, 2.0), (true, 2.5), (true, 2.95)]);
    t.calls.clear();
    drive(&mut m, &mut t, 3.0, &[(true, 0.02)]);
    assert_eq!(t.non_volume(), vec![Call::Stop, Call::Start(0.02)]);
    assert_eq!(m.phase(), Phase::Playing);
}

#[test]
fn short_clip_halves_the_loop_window() {
    // With a 0.8s clip the wrap heuristic must fire from 0.45 -> 0.02 even
    // though 0.45 is inside the nominal half-second window.
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 0.8, &[(true, 0.2), (true, 0.45)]);
    t.calls.clear();
    drive(&mut m, &mut t, 0.8, &[(true, 0.02)]);
    assert_eq!(t.non_volume(), vec![Call::Stop, Call::Start(0.02)]);
}

#[test]
fn scrub_drag_starts_once_then_seeks() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(
        &mut m,
        &mut t,
        10.0,
        &[(false, 1.00), (false, 1.03), (false, 1.06), (false, 1.09)],
    );
    assert_eq!(
        t.non_volume(),
        vec![
            Call::Start(1.00),
            Call::Seek(1.03),
            Call::Seek(1.06),
            Call::Seek(1.09),
        ]
    );
    assert!(m.is_scrubbing());
    assert_eq!(m.phase(), Phase::Playing);
}

#[test]
fn stationary_pause_stops_exactly_once() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(false, 1.0), (false, 1.05)]);
    t.calls.clear();
    drive(
        &mut m,
        &mut t,
        10.0,
        &[(false, 1.05), (false, 1.05), (false, 1.05)],
    );
    assert_eq!(t.stops(), 1);
    assert_eq!(m.phase(), Phase::Idle);
    assert!(!m.is_scrubbing());
}

#[test]
fn paused_jump_after_stop_restarts_cleanly() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(true, 0.5), (false, 0.5)]);
    assert_eq!(m.phase(), Phase::Idle);
    t.calls.clear();
    drive(&mut m, &mut t, 10.0, &[(false, 3.0)]);
    assert_eq!(t.non_volume(), vec![Call::Start(3.0)]);
    assert!(m.is_scrubbing());
    // The restart must have released the stop latch: a following pause
    // reaches the transport again.
    drive(&mut m, &mut t, 10.0, &[(false, 3.0)]);
    assert_eq!(t.stops(), 1);
    assert_eq!(m.phase(), Phase::Idle);
}

#[test]
fn jump_while_playing_seeks_in_place() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(true, 0.5), (true, 0.55)]);
    t.calls.clear();
    drive(&mut m, &mut t, 10.0, &[(true, 5.0)]);
    assert_eq!(t.non_volume(), vec![Call::Seek(5.0)]);
    assert_eq!(m.phase(), Phase::Playing);
}

#[test]
fn transport_failure_keeps_phase_and_retries() {
    let mut m = machine();
    let mut t = RecordingTransport {
        fail: true,
        ..RecordingTransport::default()
    };
    drive(&mut m, &mut t, 10.0, &[(true, 0.5)]);
    assert_eq!(m.phase(), Phase::Idle);
    assert!(t.calls.is_empty());

    t.fail = false;
    drive(&mut m, &mut t, 10.0, &[(true, 0.55)]);
    assert_eq!(t.non_volume(), vec![Call::Start(0.55)]);
    assert_eq!(m.phase(), Phase::Playing);
}

#[test]
fn missing_sample_skips_the_tick() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(true, 1.0)]);
    let last = m.last_position();
    m.tick(None, 10.0, 0.8, &mut t);
    assert_eq!(m.last_position(), last);
    assert_eq!(t.starts(), 1);
}

#[test]
fn out_of_range_positions_are_suppressed() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 2.0, &[(true, 5.0), (false, -1.0)]);
    assert!(t.calls.is_empty());
    assert_eq!(m.phase(), Phase::Idle);
}

#[test]
fn zero_duration_never_touches_the_transport() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 0.0, &[(true, 0.0), (true, 0.5), (false, 0.2)]);
    assert!(t.calls.is_empty());
}

#[test]
fn micro_jitter_is_not_movement() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(false, 0.0005)]);
    assert!(t.calls.is_empty());

    drive(&mut m, &mut t, 10.0, &[(true, 0.5)]);
    t.calls.clear();
    drive(&mut m, &mut t, 10.0, &[(true, 0.5005)]);
    assert!(t.non_volume().is_empty());
}

#[test]
fn volume_is_pushed_every_playing_tick() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(
        &mut m,
        &mut t,
        10.0,
        &[(true, 0.5), (true, 0.55), (true, 0.60), (true, 0.65)],
    );
    let volumes = t.volumes();
    assert_eq!(volumes.len(), 4);
    assert!(volumes.iter().all(|&v| v == 0.8));
}

#[test]
fn reset_forgets_observed_history() {
    let mut m = machine();
    let mut t = RecordingTransport::default();
    drive(&mut m, &mut t, 10.0, &[(true, 0.5), (true, 2.0)]);
    assert_eq!(m.phase(), Phase::Playing);
    m.reset();
    assert_eq!(m.phase(), Phase::Idle);
    assert_eq!(m.last_position(), 0.0);
    assert_eq!(m.previous_position(), 0.0);

    t.calls.clear();
    drive(&mut m, &mut t, 10.0, &[(true, 0.0), (true, 0.016)]);
    assert_eq!(t.non_volume(), vec![Call::Start(0.016)]);
}
