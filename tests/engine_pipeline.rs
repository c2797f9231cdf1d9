// Copyright (c) 2024 Mike Tsao

//! Deviceless end-to-end scenarios: a parameter model feeding the snapshot
//! handoff feeding the synthesis core, the way the real-time engine wires
//! them together.

use more_asserts::{assert_gt, assert_lt};
use tonesweep::prelude::*;

const BLOCK_FRAMES: usize = 512;

fn ready_core() -> SweepSynthCore {
    let mut core = SweepSynthCoreBuilder::default().build().unwrap();
    core.update_sample_rate(SampleRate::DEFAULT);
    core
}

fn run_block(core: &mut SweepSynthCore, adopter: &mut RangeAdopter) -> Vec<Sample> {
    core.adopt_range(adopter.adopt_latest());
    let mut buffer = vec![Sample::default(); BLOCK_FRAMES];
    core.generate(&mut buffer);
    buffer
}

// An edit made while the sweep is playing must be picked up at the next
// block, and only the newest of several rapid edits should win.
#[test]
fn edits_reach_the_audio_side_at_the_next_block() {
    let mut model = RangeModel::default();
    let (publisher, mut adopter) = range_handoff(model.current());
    let mut core = ready_core();

    run_block(&mut core, &mut adopter);
    assert_eq!(core.range(), model.current());

    // A burst of slider motion from the control side.
    publisher.publish(model.set_quality(20.0).unwrap());
    publisher.publish(model.set_quality(10.0).unwrap());
    let newest = model.set_quality(5.0).unwrap();
    publisher.publish(newest);

    run_block(&mut core, &mut adopter);
    assert_eq!(
        core.range(),
        newest,
        "the block should see exactly the newest snapshot"
    );
}

// The full traversal: over a few sweep periods the instantaneous frequency
// should visit the neighborhood of both bounds and never leave the range.
#[test]
fn sweep_covers_the_whole_range() {
    let mut model = RangeModel::default();
    model.set_octave_span(1.0).unwrap();
    let (_publisher, mut adopter) = range_handoff(model.current());
    let mut core = ready_core();

    let range = model.current();
    let mut lowest = f64::MAX;
    let mut highest = f64::MIN;

    // Default period is 2 s per traversal; run about 6 s of audio.
    let blocks = 6 * SampleRate::DEFAULT_SAMPLE_RATE / BLOCK_FRAMES;
    for _ in 0..blocks {
        run_block(&mut core, &mut adopter);
        let f = core.current_frequency().0;
        lowest = lowest.min(f);
        highest = highest.max(f);
        assert_gt!(f, range.low().0 * 0.999999);
        assert_lt!(f, range.high().0 * 1.000001);
    }

    // 707.1 and 1414.2, give or take one block of sweep motion.
    assert_lt!(lowest, range.low().0 * 1.02);
    assert_gt!(highest, range.high().0 * 0.98);
}

// No waveform discontinuities anywhere: not at startup, not across block
// boundaries, not when parameters change mid-flight.
#[test]
fn the_whole_pipeline_is_click_free() {
    let mut model = RangeModel::default();
    let (publisher, mut adopter) = range_handoff(model.current());
    let mut core = ready_core();

    // Worst-case per-frame slope: the loudest frequency this test reaches is
    // about 1.4 kHz (including the emphasis tone at 1.05x), at amplitude 0.3
    // plus the anti-phase side tones, with the gain ramps layered on top.
    // That works out to under 0.09; leave headroom above it.
    let max_step = 0.12;

    let mut previous: Option<Sample> = None;
    for block_index in 0..200 {
        // Jostle the parameters the way a user dragging sliders would.
        match block_index {
            50 => {
                publisher.publish(model.set_octave_span(0.8).unwrap());
            }
            100 => {
                publisher.publish(model.set_center(FrequencyHz(500.0)).unwrap());
            }
            150 => {
                publisher.publish(model.set_bandwidth_hz(FrequencyHz(10.0)).unwrap());
            }
            _ => {}
        }
        let block = run_block(&mut core, &mut adopter);
        for sample in block {
            if let Some(previous) = previous {
                assert_lt!(
                    (sample.0 - previous.0).abs(),
                    max_step,
                    "discontinuity in block {block_index}"
                );
            }
            previous = Some(sample);
        }
    }
}

// Stopping mid-sweep ramps to silence; restarting replays from the start of
// the range at the bottom of a fresh fade-in.
#[test]
fn stop_and_restart_are_both_ramped() {
    let mut model = RangeModel::default();
    let (_publisher, mut adopter) = range_handoff(model.current());
    let mut core = ready_core();

    for _ in 0..20 {
        run_block(&mut core, &mut adopter);
    }

    core.begin_fade_out();
    let mut tail = Vec::new();
    while !core.is_faded_out() {
        tail.extend(run_block(&mut core, &mut adopter));
    }
    assert_eq!(*tail.last().unwrap(), Sample::SILENCE);

    // Restart: the engine resets the core before reuse.
    core.reset();
    let block = run_block(&mut core, &mut adopter);
    assert_lt!(block[0].0.abs(), 0.01, "restart should fade in from silence");
    let peak = block.iter().map(|s| s.0.abs()).fold(0.0, f64::max);
    assert_gt!(peak, 0.1, "restart should reach audible level again");
}
