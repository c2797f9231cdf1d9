// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;
use delegate::delegate;
use derivative::Derivative;
use derive_builder::Builder;

/// How many frames share one frequency/gain update. The sweep moves the
/// frequency once per interval and the loudness gain interpolates linearly
/// across it, trading a little sweep granularity for a lot less per-sample
/// math. At 44.1 kHz an interval is about a third of a millisecond.
const CONTROL_INTERVAL_FRAMES: usize = 16;

/// [SweepSynthCore] is the block-fill routine of the sweep synthesizer: it
/// combines the trajectory, the oscillator, and the weighting curve into a
/// mono [Sample] stream.
///
/// The core is deliberately free of devices and threads. Whoever owns it
/// hands it a [SweepRange] snapshot at a block boundary ([Self::adopt_range])
/// and then asks it to fill buffers; the range never changes inside a block.
/// Start and stop are click-free: output ramps up from silence after a
/// [reset](Configurable::reset), and [Self::begin_fade_out] ramps it back
/// down, with [Self::is_faded_out] reporting when the tail is done.
#[derive(Clone, Builder, Debug, Derivative)]
#[derivative(Default)]
#[builder(default)]
pub struct SweepSynthCore {
    /// Master output level.
    #[derivative(Default(value = "Normal::new_const(0.3)"))]
    amplitude: Normal,

    /// Whether the quality-factor-driven notch-emphasis side tones are mixed
    /// in.
    #[derivative(Default(value = "true"))]
    notch_emphasis: bool,

    /// Length of the anti-click gain ramp applied at start and stop.
    #[derivative(Default(value = "Seconds(0.01)"))]
    fade: Seconds,

    /// The trajectory that moves the tone through the range.
    trajectory: SweepTrajectory,

    #[builder(setter(skip))]
    e: SweepSynthCoreEphemerals,
}
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct SweepSynthCoreEphemerals {
    range: SweepRange,

    oscillator: Oscillator,

    // The two anti-phase side tones that sharpen the sense of "notch" as the
    // quality factor rises. Each has its own oscillator so that it stays
    // phase continuous while it tracks the main tone.
    lower_emphasis: Oscillator,
    upper_emphasis: Oscillator,

    osc_buffer: GenerationBuffer<BipolarNormal>,
    lower_buffer: GenerationBuffer<BipolarNormal>,
    upper_buffer: GenerationBuffer<BipolarNormal>,

    // The anti-click ramp, advanced once per frame toward its target.
    ramp: f64,
    #[derivative(Default(value = "1.0"))]
    ramp_target: f64,
    fading_out: bool,

    // The loudness gain at the end of the previous control interval. None
    // right after reset, meaning the first interval has nothing to
    // interpolate from.
    smoothed_gain: Option<f64>,

    current_frequency: FrequencyHz,
}
impl Generates<Sample> for SweepSynthCore {
    fn generate(&mut self, values: &mut [Sample]) -> bool {
        let mut any_signal = false;
        let ramp_step = if self.fade.0 > 0.0 {
            1.0 / (self.fade.0 * self.sample_rate().0 as f64)
        } else {
            1.0
        };

        for chunk in values.chunks_mut(CONTROL_INTERVAL_FRAMES) {
            let frames = chunk.len();

            let frequency = self.trajectory.frequency_for(&self.e.range);
            self.e.current_frequency = frequency;

            let target_gain = AWeighting::gain(frequency).0 * self.amplitude.0;
            let start_gain = self.e.smoothed_gain.unwrap_or(target_gain);

            self.e.oscillator.set_frequency(frequency);
            self.e.osc_buffer.resize(frames);
            self.e.oscillator.generate(self.e.osc_buffer.buffer_mut());

            let depth = self.emphasis_depth();
            if depth > 0.0 {
                self.e
                    .lower_emphasis
                    .set_frequency(frequency * Self::LOWER_EMPHASIS_RATIO);
                self.e
                    .upper_emphasis
                    .set_frequency(frequency * Self::UPPER_EMPHASIS_RATIO);
                self.e.lower_buffer.resize(frames);
                self.e.upper_buffer.resize(frames);
                self.e
                    .lower_emphasis
                    .generate(self.e.lower_buffer.buffer_mut());
                self.e
                    .upper_emphasis
                    .generate(self.e.upper_buffer.buffer_mut());
            }

            for (i, out) in chunk.iter_mut().enumerate() {
                let t = (i + 1) as f64 / frames as f64;
                let gain = start_gain + (target_gain - start_gain) * t;

                if self.e.ramp < self.e.ramp_target {
                    self.e.ramp = (self.e.ramp + ramp_step).min(self.e.ramp_target);
                } else if self.e.ramp > self.e.ramp_target {
                    self.e.ramp = (self.e.ramp - ramp_step).max(self.e.ramp_target);
                }

                let mut sample = self.e.osc_buffer.buffer()[i].0;
                if depth > 0.0 {
                    // The side tones are mixed in anti-phase.
                    sample -= depth
                        * (self.e.lower_buffer.buffer()[i].0 + self.e.upper_buffer.buffer()[i].0);
                }
                let sample = sample * gain * self.e.ramp;
                any_signal |= sample != 0.0;
                *out = Sample(sample);
            }

            self.e.smoothed_gain = Some(target_gain);
            self.trajectory.advance(frames);
        }
        any_signal
    }
}
impl Configurable for SweepSynthCore {
    delegate! {
        to self.e.oscillator {
            fn sample_rate(&self) -> SampleRate;
        }
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.trajectory.update_sample_rate(sample_rate);
        self.e.oscillator.update_sample_rate(sample_rate);
        self.e.lower_emphasis.update_sample_rate(sample_rate);
        self.e.upper_emphasis.update_sample_rate(sample_rate);
        self.reset();
    }

    fn reset(&mut self) {
        self.trajectory.reset();
        self.e.oscillator.reset();
        self.e.lower_emphasis.reset();
        self.e.upper_emphasis.reset();
        self.e.ramp = 0.0;
        self.e.ramp_target = 1.0;
        self.e.fading_out = false;
        self.e.smoothed_gain = None;
    }
}
impl SweepSynthCore {
    const LOWER_EMPHASIS_RATIO: f64 = 0.95;
    const UPPER_EMPHASIS_RATIO: f64 = 1.05;
    const EMPHASIS_DEPTH_CEILING: f64 = 0.2;

    /// Installs a new range snapshot. Call only at a block boundary;
    /// parameters must not change inside a block.
    pub fn adopt_range(&mut self, range: SweepRange) {
        self.e.range = range;
    }

    /// The range snapshot currently in use.
    pub fn range(&self) -> SweepRange {
        self.e.range
    }

    /// The most recently generated instantaneous frequency. Suitable for a
    /// display readout.
    pub fn current_frequency(&self) -> FrequencyHz {
        self.e.current_frequency
    }

    /// Starts ramping the output down to silence. The ramp completes within
    /// [Self::fade] of generated audio; watch [Self::is_faded_out].
    pub fn begin_fade_out(&mut self) {
        self.e.fading_out = true;
        self.e.ramp_target = 0.0;
    }

    /// True when a fade-out has finished and the core is emitting silence.
    pub fn is_faded_out(&self) -> bool {
        self.e.fading_out && self.e.ramp == 0.0
    }

    #[allow(missing_docs)]
    pub fn amplitude(&self) -> Normal {
        self.amplitude
    }

    #[allow(missing_docs)]
    pub fn set_amplitude(&mut self, amplitude: Normal) {
        self.amplitude = amplitude;
    }

    #[allow(missing_docs)]
    pub fn notch_emphasis(&self) -> bool {
        self.notch_emphasis
    }

    #[allow(missing_docs)]
    pub fn fade(&self) -> Seconds {
        self.fade
    }

    // How deep the anti-phase side tones go, scaled by the quality factor.
    // Below Q = 1 there's no notch character to emphasize.
    fn emphasis_depth(&self) -> f64 {
        if !self.notch_emphasis || self.e.range.quality() <= 1.0 {
            0.0
        } else {
            (self.e.range.quality() / 100.0).min(1.0) * Self::EMPHASIS_DEPTH_CEILING
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_lt};

    const BLOCK_FRAMES: usize = 512;

    fn ready_core() -> SweepSynthCore {
        let mut core = SweepSynthCoreBuilder::default().build().unwrap();
        core.update_sample_rate(SampleRate::DEFAULT);
        core.adopt_range(SweepRange::default());
        core
    }

    fn generate_block(core: &mut SweepSynthCore) -> Vec<Sample> {
        let mut buffer = vec![Sample::default(); BLOCK_FRAMES];
        core.generate(&mut buffer);
        buffer
    }

    #[test]
    fn output_ramps_up_from_silence() {
        let mut core = ready_core();
        let block = generate_block(&mut core);

        assert_lt!(
            block[0].0.abs(),
            0.01,
            "the first frame should be at the bottom of the fade-in"
        );

        // After the fade (441 frames at 44.1 kHz) the tone should be at full
        // level somewhere in the block.
        let peak = block.iter().map(|s| s.0.abs()).fold(0.0, f64::max);
        assert_gt!(peak, 0.1, "the tone should reach audible level");
    }

    #[test]
    fn sustained_output_is_audible_and_bounded() {
        let mut core = ready_core();
        generate_block(&mut core);

        for _ in 0..50 {
            let block = generate_block(&mut core);
            let peak = block.iter().map(|s| s.0.abs()).fold(0.0, f64::max);
            assert_gt!(peak, 0.05);
            assert_lt!(peak, 1.0);
        }
    }

    #[test]
    fn fade_out_ends_in_silence_without_a_cliff() {
        let mut core = ready_core();
        for _ in 0..10 {
            generate_block(&mut core);
        }

        core.begin_fade_out();
        let mut last = generate_block(&mut core)
            .last()
            .copied()
            .unwrap_or_default();
        let mut blocks = 0;
        while !core.is_faded_out() {
            let block = generate_block(&mut core);
            // No single frame-to-frame step bigger than the tone's own slope
            // plus the ramp increment.
            let mut previous = last;
            for s in &block {
                assert_lt!((s.0 - previous.0).abs(), 0.1, "abrupt step during fade");
                previous = *s;
            }
            last = *block.last().unwrap();
            blocks += 1;
            assert_lt!(blocks, 10, "fade-out should finish within a few blocks");
        }
        assert_eq!(last, Sample::SILENCE);

        let block = generate_block(&mut core);
        assert!(
            block.iter().all(|s| *s == Sample::SILENCE),
            "a faded-out core emits silence"
        );
    }

    #[test]
    fn instantaneous_frequency_stays_within_the_range() {
        let mut core = ready_core();
        let range = core.range();
        // Several seconds of audio, enough for a few ping-pong traversals.
        for _ in 0..300 {
            generate_block(&mut core);
            let f = core.current_frequency();
            assert_gt!(f.0, range.low().0 * 0.999999);
            assert_lt!(f.0, range.high().0 * 1.000001);
        }
    }

    #[test]
    fn range_adoption_mid_run_does_not_click() {
        let mut model = RangeModel::default();
        let mut core = ready_core();
        core.adopt_range(model.current());
        for _ in 0..10 {
            generate_block(&mut core);
        }
        let before = generate_block(&mut core);

        // Widen the range by an octave between blocks, as the engine would.
        core.adopt_range(model.set_octave_span(1.0).unwrap());
        let after = generate_block(&mut core);

        let boundary_step = (after[0].0 - before.last().unwrap().0).abs();
        assert_lt!(
            boundary_step,
            0.1,
            "a range edit should not produce a discontinuity"
        );
    }

    #[test]
    fn notch_emphasis_is_inert_at_low_quality() {
        let mut model = RangeModelBuilder::default().build().unwrap();
        model.set_quality(0.9).unwrap();

        let mut with_emphasis = SweepSynthCoreBuilder::default().build().unwrap();
        with_emphasis.update_sample_rate(SampleRate::DEFAULT);
        with_emphasis.adopt_range(model.current());

        let mut without_emphasis = SweepSynthCoreBuilder::default()
            .notch_emphasis(false)
            .build()
            .unwrap();
        without_emphasis.update_sample_rate(SampleRate::DEFAULT);
        without_emphasis.adopt_range(model.current());

        assert_eq!(
            generate_block(&mut with_emphasis),
            generate_block(&mut without_emphasis),
            "below Q = 1 the side tones contribute nothing"
        );
    }

    #[test]
    fn notch_emphasis_changes_the_waveform_at_high_quality() {
        let mut with_emphasis = SweepSynthCoreBuilder::default().build().unwrap();
        with_emphasis.update_sample_rate(SampleRate::DEFAULT);
        with_emphasis.adopt_range(SweepRange::default());

        let mut without_emphasis = SweepSynthCoreBuilder::default()
            .notch_emphasis(false)
            .build()
            .unwrap();
        without_emphasis.update_sample_rate(SampleRate::DEFAULT);
        without_emphasis.adopt_range(SweepRange::default());

        assert_ne!(
            generate_block(&mut with_emphasis),
            generate_block(&mut without_emphasis),
            "at the default Q = 30 the side tones are audible"
        );
    }
}
