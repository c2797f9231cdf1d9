// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;
use core::f64::consts::PI;
use derivative::Derivative;
use derive_builder::Builder;
use kahan::KahanSum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

/// Classic oscillator waveforms.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    FromRepr,
    IntoStaticStr,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Waveform {
    /// Sine wave. The pure tone the sweep tool plays.
    #[default]
    Sine,
    /// Square wave
    Square,
    /// Triangle wave
    Triangle,
    /// Sawtooth wave
    Sawtooth,
}

/// A signal generator that produces traditional waveforms, integrating
/// frequency into a running cycle position. Frequency changes alter the
/// per-sample increment and never the position itself, which is what keeps
/// the output free of phase discontinuities while the frequency moves.
#[derive(Clone, Builder, Debug, Default, Serialize, Deserialize)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct Oscillator {
    /// The fundamental waveform for this oscillator.
    pub waveform: Waveform,

    /// Hertz. Any positive number.
    #[serde(skip)]
    pub frequency: FrequencyHz,

    #[serde(skip)]
    #[builder(setter(skip))]
    e: OscillatorEphemerals,
}
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct OscillatorEphemerals {
    // It's important for us to remember the "cursor" in the current waveform,
    // because the frequency can change over time, so recalculating the
    // position as if the current frequency were always the frequency leads to
    // clicks, pops, transients, and suckage.
    //
    // Needs Kahan summation algorithm to avoid accumulation of FP errors.
    cycle_position: KahanSum<f64>,

    delta: f64,
    delta_updated: bool,

    // reset() is requested.
    #[derivative(Default(value = "true"))]
    reset_pending: bool,

    sample_rate: SampleRate,
}
impl Generates<BipolarNormal> for Oscillator {
    fn generate(&mut self, values: &mut [BipolarNormal]) -> bool {
        for value in values {
            if self.e.reset_pending {
                self.update_delta();
                self.e.cycle_position = KahanSum::new_with_value(0.0);
            }
            let cycle_position = self.calculate_cycle_position();
            *value = BipolarNormal::from(self.amplitude_for_position(self.waveform, cycle_position));
            self.e.reset_pending = false;
        }
        true
    }
}
impl Configurable for Oscillator {
    fn sample_rate(&self) -> SampleRate {
        self.e.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.e.sample_rate = sample_rate;
        self.e.delta_updated = false;
        self.reset();
    }

    fn reset(&mut self) {
        self.e.reset_pending = true;
    }
}
impl Oscillator {
    /// The current frequency of the oscillator. While sweeping, this changes
    /// as often as every control interval.
    pub fn set_frequency(&mut self, frequency: FrequencyHz) {
        self.frequency = frequency;
        self.e.delta_updated = false;
    }

    #[allow(missing_docs)]
    pub fn frequency(&self) -> FrequencyHz {
        self.frequency
    }

    #[allow(missing_docs)]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    #[allow(missing_docs)]
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    fn update_delta(&mut self) {
        if !self.e.delta_updated {
            self.e.delta = self.frequency.0 / self.e.sample_rate.0 as f64;

            // This resets the accumulated error.
            self.e.cycle_position = KahanSum::new_with_value(self.e.cycle_position.sum());

            self.e.delta_updated = true;
        }
    }

    fn calculate_cycle_position(&mut self) -> f64 {
        self.update_delta();

        // If we haven't just reset, add delta to the previous position and mod
        // 1.0.
        let next_cycle_position_unrounded = if self.e.reset_pending {
            0.0
        } else {
            self.e.cycle_position += self.e.delta;
            self.e.cycle_position.sum()
        };

        // FP precision can otherwise leave the position an ulp shy of the wrap
        // point, which flips square waves one sample late.
        if next_cycle_position_unrounded > 0.999999999999 {
            self.e.cycle_position += -1.0;
        }

        self.e.cycle_position.sum()
    }

    // https://en.wikipedia.org/wiki/Sine_wave
    // https://en.wikipedia.org/wiki/Square_wave
    // https://en.wikipedia.org/wiki/Triangle_wave
    // https://en.wikipedia.org/wiki/Sawtooth_wave
    //
    // Some of these have seemingly arbitrary phase-shift constants in their
    // formulas. The reason for them is to ensure that every waveform starts at
    // amplitude zero, which makes it a lot easier to avoid transients when a
    // waveform starts up. See Pirkle DSSPC++ p.133 for visualization.
    fn amplitude_for_position(&self, waveform: Waveform, cycle_position: f64) -> f64 {
        match waveform {
            Waveform::Sine => (cycle_position * 2.0 * PI).sin(),
            Waveform::Square => -(cycle_position - 0.5).signum(),
            Waveform::Triangle => {
                4.0 * (cycle_position - (0.5 + cycle_position).floor()).abs() - 1.0
            }
            Waveform::Sawtooth => 2.0 * (cycle_position - (0.5 + cycle_position).floor()),
        }
    }
}
