// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;
use derivative::Derivative;
use derive_builder::Builder;
use kahan::KahanSum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

/// Which way the sweep is currently traveling.
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, IntoStaticStr, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SweepDirection {
    /// From the low bound toward the high bound.
    #[default]
    Ascending,
    /// From the high bound toward the low bound.
    Descending,
}

/// [SweepTrajectory] turns elapsed audio frames into a position along the
/// sweep and that position into an instantaneous frequency.
///
/// The position lives in log-frequency space, normalized to [0, 1] between
/// the range bounds, and advances at constant speed, which the ear hears as
/// constant musical-interval speed. At either bound the direction reflects
/// (ping-pong) rather than snapping back to the start.
///
/// The trajectory holds no frequencies of its own: [Self::frequency_for]
/// reads the bounds out of whatever [SweepRange] it's handed, so a range edit
/// lands as a re-mapping of the existing position into the new bounds, and
/// the tone moves without a jump.
#[derive(Clone, Builder, Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct SweepTrajectory {
    /// How long one full traversal of the range takes, bound to bound.
    #[derivative(Default(value = "Seconds(2.0)"))]
    period: Seconds,

    #[serde(skip)]
    #[builder(setter(skip))]
    e: SweepTrajectoryEphemerals,
}
#[derive(Clone, Debug, Default)]
pub struct SweepTrajectoryEphemerals {
    // Kahan summation for the same reason the oscillator uses it: the
    // position accumulates tiny increments for as long as the tone plays.
    position: KahanSum<f64>,
    direction: SweepDirection,
    sample_rate: SampleRate,
}
impl Configurable for SweepTrajectory {
    fn sample_rate(&self) -> SampleRate {
        self.e.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.e.sample_rate = sample_rate;
        self.reset();
    }

    fn reset(&mut self) {
        self.e.position = KahanSum::new_with_value(0.0);
        self.e.direction = SweepDirection::default();
    }
}
impl SweepTrajectory {
    #[allow(missing_docs)]
    pub fn period(&self) -> Seconds {
        self.period
    }

    /// The normalized position along the logarithmic sweep, 0.0 at the low
    /// bound and 1.0 at the high bound.
    pub fn log_position(&self) -> f64 {
        self.e.position.sum().clamp(0.0, 1.0)
    }

    #[allow(missing_docs)]
    pub fn direction(&self) -> SweepDirection {
        self.e.direction
    }

    /// The instantaneous frequency for the current position within the given
    /// range: a logarithmic interpolation from the low bound to the high.
    pub fn frequency_for(&self, range: &SweepRange) -> FrequencyHz {
        let low = range.low().0;
        let ratio = range.high().0 / low;
        FrequencyHz(low * ratio.powf(self.log_position()))
    }

    /// Moves the position by the given number of audio frames, reflecting at
    /// the bounds.
    pub fn advance(&mut self, frames: usize) {
        let traversal_frames = self.period.0.max(f64::EPSILON) * self.e.sample_rate.0 as f64;
        let mut remaining = frames as f64 / traversal_frames;

        // A full out-and-back is 2.0 of position travel and ends where it
        // started, so only the remainder matters.
        if remaining > 2.0 {
            remaining %= 2.0;
        }

        while remaining > 0.0 {
            let position = self.e.position.sum();
            let room = match self.e.direction {
                SweepDirection::Ascending => 1.0 - position,
                SweepDirection::Descending => position,
            };
            if remaining < room {
                let signed = match self.e.direction {
                    SweepDirection::Ascending => remaining,
                    SweepDirection::Descending => -remaining,
                };
                self.e.position += signed;
                break;
            }
            remaining -= room;
            // Park exactly on the bound and reflect. Rebasing the accumulator
            // here also sheds any error it picked up during the leg.
            self.e.direction = match self.e.direction {
                SweepDirection::Ascending => {
                    self.e.position = KahanSum::new_with_value(1.0);
                    SweepDirection::Descending
                }
                SweepDirection::Descending => {
                    self.e.position = KahanSum::new_with_value(0.0);
                    SweepDirection::Ascending
                }
            };
        }
    }
}
