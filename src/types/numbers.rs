// Copyright (c) 2024 Mike Tsao

//! Numeric types used throughout the system.

use core::{
    fmt::{self, Display},
    ops::{Add, AddAssign, Div, Mul, Neg},
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// [ParameterType] is the primitive of most user-visible quantities: center
/// frequency, quality factor, octave span, gains. One alias so that a future
/// precision change is a one-line edit.
pub type ParameterType = f64;

/// The primitive Rust type of a single audio sample.
pub type SampleType = f64;

/// [FrequencyHz] is a frequency measured in
/// [hertz](https://en.wikipedia.org/wiki/Hertz). It defaults to 1 kHz, the
/// anchor frequency of the sweep tool and the reference point of the
/// equal-loudness weighting curve.
#[derive(
    Clone, Copy, Debug, Derivative, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct FrequencyHz(#[derivative(Default(value = "1000.0"))] pub ParameterType);
impl FrequencyHz {
    /// The lowest frequency most humans can hear.
    pub const AUDIBLE_FLOOR: FrequencyHz = FrequencyHz(20.0);
    /// The highest frequency most humans can hear.
    pub const AUDIBLE_CEILING: FrequencyHz = FrequencyHz(20_000.0);
}
impl Display for FrequencyHz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:.1} Hz", self.0))
    }
}
impl From<f64> for FrequencyHz {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl From<FrequencyHz> for f64 {
    fn from(value: FrequencyHz) -> Self {
        value.0
    }
}
impl Mul<ParameterType> for FrequencyHz {
    type Output = Self;

    fn mul(self, rhs: ParameterType) -> Self::Output {
        Self(self.0 * rhs)
    }
}
impl Div<FrequencyHz> for FrequencyHz {
    type Output = ParameterType;

    fn div(self, rhs: FrequencyHz) -> Self::Output {
        self.0 / rhs.0
    }
}

/// [Sample] represents a single-channel audio sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Sample(pub SampleType);
impl Sample {
    /// The [SampleType] value of silence.
    pub const SILENCE_VALUE: SampleType = 0.0;
    /// A [Sample] that is silent.
    pub const SILENCE: Sample = Sample(Self::SILENCE_VALUE);
    /// The maximum positive [SampleType] value.
    pub const MAX_VALUE: SampleType = 1.0;
    /// A [Sample] having the maximum positive value.
    pub const MAX: Sample = Sample(Self::MAX_VALUE);
    /// The maximum negative [SampleType] value.
    pub const MIN_VALUE: SampleType = -1.0;
    /// A [Sample] having the maximum negative value.
    pub const MIN: Sample = Sample(Self::MIN_VALUE);
}
impl Add<Self> for Sample {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}
impl AddAssign<Self> for Sample {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}
impl Mul<SampleType> for Sample {
    type Output = Self;

    fn mul(self, rhs: SampleType) -> Self::Output {
        Self(self.0 * rhs)
    }
}
impl Neg for Sample {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}
impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Sample(value)
    }
}
impl From<f32> for Sample {
    fn from(value: f32) -> Self {
        Sample(value as f64)
    }
}
