// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

/// The user-editable fields of the range parameter model.
#[derive(Clone, Copy, Debug, Display, Eq, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum RangeField {
    /// The anchor frequency of the sweep.
    Center,
    /// Quality factor: center divided by bandwidth.
    Quality,
    /// Range width in Hz.
    Bandwidth,
    /// Range width in octaves.
    Octaves,
}

/// A rejected parameter edit. The model's state is unchanged when one of
/// these is returned.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParameterError {
    /// The supplied value was zero, negative, NaN, or infinite.
    #[error("{field} must be a positive, finite number (got {value})")]
    NotPositive {
        /// The field the edit applied to.
        field: RangeField,
        /// The rejected value.
        value: ParameterType,
    },
    /// The edit would have pushed the center or a bound outside the audible
    /// clamp.
    #[error("{field} of {value} would move the sweep outside {floor} to {ceiling}")]
    OutsideAudibleRange {
        /// The field the edit applied to.
        field: RangeField,
        /// The rejected value.
        value: ParameterType,
        /// The lowest allowed frequency.
        floor: FrequencyHz,
        /// The highest allowed frequency.
        ceiling: FrequencyHz,
    },
}

/// An immutable, internally consistent set of range parameters: the center
/// frequency plus the three mutually derived width representations. The only
/// way to make one is through [RangeModel], which is also the only thing that
/// can replace it, so a [SweepRange] in hand is always safe to read from any
/// thread for as long as it's held.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SweepRange {
    center: FrequencyHz,
    quality: ParameterType,
    bandwidth: FrequencyHz,
    octaves: ParameterType,
}
impl Default for SweepRange {
    // 1 kHz at Q 30: the tool's traditional power-on state.
    fn default() -> Self {
        Self::from_center_and_quality(FrequencyHz::default(), 30.0)
    }
}
impl SweepRange {
    fn from_center_and_quality(center: FrequencyHz, quality: ParameterType) -> Self {
        let bandwidth = FrequencyHz(center.0 / quality);
        Self {
            center,
            quality,
            bandwidth,
            octaves: Self::octaves_for(center, bandwidth),
        }
    }

    fn from_center_and_bandwidth(center: FrequencyHz, bandwidth: FrequencyHz) -> Self {
        Self {
            center,
            quality: center.0 / bandwidth.0,
            bandwidth,
            octaves: Self::octaves_for(center, bandwidth),
        }
    }

    fn from_center_and_octaves(center: FrequencyHz, octaves: ParameterType) -> Self {
        let half_span = (octaves / 2.0).exp2();
        // The width in Hz is the distance between the geometric bounds.
        let bandwidth = FrequencyHz(center.0 * half_span - center.0 / half_span);
        Self {
            center,
            quality: center.0 / bandwidth.0,
            bandwidth,
            octaves,
        }
    }

    fn octaves_for(center: FrequencyHz, bandwidth: FrequencyHz) -> ParameterType {
        2.0 * (1.0 + bandwidth.0 / (2.0 * center.0)).log2()
    }

    /// The anchor frequency.
    pub fn center(&self) -> FrequencyHz {
        self.center
    }

    /// Quality factor: center divided by bandwidth.
    pub fn quality(&self) -> ParameterType {
        self.quality
    }

    /// Range width in Hz.
    pub fn bandwidth(&self) -> FrequencyHz {
        self.bandwidth
    }

    /// Range width in octaves.
    pub fn octaves(&self) -> ParameterType {
        self.octaves
    }

    /// The low sweep bound. The bounds sit a half octave-span below and above
    /// the center, so the center is their geometric mean.
    pub fn low(&self) -> FrequencyHz {
        FrequencyHz(self.center.0 / (self.octaves / 2.0).exp2())
    }

    /// The high sweep bound.
    pub fn high(&self) -> FrequencyHz {
        FrequencyHz(self.center.0 * (self.octaves / 2.0).exp2())
    }
}

/// [RangeModel] owns the authoritative [SweepRange] and is its only mutator.
///
/// Each setter takes a new value for exactly one representation, re-derives
/// the other fields deterministically, validates the result against the
/// audible clamp, and either commits and returns the new snapshot or returns
/// an error with the model unchanged. The model never calls back into the
/// editor, so three mutually synchronized controls can each push their own
/// edits without ever re-triggering each other.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct RangeModel {
    /// The lowest frequency the center or either bound may reach.
    floor: FrequencyHz,

    /// The highest frequency the center or either bound may reach.
    ceiling: FrequencyHz,

    #[builder(setter(skip))]
    current: SweepRange,
}
impl Default for RangeModel {
    fn default() -> Self {
        Self {
            floor: FrequencyHz::AUDIBLE_FLOOR,
            ceiling: FrequencyHz::AUDIBLE_CEILING,
            current: Default::default(),
        }
    }
}
impl RangeModel {
    /// The current parameter snapshot.
    pub fn current(&self) -> SweepRange {
        self.current
    }

    #[allow(missing_docs)]
    pub fn floor(&self) -> FrequencyHz {
        self.floor
    }

    #[allow(missing_docs)]
    pub fn ceiling(&self) -> FrequencyHz {
        self.ceiling
    }

    /// Sets the center frequency. The quality factor is held, so the width
    /// representations re-derive around the new center.
    pub fn set_center(&mut self, center: FrequencyHz) -> Result<SweepRange, ParameterError> {
        Self::ensure_positive(RangeField::Center, center.0)?;
        self.commit(
            RangeField::Center,
            center.0,
            SweepRange::from_center_and_quality(center, self.current.quality),
        )
    }

    /// Sets the quality factor; bandwidth and octave span re-derive.
    pub fn set_quality(&mut self, quality: ParameterType) -> Result<SweepRange, ParameterError> {
        Self::ensure_positive(RangeField::Quality, quality)?;
        self.commit(
            RangeField::Quality,
            quality,
            SweepRange::from_center_and_quality(self.current.center, quality),
        )
    }

    /// Sets the bandwidth in Hz; quality factor and octave span re-derive.
    pub fn set_bandwidth_hz(
        &mut self,
        bandwidth: FrequencyHz,
    ) -> Result<SweepRange, ParameterError> {
        Self::ensure_positive(RangeField::Bandwidth, bandwidth.0)?;
        self.commit(
            RangeField::Bandwidth,
            bandwidth.0,
            SweepRange::from_center_and_bandwidth(self.current.center, bandwidth),
        )
    }

    /// Sets the octave span; bandwidth and quality factor re-derive.
    pub fn set_octave_span(&mut self, octaves: ParameterType) -> Result<SweepRange, ParameterError> {
        Self::ensure_positive(RangeField::Octaves, octaves)?;
        self.commit(
            RangeField::Octaves,
            octaves,
            SweepRange::from_center_and_octaves(self.current.center, octaves),
        )
    }

    fn ensure_positive(field: RangeField, value: ParameterType) -> Result<(), ParameterError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ParameterError::NotPositive { field, value })
        }
    }

    fn commit(
        &mut self,
        field: RangeField,
        value: ParameterType,
        candidate: SweepRange,
    ) -> Result<SweepRange, ParameterError> {
        let in_clamp = |f: FrequencyHz| f >= self.floor && f <= self.ceiling;
        if in_clamp(candidate.center()) && in_clamp(candidate.low()) && in_clamp(candidate.high()) {
            self.current = candidate;
            Ok(candidate)
        } else {
            Err(ParameterError::OutsideAudibleRange {
                field,
                value,
                floor: self.floor,
                ceiling: self.ceiling,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn assert_internally_consistent(r: &SweepRange) {
        assert!(
            approx_eq!(
                f64,
                r.quality() * r.bandwidth().0,
                r.center().0,
                epsilon = 1e-9 * r.center().0
            ),
            "Q and bandwidth should multiply back to the center"
        );
        assert!(
            approx_eq!(
                f64,
                r.low().0 * r.high().0,
                r.center().0 * r.center().0,
                epsilon = 1e-6 * r.center().0 * r.center().0
            ),
            "the center should be the geometric mean of the bounds"
        );
        assert!(r.low() < r.center() && r.center() < r.high());
    }

    #[test]
    fn quality_edit_derives_width_fields() {
        let mut model = RangeModel::default();
        let r = model.set_quality(10.0).unwrap();

        assert_eq!(r.bandwidth(), FrequencyHz(100.0));
        assert!(approx_eq!(
            f64,
            r.octaves(),
            2.0 * (1.0 + 50.0 / 1000.0_f64).log2(),
            epsilon = 1e-12
        ));
        // 2^(octaves/2) collapses to exactly 1 + b/(2c), so the bounds are
        // center/1.05 and center*1.05.
        assert!(approx_eq!(f64, r.low().0, 1000.0 / 1.05, epsilon = 1e-9));
        assert!(approx_eq!(f64, r.high().0, 1050.0, epsilon = 1e-9));
        assert_internally_consistent(&r);
    }

    #[test]
    fn octave_edit_derives_width_fields() {
        let mut model = RangeModel::default();
        let r = model.set_octave_span(1.0).unwrap();

        let sqrt2 = 2.0f64.sqrt();
        assert!(approx_eq!(f64, r.low().0, 1000.0 / sqrt2, epsilon = 1e-9));
        assert!(approx_eq!(f64, r.high().0, 1000.0 * sqrt2, epsilon = 1e-9));
        assert!(approx_eq!(
            f64,
            r.bandwidth().0,
            1000.0 * sqrt2 - 1000.0 / sqrt2,
            epsilon = 1e-9
        ));
        assert!(approx_eq!(f64, r.quality(), sqrt2, epsilon = 1e-9));
        assert_internally_consistent(&r);
    }

    // The published walkthrough for this tool: center 1000 Hz, Q 10 gives a
    // 100 Hz band around 951.6..1051.3, and widening to a full octave lands
    // on 707.1..1414.2 with Q back-derived to sqrt(2). The walkthrough's
    // constants are rounded, so this test uses display tolerance.
    #[test]
    fn walkthrough_scenario() {
        let mut model = RangeModel::default();

        let r = model.set_quality(10.0).unwrap();
        assert!(approx_eq!(f64, r.bandwidth().0, 100.0, epsilon = 1e-9));
        assert!((r.low().0 - 951.6).abs() / 951.6 < 1e-2);
        assert!((r.high().0 - 1051.3).abs() / 1051.3 < 1e-2);

        let r = model.set_octave_span(1.0).unwrap();
        assert!((r.low().0 - 707.1).abs() < 0.1);
        assert!((r.high().0 - 1414.2).abs() < 0.1);
        assert!((r.bandwidth().0 - 707.1).abs() < 0.1);
        assert!((r.quality() - 1.414).abs() < 1e-3);
    }

    #[test]
    fn center_edit_holds_quality() {
        let mut model = RangeModel::default();
        model.set_quality(10.0).unwrap();

        let r = model.set_center(FrequencyHz(2000.0)).unwrap();
        assert_eq!(r.quality(), 10.0);
        assert_eq!(r.bandwidth(), FrequencyHz(200.0));
        assert_internally_consistent(&r);
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let mut model = RangeModel::default();
        let before = model.current();

        assert_eq!(
            model.set_center(FrequencyHz(0.0)),
            Err(ParameterError::NotPositive {
                field: RangeField::Center,
                value: 0.0
            })
        );
        assert!(model.set_quality(-3.0).is_err());
        assert!(model.set_bandwidth_hz(FrequencyHz(f64::NAN)).is_err());
        assert!(model.set_octave_span(f64::INFINITY).is_err());
        assert_eq!(model.current(), before, "rejected edits must not mutate");
    }

    #[test]
    fn edits_outside_the_audible_clamp_are_rejected() {
        let mut model = RangeModel::default();
        let before = model.current();

        assert!(matches!(
            model.set_center(FrequencyHz(30_000.0)),
            Err(ParameterError::OutsideAudibleRange { .. })
        ));

        // The center is fine, but a wide-enough span pushes the bounds out.
        assert!(model.set_octave_span(19.0).is_err());
        assert_eq!(model.current(), before);
    }

    #[test]
    fn edits_near_the_clamp_boundary() {
        let mut model = RangeModelBuilder::default()
            .floor(FrequencyHz(100.0))
            .ceiling(FrequencyHz(10_000.0))
            .build()
            .unwrap();

        // Fails because the low bound would cross the floor, even though the
        // center itself is legal.
        model.set_center(FrequencyHz(101.0)).unwrap_err();

        // A narrow range at the same center is fine.
        model.set_octave_span(0.01).unwrap();
        let r = model.set_center(FrequencyHz(101.0)).unwrap();
        assert!(r.low() >= FrequencyHz(100.0));
    }

    #[test]
    fn every_edit_leaves_a_consistent_model() {
        let mut model = RangeModel::default();
        let edits: Vec<Box<dyn Fn(&mut RangeModel) -> Result<SweepRange, ParameterError>>> = vec![
            Box::new(|m| m.set_center(FrequencyHz(440.0))),
            Box::new(|m| m.set_quality(5.0)),
            Box::new(|m| m.set_bandwidth_hz(FrequencyHz(60.0))),
            Box::new(|m| m.set_octave_span(0.5)),
            Box::new(|m| m.set_center(FrequencyHz(8000.0))),
            Box::new(|m| m.set_quality(99.0)),
        ];
        for edit in edits {
            let r = edit(&mut model).unwrap();
            assert_eq!(r, model.current());
            assert_internally_consistent(&r);
        }
    }
}
