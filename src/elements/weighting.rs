// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;

/// [AWeighting] maps a frequency to the gain that keeps its perceived
/// loudness roughly constant relative to a 1 kHz reference, using the
/// standard A-weighting magnitude response.
///
/// The curve is continuous and smooth everywhere, so a tone sweeping through
/// it never picks up an audible gain step. It is normalized so that 1 kHz
/// maps to exactly 1.0; the narrow region above 1 kHz where the normalized
/// response pokes slightly past unity saturates at 1.0 on conversion to
/// [Normal].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AWeighting;
impl AWeighting {
    /// The frequency whose gain is unity.
    pub const REFERENCE: FrequencyHz = FrequencyHz(1000.0);

    // Pole frequencies of the analog A-weighting filter, in Hz.
    const F1: f64 = 20.598997;
    const F2: f64 = 107.65265;
    const F3: f64 = 737.86223;
    const F4: f64 = 12194.217;

    /// The loudness-compensation gain for the given frequency.
    pub fn gain(frequency: FrequencyHz) -> Normal {
        Normal::new(Self::magnitude(frequency.0) / Self::magnitude(Self::REFERENCE.0))
    }

    // The magnitude response of the A-weighting transfer function. Rises
    // monotonically from DC, peaks a little above 1 kHz, and falls off again
    // toward the top of the audible range.
    fn magnitude(frequency: f64) -> f64 {
        let f2 = frequency * frequency;
        let numerator = Self::F4 * Self::F4 * f2 * f2;
        let denominator = (f2 + Self::F1 * Self::F1)
            * ((f2 + Self::F2 * Self::F2) * (f2 + Self::F3 * Self::F3)).sqrt()
            * (f2 + Self::F4 * Self::F4);
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_gt, assert_lt};

    #[test]
    fn reference_frequency_is_unity_gain() {
        assert!(approx_eq!(
            f64,
            AWeighting::gain(AWeighting::REFERENCE).0,
            1.0,
            epsilon = 1e-12
        ));
    }

    #[test]
    fn distant_frequencies_are_attenuated() {
        let low = AWeighting::gain(FrequencyHz(50.0)).0;
        let high = AWeighting::gain(FrequencyHz(15_000.0)).0;

        assert_gt!(low, 0.0);
        assert_lt!(low, 1.0);
        assert_gt!(high, 0.0);
        assert_lt!(high, 1.0);

        // 50 Hz sits much deeper on the curve than 15 kHz does.
        assert_lt!(low, high);
    }

    #[test]
    fn slight_overshoot_above_reference_saturates_at_unity() {
        // The raw normalized response at 2.5 kHz is a little over 1.0; the
        // Normal conversion clamps it.
        assert_eq!(AWeighting::gain(FrequencyHz(2500.0)), Normal::maximum());
    }

    #[test]
    fn curve_has_no_audible_steps() {
        // Walk the audible range in small steps and confirm the gain never
        // jumps. 1 Hz per step is far finer than any sweep moves per control
        // interval.
        let mut previous = AWeighting::gain(FrequencyHz(20.0)).0;
        let mut max_delta = 0.0f64;
        for hz in 21..=20_000 {
            let gain = AWeighting::gain(FrequencyHz(hz as f64)).0;
            max_delta = max_delta.max((gain - previous).abs());
            previous = gain;
        }
        assert_lt!(max_delta, 0.01);
    }

    #[test]
    fn rises_monotonically_below_reference() {
        let mut previous = AWeighting::gain(FrequencyHz(20.0)).0;
        for hz in (40..=1000).step_by(20) {
            let gain = AWeighting::gain(FrequencyHz(hz as f64)).0;
            assert_gt!(gain, previous, "gain should rise toward 1 kHz at {hz} Hz");
            previous = gain;
        }
    }
}
