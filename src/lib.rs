// Copyright (c) 2024 Mike Tsao

#![deny(missing_docs, unused_imports, unused_variables)]

//! Tonesweep generates continuous, perceptually-levelled tone sweeps.
//!
//! The crate is organized as a small stack of layers:
//!
//! * [types] holds the numeric newtypes ([FrequencyHz](types::FrequencyHz),
//!   [Normal](types::Normal), [Sample](types::Sample), and friends) that keep
//!   units straight throughout the system.
//! * [elements] holds the synthesis building blocks: the range parameter
//!   model, the sweep trajectory, the equal-loudness weighting curve, the
//!   phase-continuous oscillator, and the [SweepSynthCore](elements::SweepSynthCore)
//!   that combines them into a block-fill routine.
//! * [engine] holds the pieces that cross the control/audio thread boundary:
//!   run-state, error and event types, and the lock-free snapshot handoff.
//!
//! Nothing in this crate touches an audio device or spawns a thread. The
//! `tonesweep-services` crate wraps these elements in a cpal-backed real-time
//! engine; this crate alone is enough for offline rendering and testing.

/// A collection of imports that are useful to users of this crate. `use
/// tonesweep::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        elements::prelude::*, engine::prelude::*, traits::prelude::*, types::prelude::*,
    };
}

pub mod elements;
pub mod engine;
pub mod traits;
pub mod types;
