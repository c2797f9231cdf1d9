// Copyright (c) 2024 Mike Tsao

//! The device-facing half of the tonesweep workspace: a cpal-backed audio
//! output service and the [SweepEngine] that drives the synthesis core
//! through it in real time.
//!
//! Everything here communicates over crossbeam channels. The `tonesweep`
//! crate stays free of devices and threads; this crate owns both.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    #[cfg(feature = "audio")]
    pub use super::{AudioService, AudioServiceEvent, AudioServiceInput, SweepEngine};
    pub use super::CrossbeamChannel;
}

#[cfg(feature = "audio")]
pub use audio::{
    AudioSampleType, AudioService, AudioServiceEvent, AudioServiceInput, AudioStereoSampleType,
};
#[cfg(feature = "audio")]
pub use engine::SweepEngine;
pub use types::CrossbeamChannel;

#[cfg(feature = "audio")]
mod audio;
#[cfg(feature = "audio")]
mod engine;
mod types;
