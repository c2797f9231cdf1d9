// Copyright (c) 2024 Mike Tsao

//! The pieces that cross the control/audio thread boundary: run-state, the
//! engine's error and event types, and the lock-free handoffs that carry a
//! parameter snapshot one way and a frequency readout the other.
//!
//! Two rules govern everything here. The audio side must never block or
//! allocate: both handoffs are fixed-capacity and wait-free. And nothing
//! mutable is ever shared: the control side publishes whole immutable
//! [SweepRange] snapshots, and the audio side adopts the newest one at a
//! block boundary.

use crate::prelude::*;
use crossbeam::{atomic::AtomicCell, queue::ArrayQueue};
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        range_handoff, EngineError, EngineEvent, EngineState, FrequencyReadout, RangeAdopter,
        RangePublisher, SharedEngineState,
    };
}

/// The run-state of the audio output engine.
#[derive(Clone, Copy, Debug, Default, Display, Eq, IntoStaticStr, PartialEq)]
pub enum EngineState {
    /// No device is held; the engine is silent and startable.
    #[default]
    Idle,
    /// The device is open and the engine is producing audio.
    Running,
    /// A stop was requested; the engine is ramping down and releasing the
    /// device.
    Stopping,
}

/// Errors returned synchronously from the engine's control API.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    /// The audio output device could not be opened.
    #[error("audio output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// start() was called while the engine was already running.
    #[error("the engine is already running")]
    AlreadyRunning,

    /// The audio stream failed and the engine returned to idle.
    #[error("audio stream failure: {0}")]
    StreamFailure(String),
}

/// Asynchronous notifications from the engine. Delivered over a channel the
/// control side polls at its leisure, never as a callback into control code.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The device consumed frames faster than the engine produced them. One
    /// of these is survivable; the engine keeps playing.
    Underrun,

    /// Too many consecutive underruns, or the stream died outright. The
    /// engine has already forced itself to [EngineState::Idle] and released
    /// the device.
    StreamFailure(String),

    /// A stop request completed and the device was released.
    Stopped,
}

/// Creates a connected [RangePublisher]/[RangeAdopter] pair seeded with the
/// given snapshot.
pub fn range_handoff(initial: SweepRange) -> (RangePublisher, RangeAdopter) {
    let queue = Arc::new(ArrayQueue::new(1));
    (
        RangePublisher {
            queue: Arc::clone(&queue),
        },
        RangeAdopter {
            queue,
            active: initial,
        },
    )
}

/// The control side of the parameter handoff. Publishing never blocks; a
/// snapshot that was published but not yet adopted is simply displaced by the
/// next one, because only the newest matters.
#[derive(Debug)]
pub struct RangePublisher {
    queue: Arc<ArrayQueue<SweepRange>>,
}
impl RangePublisher {
    /// Publishes a snapshot for the audio side to adopt at its next block
    /// boundary.
    pub fn publish(&self, range: SweepRange) {
        let _ = self.queue.force_push(range);
    }
}

/// The audio side of the parameter handoff. Owned by the generation context;
/// the control side never touches it.
#[derive(Debug)]
pub struct RangeAdopter {
    queue: Arc<ArrayQueue<SweepRange>>,
    active: SweepRange,
}
impl RangeAdopter {
    /// Adopts the newest published snapshot, if any, and returns the active
    /// one. Wait-free; call at the start of each block.
    pub fn adopt_latest(&mut self) -> SweepRange {
        while let Some(range) = self.queue.pop() {
            self.active = range;
        }
        self.active
    }

    /// The snapshot most recently adopted.
    pub fn active(&self) -> SweepRange {
        self.active
    }
}

/// A display-rate readout of the instantaneous sweep frequency. The audio
/// side stores, the control side loads, both wait-free.
#[derive(Clone, Debug)]
pub struct FrequencyReadout(Arc<AtomicCell<f64>>);
impl Default for FrequencyReadout {
    fn default() -> Self {
        Self::new(FrequencyHz::default())
    }
}
impl FrequencyReadout {
    #[allow(missing_docs)]
    pub fn new(initial: FrequencyHz) -> Self {
        Self(Arc::new(AtomicCell::new(initial.0)))
    }

    /// Called by the audio side after each block.
    pub fn publish(&self, frequency: FrequencyHz) {
        self.0.store(frequency.0);
    }

    /// Called by the control side whenever a display wants a fresh value.
    pub fn get(&self) -> FrequencyHz {
        FrequencyHz(self.0.load())
    }
}

/// The engine's run-state, shared between the control side (which drives
/// start/stop) and the worker (which can force Idle on stream failure).
#[derive(Clone, Debug)]
pub struct SharedEngineState(Arc<AtomicCell<EngineState>>);
impl Default for SharedEngineState {
    fn default() -> Self {
        Self(Arc::new(AtomicCell::new(EngineState::default())))
    }
}
impl SharedEngineState {
    #[allow(missing_docs)]
    pub fn get(&self) -> EngineState {
        self.0.load()
    }

    #[allow(missing_docs)]
    pub fn set(&self, state: EngineState) {
        self.0.store(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopter_sees_the_newest_snapshot() {
        let mut model = RangeModel::default();
        let (publisher, mut adopter) = range_handoff(model.current());

        publisher.publish(model.set_quality(5.0).unwrap());
        publisher.publish(model.set_quality(7.0).unwrap());
        let newest = model.set_quality(9.0).unwrap();
        publisher.publish(newest);

        assert_eq!(
            adopter.adopt_latest(),
            newest,
            "intermediate snapshots should be displaced"
        );
    }

    #[test]
    fn adopter_keeps_the_active_snapshot_when_nothing_is_published() {
        let initial = SweepRange::default();
        let (_publisher, mut adopter) = range_handoff(initial);

        assert_eq!(adopter.adopt_latest(), initial);
        assert_eq!(adopter.active(), initial);
    }

    #[test]
    fn frequency_readout_round_trip() {
        let readout = FrequencyReadout::default();
        assert_eq!(readout.get(), FrequencyHz::default());

        let display_side = readout.clone();
        readout.publish(FrequencyHz(123.5));
        assert_eq!(display_side.get(), FrequencyHz(123.5));
    }

    #[test]
    fn shared_state_round_trip() {
        let state = SharedEngineState::default();
        assert_eq!(state.get(), EngineState::Idle);

        let worker_side = state.clone();
        worker_side.set(EngineState::Running);
        assert_eq!(state.get(), EngineState::Running);
    }
}
