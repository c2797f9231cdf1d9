// Copyright (c) 2024 Mike Tsao

//! The traits that define the seams between parts of the system.

use crate::prelude::*;
use crossbeam::channel::{Receiver, Sender};

/// Quick import of all important traits.
pub mod prelude {
    pub use super::{Configurable, Generates, GenerationBuffer, ProvidesService};
}

/// Something that is [Configurable] is interested in staying in sync with
/// global configuration.
pub trait Configurable {
    /// Returns this item's sample rate.
    fn sample_rate(&self) -> SampleRate {
        // I was too lazy to add this everywhere when I added this to the trait,
        // but I didn't want unexpected usage to go undetected.
        unimplemented!("Someone asked for a SampleRate but we provided default");
    }

    /// The sample rate changed.
    #[allow(unused_variables)]
    fn update_sample_rate(&mut self, sample_rate: SampleRate) {}

    /// Sent to indicate that it's time to reset internal state. Oscillators
    /// should reset phase, sweeps should return to their starting position,
    /// etc.
    fn reset(&mut self) {}
}

/// A reusable buffer for signal generation, so that we can avoid allocating
/// buffers in the generation code paths.
#[derive(Clone, Debug, Default)]
pub struct GenerationBuffer<V: Default + Clone + Copy> {
    vec: Vec<V>,
}
impl<V: Default + Clone + Copy> GenerationBuffer<V> {
    /// Returns the current size of the buffer.
    pub fn buffer_size(&self) -> usize {
        self.vec.len()
    }

    /// Sets the buffer size. Does nothing if the buffer is already this size.
    pub fn resize(&mut self, size: usize) {
        if size != self.buffer_size() {
            self.vec.resize(size, V::default());
        }
    }

    /// Returns a reference to the buffer.
    pub fn buffer(&self) -> &[V] {
        &self.vec
    }

    /// Returns a mutable reference to the buffer.
    pub fn buffer_mut(&mut self) -> &mut [V] {
        &mut self.vec
    }

    /// Sets the buffer's contents to the default value. Does not change its
    /// size.
    pub fn clear(&mut self) {
        self.vec.fill(V::default());
    }

    /// Creates a buffer of the specified size.
    pub fn new_with(size: usize) -> Self {
        let mut r = GenerationBuffer::default();
        r.resize(size);
        r
    }
}

/// Something that [Generates] creates the given type `<V>` as its work product
/// over time. Examples are gain ramps, which produce a [Normal] signal, and
/// oscillators, which produce a [BipolarNormal] signal.
#[allow(unused_variables)]
pub trait Generates<V: Default + Clone>: Send + core::fmt::Debug + Configurable {
    /// Fills a batch of values with new signal. Returns true if the signal was
    /// non-default; for example, in the case of a [Sample] signal, returns
    /// true if any part of the generated signal was non-silent.
    fn generate(&mut self, values: &mut [V]) -> bool {
        values.fill(V::default());
        false
    }
}

/// Service methods.
///
/// A service is something that usually runs in its own thread as a daemon and
/// that communicates with clients by crossbeam channels. It accepts Inputs and
/// produces Events.
pub trait ProvidesService<I: core::fmt::Debug, E: core::fmt::Debug> {
    /// The sender side of the Input channel. Use this to send commands to the
    /// service.
    fn sender(&self) -> &Sender<I>;

    /// A convenience method to send Inputs to the service. Calling this implies
    /// that the caller has kept a reference to the service, which is uncommon,
    /// as the main value of services is to be able to clone senders with
    /// reckless abandon.
    fn send_input(&self, input: I) {
        if let Err(e) = self.sender().try_send(input) {
            eprintln!("While sending: {e:?}");
        }
    }

    /// The receiver side of the Event channel. Integrate this into a listener
    /// loop to respond to events.
    fn receiver(&self) -> &Receiver<E>;

    /// A convenience method to receive either Inputs or Events inside a
    /// crossbeam select loop. Unlike send_input(), this one is used frequently
    /// because it doesn't require use of &self.
    fn recv_operation<T>(
        oper: crossbeam::channel::SelectedOperation,
        r: &Receiver<T>,
    ) -> Result<T, crossbeam::channel::RecvError> {
        let input_result = oper.recv(r);
        if let Err(e) = input_result {
            eprintln!(
                "ProvidesService: While attempting to receive from {:?}: {}",
                *r, e
            );
        }
        input_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_buffer_mainline() {
        let mut buffer: GenerationBuffer<Sample> = GenerationBuffer::new_with(4);
        assert_eq!(buffer.buffer_size(), 4);
        assert!(buffer.buffer().iter().all(|s| *s == Sample::SILENCE));

        buffer.buffer_mut()[2] = Sample::MAX;
        buffer.resize(4); // no-op
        assert_eq!(buffer.buffer()[2], Sample::MAX);

        buffer.clear();
        assert!(buffer.buffer().iter().all(|s| *s == Sample::SILENCE));

        buffer.resize(8);
        assert_eq!(buffer.buffer_size(), 8);
    }
}
