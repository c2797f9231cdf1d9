// Copyright (c) 2024 Mike Tsao

//! [SweepEngine] is the control-facing face of the real-time engine: it owns
//! the device lifecycle, the generation worker, and the parameter model, and
//! exposes the API a control panel calls.

use crate::{
    AudioSampleType, AudioService, AudioServiceEvent, AudioServiceInput, AudioStereoSampleType,
    CrossbeamChannel,
};
use crossbeam::channel::{Receiver, Sender};
use std::{sync::Arc, thread::JoinHandle};
use tonesweep::prelude::*;

/// Commands the control side sends to the generation worker.
#[derive(Debug)]
enum WorkerCommand {
    Stop,
}

/// The real-time sweep engine.
///
/// State machine: `Idle --start()--> Running --stop()--> Stopping --> Idle`.
/// [Self::start] fails with [EngineError::DeviceUnavailable] if the output
/// device can't be opened and with [EngineError::AlreadyRunning] if the
/// engine isn't idle. [Self::stop] asks the worker to ramp the tone down,
/// release the device, and acknowledge; it blocks until that happens, so when
/// it returns, the device is free. Stopping an idle engine is a no-op.
///
/// Parameter edits are legal in any state. Each successful edit publishes an
/// immutable snapshot that the worker adopts at its next block boundary; an
/// in-flight block always finishes with the parameters it started with.
///
/// Faults arrive on [Self::events], never as callbacks: a lone
/// [EngineEvent::Underrun] is informational, while repeated consecutive
/// underruns (or a dead stream) force the engine back to idle with a
/// [EngineEvent::StreamFailure].
#[derive(Debug)]
pub struct SweepEngine {
    model: RangeModel,

    // The configured synthesis core. Each run gets a fresh clone, so a
    // stopped engine restarts from a clean phase and ramp.
    core: SweepSynthCore,

    state: SharedEngineState,
    readout: FrequencyReadout,
    publisher: RangePublisher,
    events: CrossbeamChannel<EngineEvent>,

    command_sender: Option<Sender<WorkerCommand>>,
    worker: Option<JoinHandle<()>>,
    service: Option<AudioService>,
}
impl Default for SweepEngine {
    fn default() -> Self {
        Self::new_with(RangeModel::default(), SweepSynthCore::default())
    }
}
impl SweepEngine {
    /// Creates an engine around the given parameter model and synthesis
    /// core configuration.
    pub fn new_with(model: RangeModel, core: SweepSynthCore) -> Self {
        // This publisher has no consumer until the first start() swaps in a
        // live pair, but the setters don't need to care.
        let (publisher, _) = range_handoff(model.current());
        Self {
            model,
            core,
            state: Default::default(),
            readout: Default::default(),
            publisher,
            events: Default::default(),
            command_sender: None,
            worker: None,
            service: None,
        }
    }

    /// Opens the output device and starts sweeping.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state.get() != EngineState::Idle {
            return Err(EngineError::AlreadyRunning);
        }

        let service = AudioService::new_with(None)
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;

        let (publisher, adopter) = range_handoff(self.model.current());
        self.publisher = publisher;

        let commands: CrossbeamChannel<WorkerCommand> = Default::default();
        let worker = Worker {
            core: self.core.clone(),
            adopter,
            readout: self.readout.clone(),
            state: self.state.clone(),
            engine_events: self.events.sender.clone(),
            service_events: service.receiver().clone(),
            service_inputs: service.sender().clone(),
            commands: commands.receiver.clone(),
        };

        self.state.set(EngineState::Running);
        self.worker = Some(std::thread::spawn(move || worker.run()));
        self.command_sender = Some(commands.sender);
        self.service = Some(service);
        Ok(())
    }

    /// Ramps the tone down, releases the device, and returns once both have
    /// happened. A no-op on an idle engine.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if self.state.get() == EngineState::Idle && self.worker.is_none() {
            return Ok(());
        }
        self.state.set(EngineState::Stopping);

        if let Some(sender) = self.command_sender.take() {
            // Fails only if the worker is already gone, which is fine.
            let _ = sender.send(WorkerCommand::Stop);
        }
        let result = if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| {
                EngineError::StreamFailure("generation worker panicked".to_string())
            })
        } else {
            Ok(())
        };
        self.service = None;
        self.state.set(EngineState::Idle);
        result
    }

    /// The engine's current run-state.
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// The latest published parameter snapshot.
    pub fn params(&self) -> SweepRange {
        self.model.current()
    }

    /// The instantaneous sweep frequency, at display rate. Safe to poll as
    /// often as a UI likes; the audio side is unaffected.
    pub fn current_frequency(&self) -> FrequencyHz {
        self.readout.get()
    }

    /// The engine's fault/notification channel.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events.receiver
    }

    /// Sets the center frequency. See [RangeModel::set_center].
    pub fn set_center(&mut self, center: FrequencyHz) -> Result<SweepRange, ParameterError> {
        let range = self.model.set_center(center)?;
        self.publisher.publish(range);
        Ok(range)
    }

    /// Sets the quality factor. See [RangeModel::set_quality].
    pub fn set_quality(&mut self, quality: ParameterType) -> Result<SweepRange, ParameterError> {
        let range = self.model.set_quality(quality)?;
        self.publisher.publish(range);
        Ok(range)
    }

    /// Sets the bandwidth in Hz. See [RangeModel::set_bandwidth_hz].
    pub fn set_bandwidth_hz(
        &mut self,
        bandwidth: FrequencyHz,
    ) -> Result<SweepRange, ParameterError> {
        let range = self.model.set_bandwidth_hz(bandwidth)?;
        self.publisher.publish(range);
        Ok(range)
    }

    /// Sets the octave span. See [RangeModel::set_octave_span].
    pub fn set_octave_span(
        &mut self,
        octaves: ParameterType,
    ) -> Result<SweepRange, ParameterError> {
        let range = self.model.set_octave_span(octaves)?;
        self.publisher.publish(range);
        Ok(range)
    }
}
impl Drop for SweepEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// The generation worker. Runs on its own thread for the duration of one
/// `Running` interval, selecting over engine commands and audio-service
/// events.
#[derive(Debug)]
struct Worker {
    core: SweepSynthCore,
    adopter: RangeAdopter,
    readout: FrequencyReadout,
    state: SharedEngineState,
    engine_events: Sender<EngineEvent>,
    service_events: Receiver<AudioServiceEvent>,
    service_inputs: Sender<AudioServiceInput>,
    commands: Receiver<WorkerCommand>,
}
impl Worker {
    /// How many consecutive underruns we'll ride out before declaring the
    /// stream dead.
    const UNDERRUN_TOLERANCE: usize = 4;

    /// Frames per chunk while draining the stop ramp.
    const FADE_CHUNK_FRAMES: usize = 256;

    fn run(mut self) {
        let mut consecutive_underruns = 0usize;
        let mut mono: GenerationBuffer<Sample> = Default::default();

        loop {
            crossbeam::select! {
                recv(self.commands) -> command => match command {
                    // A dropped sender means the engine is going away; treat
                    // it like a stop.
                    Ok(WorkerCommand::Stop) | Err(_) => {
                        self.drain_with_fade(&mut mono);
                        break;
                    }
                },
                recv(self.service_events) -> event => match event {
                    Ok(AudioServiceEvent::Reset(sample_rate, _channel_count)) => {
                        self.core.update_sample_rate(SampleRate::new(sample_rate));
                    }
                    Ok(AudioServiceEvent::FramesNeeded(count)) => {
                        consecutive_underruns = 0;
                        let range = self.adopter.adopt_latest();
                        self.core.adopt_range(range);
                        self.send_frames(&mut mono, count);
                        self.readout.publish(self.core.current_frequency());
                    }
                    Ok(AudioServiceEvent::Underrun) => {
                        consecutive_underruns += 1;
                        let _ = self.engine_events.send(EngineEvent::Underrun);
                        if consecutive_underruns >= Self::UNDERRUN_TOLERANCE {
                            self.fail(format!(
                                "{consecutive_underruns} consecutive buffer underruns"
                            ));
                            break;
                        }
                    }
                    Ok(AudioServiceEvent::StreamError(message)) => {
                        self.fail(message);
                        break;
                    }
                    Ok(AudioServiceEvent::Released) | Err(_) => {
                        self.fail("audio stream closed unexpectedly".to_string());
                        break;
                    }
                },
            }
        }
    }

    fn send_frames(&mut self, mono: &mut GenerationBuffer<Sample>, count: usize) {
        mono.resize(count);
        self.core.generate(mono.buffer_mut());
        let frames: Vec<AudioStereoSampleType> = mono
            .buffer()
            .iter()
            .map(|s| {
                let value = s.0 as AudioSampleType;
                (value, value)
            })
            .collect();
        let _ = self
            .service_inputs
            .send(AudioServiceInput::Frames(Arc::new(frames)));
    }

    // Emit the click-suppressing tail, release the device, and wait for the
    // acknowledgment, so that the engine's stop() has a deterministic join.
    fn drain_with_fade(&mut self, mono: &mut GenerationBuffer<Sample>) {
        self.core.begin_fade_out();
        while !self.core.is_faded_out() {
            self.send_frames(mono, Self::FADE_CHUNK_FRAMES);
        }
        let _ = self.service_inputs.send(AudioServiceInput::Quit);
        while let Ok(event) = self.service_events.recv() {
            if matches!(event, AudioServiceEvent::Released) {
                break;
            }
        }
        let _ = self.engine_events.send(EngineEvent::Stopped);
        self.state.set(EngineState::Idle);
    }

    fn fail(&self, message: String) {
        eprintln!("SweepEngine stream failure: {message}");
        let _ = self.service_inputs.send(AudioServiceInput::Quit);
        let _ = self.engine_events.send(EngineEvent::StreamFailure(message));
        self.state.set(EngineState::Idle);
    }
}
