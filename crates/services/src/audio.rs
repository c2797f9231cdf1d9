// Copyright (c) 2024 Mike Tsao

//! [AudioService] provides channel-based communication with the
//! [cpal](https://crates.io/crates/cpal) audio interface.

use crate::CrossbeamChannel;
use core::fmt::Debug;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, FromSample, Sample as CpalSample, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};
use crossbeam::{
    channel::{Receiver, Sender},
    queue::ArrayQueue,
};
use delegate::delegate;
use std::sync::Arc;
use tonesweep::traits::ProvidesService;

/// The fundamental type of an audio sample on its way to the device.
pub type AudioSampleType = f32;
/// (left channel, right channel)
pub type AudioStereoSampleType = (AudioSampleType, AudioSampleType);

/// A ring buffer of stereo frames that the audio stream consumes. This is the
/// real-time boundary: the cpal callback only pops, so it never blocks,
/// allocates, or waits on the generation side.
struct AudioQueue(Arc<ArrayQueue<AudioStereoSampleType>>);
impl AudioQueue {
    fn new(buffer_size: usize) -> Self {
        Self(Arc::new(ArrayQueue::new(buffer_size)))
    }

    delegate! {
        to self.0 {
            fn len(&self) -> usize;
            fn capacity(&self) -> usize;
            fn pop(&self) -> Option<AudioStereoSampleType>;
            fn force_push(&self, frame: AudioStereoSampleType) -> Option<AudioStereoSampleType>;
        }
    }
}
impl Clone for AudioQueue {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// An [AudioServiceInput] tells [AudioService] what to do.
#[derive(Debug)]
pub enum AudioServiceInput {
    /// Shuts the service down and releases the device. The service replies
    /// with [AudioServiceEvent::Released] once the stream is gone, which is
    /// what makes a synchronous stop possible.
    Quit,
    /// Provides frames for the device. They are added to the service's ring
    /// buffer and consumed as the hardware drains it.
    Frames(Arc<Vec<AudioStereoSampleType>>),
    /// Resumes the underlying audio stream. It's unnecessary to send this for
    /// a new service, which plays automatically upon creation.
    Play,
    /// Pauses the underlying audio stream without releasing the device.
    Pause,
}

/// An [AudioServiceEvent] informs clients what's going on.
#[derive(Debug)]
pub enum AudioServiceEvent {
    /// The service has initialized or reinitialized. Provides the sample
    /// rate and channel count.
    Reset(usize, u8),
    /// The audio interface needs audio frames ASAP. Provide the specified
    /// number with [AudioServiceInput::Frames].
    FramesNeeded(usize),
    /// The audio interface asked for more frames than the ring buffer held.
    Underrun,
    /// The device opened, but the stream could not be built on it.
    StreamError(String),
    /// A [AudioServiceInput::Quit] was processed and the stream was dropped.
    Released,
}

/// Wrapper for cpal structs. [WrappedStream] exists for two reasons: first,
/// to implement [core::fmt::Debug] for the structs that don't, and second,
/// because the stream isn't `Send` and so needs to live on its own thread,
/// which we manage here. See <https://github.com/RustAudio/cpal/issues/818>.
struct WrappedStream {
    queue: AudioQueue,

    sample_rate: usize,
    channel_count: u8,
}
impl Debug for WrappedStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WrappedStream")
            .field("config", &"(skipped)")
            .field("cpal_stream", &"(skipped)")
            .field("queue", &self.queue.0)
            .finish()
    }
}
impl WrappedStream {
    /// period_size is the size, in frames, of a single group of frames in the
    /// audio buffer. <https://www.alsa-project.org/wiki/FramesPeriods>
    pub fn new_with(
        period_size: usize,
        sender: &Sender<AudioServiceEvent>,
        receiver: &Receiver<AudioServiceInput>,
    ) -> anyhow::Result<Self> {
        // Opening the device happens here, on the caller's thread, so that a
        // missing or busy device surfaces as an error return rather than a
        // dead service.
        let (_host, device, config) = Self::host_device_setup()?;

        // The ring buffer is a multiple of the period size so the hardware
        // can drain one period while the engine is producing the next. Three
        // rather than two gives the generation side slack to absorb
        // scheduling hiccups.
        let buffer_size = period_size * 3;
        let queue = AudioQueue::new(buffer_size);

        let receiver = receiver.clone();
        let config_clone = config.clone();
        let queue_clone = queue.clone();
        let sender = sender.clone();
        std::thread::spawn(move || {
            let queue_clone_2 = queue_clone.clone();
            let stream = match Self::stream_setup_for(
                &device,
                config_clone.clone(),
                period_size,
                queue_clone,
                sender.clone(),
            ) {
                Ok(cpal_stream) => Some(cpal_stream),
                Err(e) => {
                    let _ = sender.send(AudioServiceEvent::StreamError(format!("{e:?}")));
                    None
                }
            };
            while let Ok(input) = receiver.recv() {
                match input {
                    AudioServiceInput::Frames(frames) => {
                        for frame in frames.iter() {
                            if queue_clone_2.force_push(*frame).is_some() {
                                eprintln!("Caution: audio buffer overrun");
                            }
                        }
                    }
                    AudioServiceInput::Play => {
                        if let Some(stream) = stream.as_ref() {
                            let _ = stream.play();
                        }
                    }
                    AudioServiceInput::Pause => {
                        if let Some(stream) = stream.as_ref() {
                            let _ = stream.pause();
                        }
                    }
                    AudioServiceInput::Quit => {
                        break;
                    }
                }
            }
            // Dropping the stream is what actually releases the device.
            // Acknowledge afterward so a stopping engine has a deterministic
            // join point.
            drop(stream);
            let _ = sender.send(AudioServiceEvent::Released);
        });
        Ok(Self {
            queue,
            sample_rate: config.sample_rate().0 as usize,
            channel_count: config.channels() as u8,
        })
    }

    /// Returns the default host, device, and stream config (all of which are
    /// cpal concepts).
    fn host_device_setup(
    ) -> anyhow::Result<(cpal::Host, cpal::Device, cpal::SupportedStreamConfig), anyhow::Error>
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::Error::msg("Default output device is not available"))?;
        let config = device.default_output_config()?;

        let config = SupportedStreamConfig::new(
            config.channels(),
            config.sample_rate(),
            *config.buffer_size(),
            config.sample_format(),
        );
        Ok((host, device, config))
    }

    /// Creates and returns a Stream for the given device and config. The
    /// Stream will consume the data in the supplied [AudioQueue]. This
    /// function is actually a wrapper around the generic [Self::stream_make].
    fn stream_setup_for(
        device: &cpal::Device,
        config: SupportedStreamConfig,
        period_size: usize,
        queue: AudioQueue,
        sender: Sender<AudioServiceEvent>,
    ) -> anyhow::Result<Stream, anyhow::Error> {
        let sample_format = config.sample_format();
        let mut config: StreamConfig = config.into();

        // We set buffer size here, rather than in host_device_setup(), because
        // it's troublesome to create a [cpal::SupportedBufferSize] on the fly.
        config.buffer_size = BufferSize::Fixed(period_size as u32);

        match sample_format {
            cpal::SampleFormat::I8 => {
                Self::stream_make::<i8>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I16 => {
                Self::stream_make::<i16>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I32 => {
                Self::stream_make::<i32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I64 => {
                Self::stream_make::<i64>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U8 => {
                Self::stream_make::<u8>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U16 => {
                Self::stream_make::<u16>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U32 => {
                Self::stream_make::<u32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U64 => {
                Self::stream_make::<u64>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::F32 => {
                Self::stream_make::<f32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::F64 => {
                Self::stream_make::<f64>(&config, device, period_size, queue, sender)
            }
            _ => Err(anyhow::Error::msg(format!(
                "Unexpected sample format {sample_format:?}"
            ))),
        }
    }

    /// Generic portion of stream_setup_for().
    fn stream_make<T>(
        config: &cpal::StreamConfig,
        device: &cpal::Device,
        period_size: usize,
        queue: AudioQueue,
        sender: Sender<AudioServiceEvent>,
    ) -> Result<Stream, anyhow::Error>
    where
        T: SizedSample + FromSample<AudioSampleType>,
    {
        let err_fn = |err| eprintln!("Error building output sound stream: {}", err);

        let channel_count = config.channels as usize;
        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::on_window(output, channel_count, period_size, &queue, &sender)
            },
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// cpal callback that supplies samples from the AudioQueue, converting
    /// them if needed to the stream's expected data type.
    fn on_window<T>(
        output: &mut [T],
        channel_count: usize,
        period_size: usize,
        queue: &AudioQueue,
        sender: &Sender<AudioServiceEvent>,
    ) where
        T: CpalSample + FromSample<AudioSampleType>,
    {
        let have_len = queue.len();
        let need_len = output.len();

        // Calculate how many frames we should request.
        let request_len = if have_len < need_len {
            // We're at risk of underrun. Increase work amount beyond what
            // we're about to consume.
            need_len * 2
        } else if have_len > need_len * 2 {
            // We are far ahead of the current window's needs. Replace only
            // half of the current request.
            need_len / 2
        } else {
            // We're keeping up. Replace exactly what we're about to consume.
            need_len
        }
        .min(period_size);

        for frame in output.chunks_exact_mut(channel_count) {
            if let Some(sample) = queue.pop() {
                frame[0] = T::from_sample(sample.0);
                if channel_count > 1 {
                    frame[1] = T::from_sample(sample.1);
                }
            } else {
                let _ = sender.send(AudioServiceEvent::Underrun);

                // No point in continuing to loop.
                break;
            }
        }

        // Don't ask for more than the queue can hold.
        let request_len = (queue.capacity() - queue.len()).min(request_len);

        // Request the frames.
        let _ = sender.send(AudioServiceEvent::FramesNeeded(request_len));
    }

    fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    fn channel_count(&self) -> u8 {
        self.channel_count
    }
}

/// [AudioService] provides channel-based communication with the cpal audio
/// interface.
#[derive(Debug)]
pub struct AudioService {
    inputs: CrossbeamChannel<AudioServiceInput>,
    events: CrossbeamChannel<AudioServiceEvent>,

    /// The cpal audio stream.
    #[allow(dead_code)]
    stream: WrappedStream,
}
impl ProvidesService<AudioServiceInput, AudioServiceEvent> for AudioService {
    fn receiver(&self) -> &Receiver<AudioServiceEvent> {
        &self.events.receiver
    }

    fn sender(&self) -> &Sender<AudioServiceInput> {
        &self.inputs.sender
    }
}
impl AudioService {
    /// A reasonable period size. This value is on the upper edge of
    /// perceptible latency for 44.1KHz (512 / 44100 = 11.6 milliseconds).
    const SUGGESTED_PERIOD_SIZE: usize = 512;

    /// Creates a new [AudioService] with an internal buffer whose size is
    /// based on the given period size, or a reasonable default if none is
    /// provided. A "period" is a chunk of the audio buffer that the audio
    /// interface reads at once. The buffer is actually an integer multiple of
    /// that size to give the software some slack time to fill the buffer
    /// while the hardware audio interface is draining it.
    ///
    /// Fails if the default output device can't be opened.
    pub fn new_with(period_size: Option<usize>) -> anyhow::Result<Self> {
        let inputs: CrossbeamChannel<AudioServiceInput> = Default::default();
        let events: CrossbeamChannel<AudioServiceEvent> = Default::default();
        let period_size = period_size.unwrap_or(Self::SUGGESTED_PERIOD_SIZE);
        let stream = WrappedStream::new_with(period_size, &events.sender, &inputs.receiver)?;

        let audio_service = Self {
            inputs,
            events,
            stream,
        };
        let _ = audio_service.events.sender.send(AudioServiceEvent::Reset(
            audio_service.stream.sample_rate(),
            audio_service.stream.channel_count(),
        ));

        Ok(audio_service)
    }

    /// The sample rate of the open stream.
    pub fn sample_rate(&self) -> usize {
        self.stream.sample_rate()
    }

    /// The channel count of the open stream.
    pub fn channel_count(&self) -> u8 {
        self.stream.channel_count()
    }
}
