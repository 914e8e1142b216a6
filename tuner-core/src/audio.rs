//! # Audio Capture Module
//!
//! This module connects an [`AudioCapture`] to a live input device using CPAL
//! (Cross-Platform Audio Library) and runs the monitor loop that reports how
//! many frames arrived per interval.
//!
//! ## Threads
//! - The CPAL callback thread owns the [`AudioCapture`] and only writes to it.
//! - The thread calling [`CaptureStream::run`] drains the frame counter and
//!   reacts to stream errors, which the error callback forwards over a
//!   bounded channel.

use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SupportedBufferSize, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::capture::{AudioCapture, CaptureConfig, CaptureHandle};
use crate::error::{TunerError, TunerResult};

/// Default interval between two frame count reports.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Stream errors kept until the monitor picks them up.
const ERROR_QUEUE_DEPTH: usize = 8;

/// A running input stream feeding an [`AudioCapture`].
pub struct CaptureStream {
    stream: cpal::Stream,
    handle: CaptureHandle,
    errors: Receiver<TunerError>,
    device_name: String,
    sample_rate: u32,
}

/// Opens the default input device and starts streaming into a new capture.
///
/// This function:
/// 1. Validates `config` and allocates the ring buffer
/// 2. Selects the default input device and an f32 format matching the
///    requested channel count and sample rate
/// 3. Builds and starts the stream with a fixed callback buffer size when
///    the device supports it
///
/// # Returns
/// * `Ok(stream)` - The stream is playing and its capture is `Running`
/// * `Err(TunerError::AudioSubsystem)` - No device or no usable stream
pub fn start_audio_capture(config: CaptureConfig) -> TunerResult<CaptureStream> {
    let mut capture = AudioCapture::new(config)?;

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| TunerError::audio("No input device available"))?;
    let device_name = device.name()?;
    info!("Using audio input device: {device_name}");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = find_supported_config(configs, &config).ok_or_else(|| {
        TunerError::audio(format!(
            "No f32 input format with {} channel(s) at {} Hz",
            config.channel_count, config.sample_rate
        ))
    })?;

    let stream_config = cpal::StreamConfig {
        channels: config.channel_count,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: buffer_size_for(&supported, config.frames_per_buffer),
    };
    debug!("Selected stream config: {stream_config:?}");

    let handle = capture.handle();
    let (error_tx, error_rx) = crossbeam_channel::bounded(ERROR_QUEUE_DEPTH);
    let channels = config.channel_count as usize;

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // CPAL has no way to end a stream from inside the callback. Once
            // the capture says stop it ignores further frames and the monitor
            // closes the stream.
            let _ = capture.on_frames_delivered(data, data.len() / channels);
        },
        move |err| forward_stream_error(&error_tx, err),
        None,
    )?;

    stream.play()?;
    handle.mark_running();
    info!(
        "Capturing {} channel(s) at {} Hz, {} s ring buffer",
        config.channel_count, config.sample_rate, config.capture_seconds
    );

    Ok(CaptureStream {
        stream,
        handle,
        errors: error_rx,
        device_name,
        sample_rate: config.sample_rate,
    })
}

impl CaptureStream {
    /// Handle for signal handlers and other threads.
    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Reports the drained frame count every `interval` until the capture
    /// stops, then closes the stream.
    ///
    /// Returns the first stream error if the device failed while running.
    pub fn run<F>(self, interval: Duration, report: F) -> TunerResult<()>
    where
        F: FnMut(u64),
    {
        let CaptureStream {
            stream,
            handle,
            errors,
            ..
        } = self;

        let result = monitor(&handle, &errors, interval, report);

        if let Err(err) = stream.pause() {
            warn!("Failed to pause audio stream: {err}");
        }
        drop(stream);
        handle.mark_stopped();
        info!("Audio stream closed");

        result
    }
}

/// Drains `handle` every `interval` and passes the count to `report` while
/// the capture is active.
///
/// Frames counted after the last tick are reported once the capture stops.
/// An error received on `errors` aborts the capture; the loop then reports
/// one final count and returns that error.
pub fn monitor<F>(
    handle: &CaptureHandle,
    errors: &Receiver<TunerError>,
    interval: Duration,
    mut report: F,
) -> TunerResult<()>
where
    F: FnMut(u64),
{
    let mut failure = None;

    while handle.is_active() {
        match errors.recv_timeout(interval) {
            Ok(err) => {
                error!("An error occurred on the audio stream: {err}");
                handle.abort();
                if failure.is_none() {
                    failure = Some(err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(interval),
        }
        report(handle.drain_frame_count());
    }

    // The callback's last batch can land after the final drain above.
    let remaining = handle.drain_frame_count();
    if remaining > 0 {
        report(remaining);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn forward_stream_error(errors: &Sender<TunerError>, err: cpal::StreamError) {
    // A full queue already holds an error the monitor will act on.
    let _ = errors.try_send(TunerError::from(err));
}

/// Finds a supported f32 configuration for the requested channel count
/// whose sample rate range contains the requested rate.
///
/// Ranges that accept `frames_per_buffer` as a fixed buffer size are
/// preferred.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    config: &CaptureConfig,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            c.channels() == config.channel_count
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate().0 <= config.sample_rate
                && config.sample_rate <= c.max_sample_rate().0
        })
        .min_by_key(|c| !accepts_buffer_size(c, config.frames_per_buffer))
}

fn accepts_buffer_size(range: &SupportedStreamConfigRange, frames: u32) -> bool {
    match range.buffer_size() {
        SupportedBufferSize::Range { min, max } => (*min..=*max).contains(&frames),
        SupportedBufferSize::Unknown => true,
    }
}

fn buffer_size_for(range: &SupportedStreamConfigRange, frames: u32) -> cpal::BufferSize {
    if accepts_buffer_size(range, frames) {
        cpal::BufferSize::Fixed(frames)
    } else {
        warn!(
            "Device does not accept {frames} frames per buffer ({:?}), using its default",
            range.buffer_size()
        );
        cpal::BufferSize::Default
    }
}
