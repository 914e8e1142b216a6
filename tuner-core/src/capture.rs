//! # Capture Module
//!
//! Lock-free storage for a live input stream. The real-time audio callback
//! owns an [`AudioCapture`] and writes every delivered frame into a fixed
//! ring buffer. Other threads observe the capture through a
//! [`CaptureHandle`]: a monitor drains the frame counter, a signal handler
//! requests termination.
//!
//! ## Real-time constraints
//! [`AudioCapture::on_frames_delivered`] never allocates, locks or logs. All
//! state shared with other threads is a handful of atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{TunerError, TunerResult};

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of frames the audio subsystem delivers per callback.
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 512;

/// Default retention window of the ring buffer in seconds.
pub const DEFAULT_CAPTURE_SECONDS: u32 = 2;

/// Largest ring buffer accepted, in interleaved samples (1 GiB of f32).
pub const MAX_CAPTURE_SAMPLES: u64 = 1 << 28;

/// Capture parameters. These fix the ring buffer capacity at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Callback batch size requested from the audio subsystem.
    pub frames_per_buffer: u32,
    /// Interleaved channels per frame, 1 or 2.
    pub channel_count: u16,
    /// Seconds of audio kept in the ring buffer.
    pub capture_seconds: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            channel_count: 1,
            capture_seconds: DEFAULT_CAPTURE_SECONDS,
        }
    }
}

impl CaptureConfig {
    /// Checks that the configuration describes a usable ring buffer.
    pub fn validate(&self) -> TunerResult<()> {
        if self.sample_rate == 0 {
            return Err(TunerError::invalid_argument("sample_rate", "must be non-zero"));
        }
        if self.frames_per_buffer == 0 {
            return Err(TunerError::invalid_argument(
                "frames_per_buffer",
                "must be non-zero",
            ));
        }
        if !(1..=2).contains(&self.channel_count) {
            return Err(TunerError::invalid_argument(
                "channel_count",
                format!("must be 1 or 2, got {}", self.channel_count),
            ));
        }
        if self.capture_seconds == 0 {
            return Err(TunerError::invalid_argument(
                "capture_seconds",
                "must be non-zero",
            ));
        }
        match self.checked_capacity_samples() {
            Some(samples) if samples <= MAX_CAPTURE_SAMPLES => Ok(()),
            _ => Err(TunerError::invalid_argument(
                "capture_seconds",
                format!(
                    "{} s of {} channel(s) at {} Hz exceeds {MAX_CAPTURE_SAMPLES} samples",
                    self.capture_seconds, self.channel_count, self.sample_rate
                ),
            )),
        }
    }

    fn checked_capacity_samples(&self) -> Option<u64> {
        u64::from(self.sample_rate)
            .checked_mul(u64::from(self.capture_seconds))?
            .checked_mul(u64::from(self.channel_count))
    }

    /// Ring buffer capacity in frames. Saturates for configurations that
    /// fail [`validate`](Self::validate).
    pub fn capacity_frames(&self) -> usize {
        (self.sample_rate as usize).saturating_mul(self.capture_seconds as usize)
    }

    /// Ring buffer capacity in interleaved samples.
    pub fn capacity_samples(&self) -> usize {
        self.capacity_frames()
            .saturating_mul(self.channel_count as usize)
    }
}

/// What the audio subsystem should do after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// Lifecycle of a capture stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Capture exists, the stream has not started.
    Created = 0,
    /// The stream is delivering frames.
    Running = 1,
    /// Termination requested, the callback may still deliver in-flight frames.
    Stopping = 2,
    /// The stream is closed.
    Stopped = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Fixed-capacity circular buffer of interleaved samples.
///
/// The write cursor counts frames and wraps modulo the capacity; the oldest
/// frames are overwritten first.
#[derive(Debug)]
pub struct CaptureBuffer {
    samples: Vec<f32>,
    channels: usize,
    capacity_frames: usize,
    write_cursor: usize,
}

impl CaptureBuffer {
    /// Allocates a zeroed buffer holding `capacity_frames` frames.
    pub(crate) fn new(capacity_frames: usize, channels: usize) -> Self {
        Self {
            samples: vec![0.0; capacity_frames * channels],
            channels,
            capacity_frames,
            write_cursor: 0,
        }
    }

    /// Copies up to `frame_count` interleaved frames from `frames` into the
    /// buffer and advances the cursor. Returns the number of frames taken,
    /// which is smaller than `frame_count` only when `frames` is too short.
    pub(crate) fn write(&mut self, frames: &[f32], frame_count: usize) -> usize {
        let channels = self.channels;
        let delivered = frame_count.min(frames.len() / channels);
        if delivered == 0 || self.capacity_frames == 0 {
            return delivered;
        }

        // Frames that would be overwritten within this same call are skipped.
        let skipped = delivered.saturating_sub(self.capacity_frames);
        for frame in skipped..delivered {
            let slot = (self.write_cursor + frame) % self.capacity_frames;
            let dst = slot * channels;
            let src = frame * channels;
            for channel in 0..channels {
                self.samples[dst + channel] = frames[src + channel];
            }
        }

        self.write_cursor = (self.write_cursor + delivered) % self.capacity_frames;
        delivered
    }

    /// Frame index the next write starts at.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Interleaved samples of the frame stored at `index`.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        if index >= self.capacity_frames {
            return None;
        }
        let start = index * self.channels;
        Some(&self.samples[start..start + self.channels])
    }

    /// Samples of one channel in slot order.
    pub fn channel_samples(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let skip = if channel < self.channels { channel } else { self.samples.len() };
        self.samples.iter().skip(skip).step_by(self.channels).copied()
    }
}

#[derive(Debug)]
struct SharedState {
    frames: AtomicU64,
    terminate: AtomicBool,
    finished: AtomicBool,
    state: AtomicU8,
}

/// Thread-safe view of a capture for the monitor loop and signal handlers.
///
/// Every method is a plain atomic operation, so it is safe to call from any
/// thread, including while the callback is running.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    shared: Arc<SharedState>,
}

impl CaptureHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(SharedState {
                frames: AtomicU64::new(0),
                terminate: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                state: AtomicU8::new(CaptureState::Created as u8),
            }),
        }
    }

    /// Returns the frames counted since the previous drain and resets the
    /// counter to zero in one atomic step.
    pub fn drain_frame_count(&self) -> u64 {
        self.shared.frames.swap(0, Ordering::AcqRel)
    }

    /// Asks the callback to stop on its next invocation. Idempotent.
    pub fn request_termination(&self) {
        self.shared.terminate.store(true, Ordering::Release);
        self.transition(CaptureState::Running, CaptureState::Stopping);
    }

    pub fn is_termination_requested(&self) -> bool {
        self.shared.terminate.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// True while the stream runs and the callback has not yet returned
    /// [`StreamControl::Stop`].
    pub fn is_active(&self) -> bool {
        matches!(self.state(), CaptureState::Running | CaptureState::Stopping)
            && !self.shared.finished.load(Ordering::Acquire)
    }

    /// Records that the stream started. Returns false unless the capture
    /// was still in [`CaptureState::Created`].
    pub fn mark_running(&self) -> bool {
        if !self.transition(CaptureState::Created, CaptureState::Running) {
            return false;
        }
        // A termination request that raced the start still counts.
        if self.is_termination_requested() {
            self.transition(CaptureState::Running, CaptureState::Stopping);
        }
        true
    }

    /// Records that the stream has been closed.
    pub fn mark_stopped(&self) {
        self.shared.finished.store(true, Ordering::Release);
        self.shared
            .state
            .store(CaptureState::Stopped as u8, Ordering::Release);
    }

    /// Stops the capture after a stream failure. The callback will not be
    /// trusted to observe the termination flag.
    pub fn abort(&self) {
        self.request_termination();
        self.shared.finished.store(true, Ordering::Release);
    }

    fn transition(&self, from: CaptureState, to: CaptureState) -> bool {
        self.shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Callback-side owner of the ring buffer.
#[derive(Debug)]
pub struct AudioCapture {
    config: CaptureConfig,
    buffer: CaptureBuffer,
    handle: CaptureHandle,
}

impl AudioCapture {
    /// Validates `config` and allocates the ring buffer.
    pub fn new(config: CaptureConfig) -> TunerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buffer: CaptureBuffer::new(config.capacity_frames(), config.channel_count as usize),
            handle: CaptureHandle::new(),
        })
    }

    /// A new handle sharing this capture's counter and termination flag.
    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    /// Stores one batch of interleaved frames from the audio subsystem.
    ///
    /// Runs on the real-time thread: no allocation, no locks. Frames
    /// arriving after a [`StreamControl::Stop`] has been returned are
    /// ignored.
    pub fn on_frames_delivered(&mut self, frames: &[f32], frame_count: usize) -> StreamControl {
        let shared = &self.handle.shared;
        if shared.finished.load(Ordering::Acquire) {
            return StreamControl::Stop;
        }

        let delivered = self.buffer.write(frames, frame_count);
        shared.frames.fetch_add(delivered as u64, Ordering::AcqRel);

        if shared.terminate.load(Ordering::Acquire) {
            shared.finished.store(true, Ordering::Release);
            StreamControl::Stop
        } else {
            StreamControl::Continue
        }
    }

    /// See [`CaptureHandle::drain_frame_count`].
    pub fn drain_frame_count(&self) -> u64 {
        self.handle.drain_frame_count()
    }

    /// See [`CaptureHandle::request_termination`].
    pub fn request_termination(&self) {
        self.handle.request_termination();
    }
}
