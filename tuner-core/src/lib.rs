// tuner-core/src/lib.rs

//! The core logic for the pitch tuner.
//! This crate converts between frequencies and musical notes and keeps a
//! lock-free ring buffer of live input audio. It is completely headless
//! and contains no argument parsing or console output.

pub mod audio;
pub mod capture;
pub mod error;
pub mod tuning;

pub use capture::{AudioCapture, CaptureConfig, CaptureHandle, CaptureState, StreamControl};
pub use error::{TunerError, TunerResult};
pub use tuning::{DEFAULT_CONCERT_A, Note, NoteFrequency, frequency_to_note, note_to_frequency};
