//! Error types for note conversion and audio capture.

use thiserror::Error;

/// Result type for tuner operations.
pub type TunerResult<T> = Result<T, TunerError>;

/// Errors that can occur while converting notes or capturing audio.
#[derive(Debug, Error)]
pub enum TunerError {
    /// A numeric input was outside the domain of the operation.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// The audio subsystem failed to open, start or keep running the stream.
    #[error("audio subsystem error: {message}")]
    AudioSubsystem {
        /// Error message.
        message: String,
    },
}

impl TunerError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates an audio subsystem error.
    pub fn audio(message: impl Into<String>) -> Self {
        Self::AudioSubsystem {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by invalid caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

macro_rules! impl_from_cpal {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for TunerError {
                fn from(err: $err) -> Self {
                    Self::audio(err.to_string())
                }
            }
        )*
    };
}

impl_from_cpal!(
    cpal::DeviceNameError,
    cpal::SupportedStreamConfigsError,
    cpal::BuildStreamError,
    cpal::PlayStreamError,
    cpal::PauseStreamError,
    cpal::StreamError,
);
