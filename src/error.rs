//! Error types for the sound device engine
//!
//! Every failure of a native call carries the status code returned by the
//! audio subsystem and the message from its error-string lookup.

use std::fmt;

use thiserror::Error;

use crate::audio::native::{NativeError, StreamDirection};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SoundError>;

/// Hardware configuration step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    AllocateParameters,
    FillParameters,
    SetAccessMode,
    SetSampleFormat,
    SetChannels,
    SetRate,
    SetHardwareParameters,
    GetPeriodSize,
    /// Period size times frame width does not fit the transfer buffer
    BufferSize,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ConfigStep::AllocateParameters => "allocate parameters",
            ConfigStep::FillParameters => "fill parameters",
            ConfigStep::SetAccessMode => "set access mode",
            ConfigStep::SetSampleFormat => "set sample format",
            ConfigStep::SetChannels => "set channels",
            ConfigStep::SetRate => "set rate",
            ConfigStep::SetHardwareParameters => "set hardware parameters",
            ConfigStep::GetPeriodSize => "get period size",
            ConfigStep::BufferSize => "compute buffer size",
        };
        f.write_str(tag)
    }
}

/// Sub-step of closing a PCM handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStep {
    Drain,
    Drop,
    Close,
}

impl fmt::Display for CloseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseStep::Drain => "drain",
            CloseStep::Drop => "drop",
            CloseStep::Close => "close",
        })
    }
}

/// State change requested on an open PCM handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Recover,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlAction::Start => "start",
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Recover => "recover",
        })
    }
}

/// Mixer call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerStep {
    Open,
    Attach,
    Register,
    Load,
    FirstElement,
    GetVolume,
    SetVolume,
    Close,
}

impl fmt::Display for MixerStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MixerStep::Open => "open mixer",
            MixerStep::Attach => "attach mixer",
            MixerStep::Register => "register simple elements",
            MixerStep::Load => "load mixer",
            MixerStep::FirstElement => "first mixer element",
            MixerStep::GetVolume => "get volume",
            MixerStep::SetVolume => "set volume",
            MixerStep::Close => "close mixer",
        })
    }
}

/// Errors raised by the WAV codec, the device lifecycle and the streaming engine
#[derive(Debug, Error)]
pub enum SoundError {
    /// The 44-byte WAV header could not be read or written
    #[error("malformed WAV container: {0}")]
    MalformedContainer(#[source] std::io::Error),

    #[error("unsupported sample format: {bits_per_sample}-bit samples, {block_align}-byte frames")]
    UnsupportedSampleFormat { bits_per_sample: u16, block_align: u16 },

    #[error("failed to open {direction} device `{device}`: {native}")]
    DeviceOpen {
        device: String,
        direction: StreamDirection,
        native: NativeError,
    },

    #[error("failed to configure device ({step}): {native}")]
    DeviceConfig { step: ConfigStep, native: NativeError },

    #[error("failed to write frames to device: {native}")]
    DeviceWrite { native: NativeError },

    #[error("failed to read frames from device: {native}")]
    DeviceRead { native: NativeError },

    #[error("failed to close device ({step}): {native}")]
    DeviceClose { step: CloseStep, native: NativeError },

    #[error("failed to {action} device: {native}")]
    DeviceControl {
        action: ControlAction,
        native: NativeError,
    },

    #[error("mixer error ({step}): {native}")]
    Mixer { step: MixerStep, native: NativeError },

    /// I/O failure on the caller's source or destination while copying payload
    #[error("audio stream I/O error: {0}")]
    Stream(#[source] std::io::Error),
}

impl SoundError {
    /// Native status code carried by this error, if any
    pub fn native_code(&self) -> Option<i32> {
        match self {
            SoundError::DeviceOpen { native, .. }
            | SoundError::DeviceConfig { native, .. }
            | SoundError::DeviceWrite { native }
            | SoundError::DeviceRead { native }
            | SoundError::DeviceClose { native, .. }
            | SoundError::DeviceControl { native, .. }
            | SoundError::Mixer { native, .. } => Some(native.code),
            SoundError::MalformedContainer(_)
            | SoundError::UnsupportedSampleFormat { .. }
            | SoundError::Stream(_) => None,
        }
    }
}
