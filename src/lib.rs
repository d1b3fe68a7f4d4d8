//! WAV playback, recording and mixer volume over a native PCM API

pub mod audio;
pub mod error;
pub mod settings;
pub mod sound;

pub use audio::{AudioSubsystem, StreamDirection, VolumeKind, WavHeader};
pub use error::{Result, SoundError};
pub use settings::ConnectionSettings;
pub use sound::{Completion, SoundDevice, UnixSoundDevice, WavSink, WavSource};
