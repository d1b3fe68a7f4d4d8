//! Audio engine
//!
//! This module provides:
//! - The handle-based native capability ([`native::AudioSubsystem`])
//! - WAV header parsing and synthesis
//! - Hardware parameter negotiation
//! - Device handle ownership, playback, recording and mixer volume

pub mod device;
pub mod hw_params;
pub mod mixer;
pub mod native;
pub mod playback;
pub mod recorder;
pub mod wav;

#[cfg(feature = "alsa")]
pub mod alsa;

#[cfg(test)]
pub(crate) mod mock;

pub use device::DeviceHandles;
pub use mixer::VolumeKind;
pub use native::{AudioSubsystem, NativeError, StreamDirection};
pub use wav::WavHeader;
