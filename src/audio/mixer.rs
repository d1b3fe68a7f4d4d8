//! Mixer volume control
//!
//! Volumes are read from and written to the front left and right channels of
//! the mixer's first element. Reads average the two channels; writes set both.
//! The mixer is closed after every call, and concurrent calls take turns.

use crate::audio::device::{with_cleanup, DeviceHandles};
use crate::audio::native::{MixerChannel, MixerElement};
use crate::error::{MixerStep, Result, SoundError};

const CHANNELS: [MixerChannel; 2] = [MixerChannel::FrontLeft, MixerChannel::FrontRight];

/// Which side of the mixer element a volume refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Playback,
    Capture,
}

/// Current volume, averaged over the left and right channels
pub fn get_volume(devices: &DeviceHandles, kind: VolumeKind) -> Result<i64> {
    let _guard = devices.lock_mixer();
    let session = devices.open_mixer()?;
    let result = read_channels(devices, session.element, kind);
    with_cleanup(result, devices.close_mixer())
}

/// Set both channels to `volume`
pub fn set_volume(devices: &DeviceHandles, kind: VolumeKind, volume: i64) -> Result<()> {
    let _guard = devices.lock_mixer();
    let session = devices.open_mixer()?;
    let result = write_channels(devices, session.element, kind, volume);
    with_cleanup(result, devices.close_mixer())
}

fn read_channels(devices: &DeviceHandles, element: MixerElement, kind: VolumeKind) -> Result<i64> {
    let subsystem = devices.subsystem();
    let mut sum = 0i128;
    for channel in CHANNELS {
        let value = match kind {
            VolumeKind::Playback => subsystem.mixer_get_playback_volume(element, channel),
            VolumeKind::Capture => subsystem.mixer_get_capture_volume(element, channel),
        }
        .map_err(|code| SoundError::Mixer {
            step: MixerStep::GetVolume,
            native: subsystem.native_error(code),
        })?;
        sum += i128::from(value);
    }
    // the mean of two i64 values always fits in an i64
    Ok((sum / CHANNELS.len() as i128) as i64)
}

fn write_channels(
    devices: &DeviceHandles,
    element: MixerElement,
    kind: VolumeKind,
    volume: i64,
) -> Result<()> {
    let subsystem = devices.subsystem();
    for channel in CHANNELS {
        let status = match kind {
            VolumeKind::Playback => subsystem.mixer_set_playback_volume(element, channel, volume),
            VolumeKind::Capture => subsystem.mixer_set_capture_volume(element, channel, volume),
        };
        status.map_err(|code| SoundError::Mixer {
            step: MixerStep::SetVolume,
            native: subsystem.native_error(code),
        })?;
    }
    Ok(())
}
