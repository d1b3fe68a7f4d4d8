//! WAV recording
//!
//! Captures a fixed duration from the recording handle into a WAV destination.
//! The header is synthesized from the connection settings before any audio
//! arrives, so its data size describes the requested duration.

use std::io::{Seek, Write};

use log::{info, trace, warn};
use tokio_util::sync::CancellationToken;

use crate::audio::device::{with_cleanup, DeviceHandles};
use crate::audio::hw_params;
use crate::audio::native::{PcmHandle, StreamDirection};
use crate::audio::wav::{self, WavHeader};
use crate::error::{ControlAction, Result, SoundError};

/// Record `seconds` seconds into `destination`, returning the payload bytes written
pub fn record_stream<W: Write + Seek + ?Sized>(
    devices: &DeviceHandles,
    destination: &mut W,
    seconds: u32,
) -> Result<u64> {
    record_stream_cancellable(devices, destination, seconds, &CancellationToken::new())
        .map(Option::unwrap_or_default)
}

/// Like [`record_stream`], but returns `None` without capturing anything when
/// `token` is cancelled before the device is open
///
/// The header has already been written to `destination` by then.
pub fn record_stream_cancellable<W: Write + Seek + ?Sized>(
    devices: &DeviceHandles,
    destination: &mut W,
    seconds: u32,
    token: &CancellationToken,
) -> Result<Option<u64>> {
    let settings = devices.settings();
    let header = WavHeader::for_recording(
        settings.recording_sample_rate,
        settings.recording_channels,
        settings.recording_bits_per_sample,
        seconds,
    )?;
    hw_params::frame_format(&header)?;
    wav::write_header(destination, &header)?;
    info!(
        "Recording {}s at {} Hz, {} channel(s), {}-bit",
        seconds, header.sample_rate, header.num_channels, header.bits_per_sample
    );

    let Some(pcm) = devices.open_session(StreamDirection::Capture, token)? else {
        return Ok(None);
    };
    let result = read_payload(devices, pcm, &header, destination);
    let result = with_cleanup(result, devices.close_session(StreamDirection::Capture, pcm));

    if let Ok(bytes) = result {
        info!("Recording finished after {} bytes", bytes);
    }
    result.map(Some)
}

fn read_payload<W: Write + Seek + ?Sized>(
    devices: &DeviceHandles,
    pcm: PcmHandle,
    header: &WavHeader,
    destination: &mut W,
) -> Result<u64> {
    let subsystem = devices.subsystem();
    let buffer_len = {
        let params = hw_params::configure(subsystem, pcm, header)?;
        params.transfer_bytes(header.block_align)?
    };
    subsystem
        .pcm_start(pcm)
        .map_err(|code| SoundError::DeviceControl {
            action: ControlAction::Start,
            native: subsystem.native_error(code),
        })?;

    let block_align = u64::from(header.block_align);
    let frames_per_read = buffer_len as u64 / block_align;
    let total = u64::from(header.subchunk2_size);
    let reads = total.div_ceil(buffer_len as u64);

    let mut buffer = vec![0u8; buffer_len];
    let mut remaining = total;
    for _ in 0..reads {
        let frames = subsystem
            .pcm_read(pcm, &mut buffer, frames_per_read)
            .map_err(|code| SoundError::DeviceRead {
                native: subsystem.native_error(code),
            })?;
        // a device may report more frames than were requested
        let bytes = (frames.min(frames_per_read) * block_align).min(remaining);
        destination
            .write_all(&buffer[..bytes as usize])
            .and_then(|()| destination.flush())
            .map_err(SoundError::Stream)?;
        remaining -= bytes;
        trace!("Captured {} frames", frames);
    }
    if remaining > 0 {
        warn!(
            "Short reads from device: captured {} of the {} bytes the header declares",
            total - remaining,
            total
        );
    }
    Ok(total - remaining)
}
