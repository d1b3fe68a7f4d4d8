//! WAV playback
//!
//! Streams the payload of a WAV source to the playback handle one period at a
//! time. The handle is drained after the last write and always closed.

use std::io::{self, Read, Seek, SeekFrom};

use log::{info, trace, warn};
use tokio_util::sync::CancellationToken;

use crate::audio::device::{with_cleanup, DeviceHandles};
use crate::audio::hw_params;
use crate::audio::native::{PcmHandle, StreamDirection};
use crate::audio::wav::{self, WavHeader, HEADER_LEN};
use crate::error::{Result, SoundError};

const EIO: i32 = -5;

/// Play the WAV data in `source`, returning the number of frames written
///
/// The header is parsed and its sample format checked before the device is
/// opened, so a malformed or unsupported file never touches the hardware.
pub fn play_stream<R: Read + Seek + ?Sized>(
    devices: &DeviceHandles,
    source: &mut R,
) -> Result<u64> {
    play_stream_cancellable(devices, source, &CancellationToken::new())
        .map(Option::unwrap_or_default)
}

/// Like [`play_stream`], but returns `None` without streaming anything when
/// `token` is cancelled before the device is open
pub fn play_stream_cancellable<R: Read + Seek + ?Sized>(
    devices: &DeviceHandles,
    source: &mut R,
    token: &CancellationToken,
) -> Result<Option<u64>> {
    let header = wav::parse_header(source)?;
    hw_params::frame_format(&header)?;
    info!(
        "Playing {} Hz, {} channel(s), {}-bit ({:.1}s)",
        header.sample_rate,
        header.num_channels,
        header.bits_per_sample,
        header.duration_seconds()
    );

    let Some(pcm) = devices.open_session(StreamDirection::Playback, token)? else {
        return Ok(None);
    };
    let result = write_payload(devices, pcm, &header, source)
        .and_then(|frames| devices.drain(pcm).map(|()| frames));
    let result = with_cleanup(result, devices.close_session(StreamDirection::Playback, pcm));

    if let Ok(frames) = result {
        info!("Playback finished after {} frames", frames);
    }
    result.map(Some)
}

fn write_payload<R: Read + Seek + ?Sized>(
    devices: &DeviceHandles,
    pcm: PcmHandle,
    header: &WavHeader,
    source: &mut R,
) -> Result<u64> {
    let subsystem = devices.subsystem();
    let buffer_len = {
        let params = hw_params::configure(subsystem, pcm, header)?;
        params.transfer_bytes(header.block_align)?
    };
    let block_align = usize::from(header.block_align);

    source
        .seek(SeekFrom::Start(HEADER_LEN as u64))
        .map_err(SoundError::Stream)?;

    let mut buffer = vec![0u8; buffer_len];
    let mut total_frames = 0u64;
    loop {
        let read = read_full(source, &mut buffer).map_err(SoundError::Stream)?;
        if read == 0 {
            break;
        }

        let frames = read / block_align;
        if read % block_align != 0 {
            warn!(
                "Discarding {} trailing byte(s) that do not form a whole frame",
                read % block_align
            );
        }
        let data = &buffer[..frames * block_align];
        write_frames(devices, pcm, data, frames as u64, block_align)?;
        total_frames += frames as u64;
        trace!("Wrote {} frames", frames);

        // a short read means the source is exhausted
        if read < buffer.len() {
            break;
        }
    }
    Ok(total_frames)
}

/// Write all `frames` in `data`, continuing after partial writes
fn write_frames(
    devices: &DeviceHandles,
    pcm: PcmHandle,
    data: &[u8],
    frames: u64,
    block_align: usize,
) -> Result<()> {
    let subsystem = devices.subsystem();
    let mut done = 0u64;
    while done < frames {
        let offset = done as usize * block_align;
        let written = subsystem
            .pcm_write(pcm, &data[offset..], frames - done)
            .map_err(|code| SoundError::DeviceWrite {
                native: subsystem.native_error(code),
            })?;
        if written == 0 {
            return Err(SoundError::DeviceWrite {
                native: subsystem.native_error(EIO),
            });
        }
        done += written;
    }
    Ok(())
}

/// Fill `buf` from `source`, stopping early only at end of stream
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
