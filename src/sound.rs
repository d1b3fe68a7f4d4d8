//! Sound device facade
//!
//! [`SoundDevice`] is the capability callers program against: volume
//! control, blocking play/record, and cancellable async variants.
//! [`UnixSoundDevice`] implements it on top of any [`AudioSubsystem`].
//!
//! The async variants run the blocking engine on tokio's blocking pool. A
//! cancellation is noticed at the await in the caller's task: the relevant
//! handle is force-closed and the call returns [`Completion::Cancelled`]. A
//! native call already in progress on the worker is not interrupted; it fails
//! once the handle is gone and the worker exits.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::device::DeviceHandles;
use crate::audio::mixer::{self, VolumeKind};
use crate::audio::native::{AudioSubsystem, StreamDirection};
use crate::audio::{playback, recorder};
use crate::error::{ControlAction, Result, SoundError};
use crate::settings::ConnectionSettings;

const ESTRPIPE: i32 = -86;

/// A seekable WAV input
pub trait WavSource: Read + Seek + Send {}
impl<T: Read + Seek + Send> WavSource for T {}

/// A seekable WAV output
pub trait WavSink: Write + Seek + Send {}
impl<T: Write + Seek + Send> WavSink for T {}

/// How an async operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Cancelled,
}

/// Playback, recording and volume control on one sound device
#[async_trait]
pub trait SoundDevice: Send + Sync {
    fn settings(&self) -> &ConnectionSettings;

    fn playback_volume(&self) -> Result<i64>;
    fn set_playback_volume(&self, volume: i64) -> Result<()>;
    fn recording_volume(&self) -> Result<i64>;
    fn set_recording_volume(&self, volume: i64) -> Result<()>;

    /// Pause the playback stream; a no-op when nothing is playing
    fn pause_playback(&self) -> Result<()>;
    fn resume_playback(&self) -> Result<()>;

    /// Play a WAV stream to completion
    fn play(&self, source: &mut dyn WavSource) -> Result<()>;
    /// Record `seconds` seconds into a WAV stream
    fn record(&self, seconds: u32, destination: &mut dyn WavSink) -> Result<()>;

    async fn play_async(
        &self,
        source: Box<dyn WavSource>,
        token: CancellationToken,
    ) -> Result<Completion>;

    async fn record_async(
        &self,
        seconds: u32,
        destination: Box<dyn WavSink>,
        token: CancellationToken,
    ) -> Result<Completion>;

    async fn play_file_async(&self, path: &Path, token: CancellationToken) -> Result<Completion> {
        let file = File::open(path).map_err(SoundError::Stream)?;
        self.play_async(Box::new(BufReader::new(file)), token).await
    }

    async fn record_file_async(
        &self,
        seconds: u32,
        path: &Path,
        token: CancellationToken,
    ) -> Result<Completion> {
        let file = File::create(path).map_err(SoundError::Stream)?;
        self.record_async(seconds, Box::new(BufWriter::new(file)), token)
            .await
    }
}

/// A sound device on a POSIX-style, handle-based audio subsystem
///
/// Clones share the same handles.
#[derive(Clone)]
pub struct UnixSoundDevice {
    devices: Arc<DeviceHandles>,
}

impl UnixSoundDevice {
    /// Device backed by the system ALSA library
    #[cfg(feature = "alsa")]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_subsystem(Arc::new(crate::audio::alsa::AlsaSubsystem::new()), settings)
    }

    pub fn with_subsystem(
        subsystem: Arc<dyn AudioSubsystem>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            devices: Arc::new(DeviceHandles::new(subsystem, settings)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.devices.is_open(StreamDirection::Playback)
    }

    pub fn is_recording(&self) -> bool {
        self.devices.is_open(StreamDirection::Capture)
    }

    /// Bring the `direction` stream back after an xrun or suspend reported as `code`
    ///
    /// A no-op when that stream is not open.
    pub fn recover(&self, direction: StreamDirection, code: i32) -> Result<()> {
        let Some(pcm) = self.devices.pcm(direction) else {
            return Ok(());
        };
        let subsystem = self.devices.subsystem();
        subsystem
            .pcm_recover(pcm, code, true)
            .map_err(|code| control_error(subsystem, ControlAction::Recover, code))
    }

    fn pause(&self) -> Result<()> {
        let Some(pcm) = self.devices.pcm(StreamDirection::Playback) else {
            return Ok(());
        };
        let subsystem = self.devices.subsystem();
        subsystem
            .pcm_pause(pcm, true)
            .map_err(|code| control_error(subsystem, ControlAction::Pause, code))
    }

    fn resume(&self) -> Result<()> {
        let Some(pcm) = self.devices.pcm(StreamDirection::Playback) else {
            return Ok(());
        };
        let subsystem = self.devices.subsystem();
        let resumed = match subsystem.pcm_pause(pcm, false) {
            // a suspended stream has to be woken instead of unpaused
            Err(ESTRPIPE) => subsystem.pcm_resume(pcm),
            other => other,
        };
        resumed.map_err(|code| control_error(subsystem, ControlAction::Resume, code))
    }
}

fn control_error(subsystem: &dyn AudioSubsystem, action: ControlAction, code: i32) -> SoundError {
    SoundError::DeviceControl {
        action,
        native: subsystem.native_error(code),
    }
}

/// Await a dispatched engine task, force-closing `direction` on cancellation
///
/// The task yields `None` when it noticed the cancellation itself before the
/// device was open.
async fn run_cancellable(
    devices: &DeviceHandles,
    direction: StreamDirection,
    task: JoinHandle<Result<Option<u64>>>,
    token: CancellationToken,
) -> Result<Completion> {
    tokio::select! {
        biased;
        joined = task => match joined {
            Ok(Ok(Some(_))) => Ok(Completion::Finished),
            Ok(Ok(None)) => Ok(Completion::Cancelled),
            Ok(Err(err)) => Err(err),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(Completion::Cancelled),
        },
        _ = token.cancelled() => {
            debug!("Cancelled; force-closing {} device", direction);
            if let Err(err) = devices.close_pcm(direction) {
                warn!("{}", err);
            }
            Ok(Completion::Cancelled)
        }
    }
}

#[async_trait]
impl SoundDevice for UnixSoundDevice {
    fn settings(&self) -> &ConnectionSettings {
        self.devices.settings()
    }

    fn playback_volume(&self) -> Result<i64> {
        mixer::get_volume(&self.devices, VolumeKind::Playback)
    }

    fn set_playback_volume(&self, volume: i64) -> Result<()> {
        mixer::set_volume(&self.devices, VolumeKind::Playback, volume)
    }

    fn recording_volume(&self) -> Result<i64> {
        mixer::get_volume(&self.devices, VolumeKind::Capture)
    }

    fn set_recording_volume(&self, volume: i64) -> Result<()> {
        mixer::set_volume(&self.devices, VolumeKind::Capture, volume)
    }

    fn pause_playback(&self) -> Result<()> {
        self.pause()
    }

    fn resume_playback(&self) -> Result<()> {
        self.resume()
    }

    fn play(&self, source: &mut dyn WavSource) -> Result<()> {
        playback::play_stream(&self.devices, source).map(|_| ())
    }

    fn record(&self, seconds: u32, destination: &mut dyn WavSink) -> Result<()> {
        recorder::record_stream(&self.devices, destination, seconds).map(|_| ())
    }

    async fn play_async(
        &self,
        mut source: Box<dyn WavSource>,
        token: CancellationToken,
    ) -> Result<Completion> {
        if token.is_cancelled() {
            return Ok(Completion::Cancelled);
        }
        let devices = self.devices.clone();
        let dispatched = token.clone();
        let task = tokio::task::spawn_blocking(move || {
            playback::play_stream_cancellable(&devices, source.as_mut(), &dispatched)
        });
        run_cancellable(&self.devices, StreamDirection::Playback, task, token).await
    }

    async fn record_async(
        &self,
        seconds: u32,
        mut destination: Box<dyn WavSink>,
        token: CancellationToken,
    ) -> Result<Completion> {
        if token.is_cancelled() {
            return Ok(Completion::Cancelled);
        }
        let devices = self.devices.clone();
        let dispatched = token.clone();
        let task = tokio::task::spawn_blocking(move || {
            let destination = destination.as_mut();
            recorder::record_stream_cancellable(&devices, destination, seconds, &dispatched)
        });
        run_cancellable(&self.devices, StreamDirection::Capture, task, token).await
    }
}
