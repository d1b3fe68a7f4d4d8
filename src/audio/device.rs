//! Device handle lifecycle
//!
//! A [`DeviceHandles`] owns the playback, capture and mixer handles of one
//! sound device. Each handle lives in its own [`HandleSlot`] with its own lock,
//! so playback and recording can open and close independently. Opening is
//! guarded: racing callers perform a single native open. Closing always leaves
//! the slot empty, even when the native close reports an error.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::audio::native::{
    AudioSubsystem, MixerElement, MixerHandle, PcmHandle, StreamDirection,
};
use crate::error::{CloseStep, MixerStep, Result, SoundError};
use crate::settings::ConnectionSettings;

/// A lazily opened native handle
pub struct HandleSlot<H> {
    handle: Mutex<Option<H>>,
}

impl<H: Copy> HandleSlot<H> {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Current handle, if open
    pub fn get(&self) -> Option<H> {
        *self.handle.lock()
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Return the open handle, running `open` under the slot lock if there is none
    pub fn get_or_open(&self, open: impl FnOnce() -> Result<H>) -> Result<H> {
        let mut slot = self.handle.lock();
        if let Some(handle) = *slot {
            return Ok(handle);
        }
        let handle = open()?;
        *slot = Some(handle);
        Ok(handle)
    }

    /// Empty the slot, returning what it held
    pub fn take(&self) -> Option<H> {
        self.handle.lock().take()
    }
}

impl<H: Copy + PartialEq> HandleSlot<H> {
    /// Empty the slot only if it still holds `handle`
    pub fn take_matching(&self, handle: H) -> Option<H> {
        let mut slot = self.handle.lock();
        if *slot == Some(handle) {
            slot.take()
        } else {
            None
        }
    }
}

impl<H: Copy> Default for HandleSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// An attached and loaded mixer with its first element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerSession {
    pub mixer: MixerHandle,
    pub element: MixerElement,
}

/// Native handles of one sound device
pub struct DeviceHandles {
    subsystem: Arc<dyn AudioSubsystem>,
    settings: ConnectionSettings,
    playback: HandleSlot<PcmHandle>,
    capture: HandleSlot<PcmHandle>,
    mixer: HandleSlot<MixerSession>,
    mixer_calls: Mutex<()>,
}

impl DeviceHandles {
    pub fn new(subsystem: Arc<dyn AudioSubsystem>, settings: ConnectionSettings) -> Self {
        Self {
            subsystem,
            settings,
            playback: HandleSlot::new(),
            capture: HandleSlot::new(),
            mixer: HandleSlot::new(),
            mixer_calls: Mutex::new(()),
        }
    }

    pub fn subsystem(&self) -> &dyn AudioSubsystem {
        self.subsystem.as_ref()
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn slot(&self, direction: StreamDirection) -> &HandleSlot<PcmHandle> {
        match direction {
            StreamDirection::Playback => &self.playback,
            StreamDirection::Capture => &self.capture,
        }
    }

    fn device_name(&self, direction: StreamDirection) -> &str {
        match direction {
            StreamDirection::Playback => &self.settings.playback_device_name,
            StreamDirection::Capture => &self.settings.recording_device_name,
        }
    }

    /// Open handle for `direction`, if any
    pub fn pcm(&self, direction: StreamDirection) -> Option<PcmHandle> {
        self.slot(direction).get()
    }

    pub fn is_open(&self, direction: StreamDirection) -> bool {
        self.slot(direction).is_open()
    }

    /// Open the PCM handle for `direction` unless it is already open
    pub fn open_pcm(&self, direction: StreamDirection) -> Result<PcmHandle> {
        self.slot(direction).get_or_open(|| {
            let device = self.device_name(direction);
            let pcm = self
                .subsystem
                .pcm_open(device, direction)
                .map_err(|code| SoundError::DeviceOpen {
                    device: device.to_string(),
                    direction,
                    native: self.subsystem.native_error(code),
                })?;
            debug!("Opened {} device `{}`", direction, device);
            Ok(pcm)
        })
    }

    /// Open `direction` for a session that `token` can abandon
    ///
    /// Returns `None`, with the handle closed again, when the token was
    /// cancelled by the time the open completed. A cancellation after this
    /// check finds the handle in its slot and closes it there.
    pub fn open_session(
        &self,
        direction: StreamDirection,
        token: &CancellationToken,
    ) -> Result<Option<PcmHandle>> {
        if token.is_cancelled() {
            return Ok(None);
        }
        let pcm = self.open_pcm(direction)?;
        if token.is_cancelled() {
            debug!("Abandoning {} session cancelled during open", direction);
            self.close_session(direction, pcm)?;
            return Ok(None);
        }
        Ok(Some(pcm))
    }

    /// Block until frames queued on `pcm` have played
    pub fn drain(&self, pcm: PcmHandle) -> Result<()> {
        self.subsystem
            .pcm_drain(pcm)
            .map_err(|code| self.close_error(CloseStep::Drain, code))
    }

    /// Drop pending frames and close the handle for `direction`
    ///
    /// A no-op when nothing is open. Both native steps are attempted; the slot
    /// is empty afterwards whatever they return.
    pub fn close_pcm(&self, direction: StreamDirection) -> Result<()> {
        match self.slot(direction).take() {
            Some(pcm) => self.shutdown_pcm(direction, pcm),
            None => Ok(()),
        }
    }

    /// Close `pcm` if it is still the open handle for `direction`
    ///
    /// A session that was force-closed must not close a handle opened after it.
    pub fn close_session(&self, direction: StreamDirection, pcm: PcmHandle) -> Result<()> {
        match self.slot(direction).take_matching(pcm) {
            Some(pcm) => self.shutdown_pcm(direction, pcm),
            None => Ok(()),
        }
    }

    fn shutdown_pcm(&self, direction: StreamDirection, pcm: PcmHandle) -> Result<()> {
        let dropped = self.subsystem.pcm_drop(pcm);
        let closed = self.subsystem.pcm_close(pcm);
        debug!("Closed {} device", direction);

        match (dropped, closed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(code), Ok(())) => Err(self.close_error(CloseStep::Drop, code)),
            (Ok(()), Err(code)) => Err(self.close_error(CloseStep::Close, code)),
            (Err(drop_code), Err(close_code)) => {
                warn!(
                    "Close of {} device also failed: {}",
                    direction,
                    self.subsystem.native_error(close_code)
                );
                Err(self.close_error(CloseStep::Drop, drop_code))
            }
        }
    }

    fn close_error(&self, step: CloseStep, code: i32) -> SoundError {
        SoundError::DeviceClose {
            step,
            native: self.subsystem.native_error(code),
        }
    }

    fn mixer_error(&self, step: MixerStep, code: i32) -> SoundError {
        SoundError::Mixer {
            step,
            native: self.subsystem.native_error(code),
        }
    }

    pub fn is_mixer_open(&self) -> bool {
        self.mixer.is_open()
    }

    /// Serialize a whole mixer open/use/close sequence
    ///
    /// Volume calls share the one mixer handle, so a call holding this guard
    /// cannot have its mixer closed under it by another.
    pub fn lock_mixer(&self) -> MutexGuard<'_, ()> {
        self.mixer_calls.lock()
    }

    /// Open, attach and load the mixer unless it is already open
    ///
    /// A mixer that fails after being opened is closed again before the error
    /// is returned.
    pub fn open_mixer(&self) -> Result<MixerSession> {
        self.mixer.get_or_open(|| {
            let mixer = self
                .subsystem
                .mixer_open()
                .map_err(|code| self.mixer_error(MixerStep::Open, code))?;
            match self.load_mixer(mixer) {
                Ok(element) => {
                    debug!("Opened mixer `{}`", self.settings.mixer_device_name);
                    Ok(MixerSession { mixer, element })
                }
                Err(err) => {
                    if let Err(code) = self.subsystem.mixer_close(mixer) {
                        warn!(
                            "Failed to release mixer after setup error: {}",
                            self.subsystem.native_error(code)
                        );
                    }
                    Err(err)
                }
            }
        })
    }

    fn load_mixer(&self, mixer: MixerHandle) -> Result<MixerElement> {
        let subsystem = self.subsystem.as_ref();
        subsystem
            .mixer_attach(mixer, &self.settings.mixer_device_name)
            .map_err(|code| self.mixer_error(MixerStep::Attach, code))?;
        subsystem
            .mixer_register(mixer)
            .map_err(|code| self.mixer_error(MixerStep::Register, code))?;
        subsystem
            .mixer_load(mixer)
            .map_err(|code| self.mixer_error(MixerStep::Load, code))?;
        subsystem
            .mixer_first_element(mixer)
            .map_err(|code| self.mixer_error(MixerStep::FirstElement, code))
    }

    /// Close the mixer; a no-op when it is not open
    pub fn close_mixer(&self) -> Result<()> {
        let Some(session) = self.mixer.take() else {
            return Ok(());
        };
        self.subsystem
            .mixer_close(session.mixer)
            .map_err(|code| self.mixer_error(MixerStep::Close, code))
    }

    /// Close every open handle, logging failures
    pub fn close_all(&self) {
        for direction in [StreamDirection::Playback, StreamDirection::Capture] {
            if let Err(err) = self.close_pcm(direction) {
                warn!("{}", err);
            }
        }
        if let Err(err) = self.close_mixer() {
            warn!("{}", err);
        }
    }
}

impl Drop for DeviceHandles {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Combine an operation's result with the result of its cleanup
///
/// The operation's own error wins; a cleanup error is only returned when the
/// operation itself succeeded.
pub fn with_cleanup<T>(result: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (result, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!("Cleanup after failure also failed: {}", cleanup_err);
            Err(err)
        }
    }
}
