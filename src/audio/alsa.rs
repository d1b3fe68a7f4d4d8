//! ALSA backend
//!
//! Implements [`AudioSubsystem`] over libasound through `alsa-sys`. Native
//! objects live in registries keyed by handle id and are reference counted, so
//! a handle closed from one thread while another is blocked in `readi`/`writei`
//! is only released once that call returns. Unknown or closed ids fail with
//! `-EBADFD`.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_long, c_uint, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alsa_sys as ffi;
use parking_lot::Mutex;

use crate::audio::native::{
    Access, AudioSubsystem, HwParamsHandle, MixerChannel, MixerElement, MixerHandle, PcmHandle,
    PeriodSize, RateNear, SampleFormat, Status, StreamDirection,
};

const ENOENT: i32 = -2;
const EINVAL: i32 = -22;
const EBADFD: i32 = -77;

fn check(status: c_int) -> Status<()> {
    if status < 0 {
        Err(status)
    } else {
        Ok(())
    }
}

/// Owned libasound pointer, released with the destructor matching its type
trait NativeObject {
    type Raw;
    fn raw(&self) -> *mut Self::Raw;
    /// Release the object, returning the native status
    fn release(raw: *mut Self::Raw) -> c_int;
}

macro_rules! native_object {
    ($name:ident, $raw:ty, $release:path) => {
        struct $name(*mut $raw);

        // libasound objects may be used from any thread; the registry
        // serializes their release.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl NativeObject for $name {
            type Raw = $raw;

            fn raw(&self) -> *mut $raw {
                self.0
            }

            fn release(raw: *mut $raw) -> c_int {
                unsafe { $release(raw) }
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                Self::release(self.0);
            }
        }
    };
}

unsafe fn free_hw_params(raw: *mut ffi::snd_pcm_hw_params_t) -> c_int {
    unsafe { ffi::snd_pcm_hw_params_free(raw) };
    0
}

native_object!(Pcm, ffi::snd_pcm_t, ffi::snd_pcm_close);
native_object!(HwParams, ffi::snd_pcm_hw_params_t, free_hw_params);
native_object!(Mixer, ffi::snd_mixer_t, ffi::snd_mixer_close);

struct Registry<T> {
    entries: Mutex<HashMap<u64, Arc<T>>>,
}

impl<T: NativeObject> Registry<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, id: u64, object: T) {
        self.entries.lock().insert(id, Arc::new(object));
    }

    fn get(&self, id: u64) -> Status<Arc<T>> {
        self.entries.lock().get(&id).cloned().ok_or(EBADFD)
    }

    /// Unregister `id` and release it, or leave the release to the last user
    fn close(&self, id: u64) -> Status<()> {
        let object = self.entries.lock().remove(&id).ok_or(EBADFD)?;
        match Arc::try_unwrap(object) {
            Ok(object) => {
                let raw = object.raw();
                std::mem::forget(object);
                check(T::release(raw))
            }
            Err(_in_use) => Ok(()),
        }
    }
}

/// The system ALSA library
pub struct AlsaSubsystem {
    next_id: AtomicU64,
    pcms: Registry<Pcm>,
    params: Registry<HwParams>,
    mixers: Registry<Mixer>,
}

impl AlsaSubsystem {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pcms: Registry::new(),
            params: Registry::new(),
            mixers: Registry::new(),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn pcm(&self, pcm: PcmHandle) -> Status<Arc<Pcm>> {
        self.pcms.get(pcm.as_raw())
    }

    fn hw(&self, params: HwParamsHandle) -> Status<Arc<HwParams>> {
        self.params.get(params.as_raw())
    }

    /// The mixer owning `elem` (kept alive by the caller) and the element pointer
    fn element(&self, elem: MixerElement) -> Status<(Arc<Mixer>, *mut ffi::snd_mixer_elem_t)> {
        let mixer = self.mixers.get(elem.mixer().as_raw())?;
        Ok((mixer, elem.as_raw() as usize as *mut ffi::snd_mixer_elem_t))
    }

    /// Bytes `frames` frames occupy on `pcm`, rejecting buffers too small for them
    fn checked_frames(pcm: &Pcm, len: usize, frames: u64) -> Status<ffi::snd_pcm_uframes_t> {
        let frames_signed = frames as ffi::snd_pcm_sframes_t;
        let bytes = unsafe { ffi::snd_pcm_frames_to_bytes(pcm.raw(), frames_signed) };
        if bytes < 0 || bytes as usize > len {
            return Err(EINVAL);
        }
        Ok(frames as ffi::snd_pcm_uframes_t)
    }
}

impl Default for AlsaSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

fn channel_id(channel: MixerChannel) -> ffi::snd_mixer_selem_channel_id_t {
    match channel {
        MixerChannel::FrontLeft => ffi::SND_MIXER_SCHN_FRONT_LEFT,
        MixerChannel::FrontRight => ffi::SND_MIXER_SCHN_FRONT_RIGHT,
    }
}

fn frames_result(n: ffi::snd_pcm_sframes_t) -> Status<u64> {
    if n < 0 {
        Err(n as i32)
    } else {
        Ok(n as u64)
    }
}

impl AudioSubsystem for AlsaSubsystem {
    fn pcm_open(&self, device: &str, direction: StreamDirection) -> Status<PcmHandle> {
        let name = CString::new(device).map_err(|_| EINVAL)?;
        let stream = match direction {
            StreamDirection::Playback => ffi::SND_PCM_STREAM_PLAYBACK,
            StreamDirection::Capture => ffi::SND_PCM_STREAM_CAPTURE,
        };
        let mut raw = ptr::null_mut();
        check(unsafe { ffi::snd_pcm_open(&mut raw, name.as_ptr(), stream, 0) })?;
        let id = self.next_id();
        self.pcms.insert(id, Pcm(raw));
        Ok(PcmHandle::from_raw(id))
    }

    fn pcm_start(&self, pcm: PcmHandle) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_start(pcm.raw()) })
    }

    fn pcm_pause(&self, pcm: PcmHandle, enable: bool) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_pause(pcm.raw(), c_int::from(enable)) })
    }

    fn pcm_resume(&self, pcm: PcmHandle) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_resume(pcm.raw()) })
    }

    fn pcm_recover(&self, pcm: PcmHandle, code: i32, silent: bool) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_recover(pcm.raw(), code, c_int::from(silent)) })
    }

    fn pcm_drain(&self, pcm: PcmHandle) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_drain(pcm.raw()) })
    }

    fn pcm_drop(&self, pcm: PcmHandle) -> Status<()> {
        let pcm = self.pcm(pcm)?;
        check(unsafe { ffi::snd_pcm_drop(pcm.raw()) })
    }

    fn pcm_close(&self, pcm: PcmHandle) -> Status<()> {
        self.pcms.close(pcm.as_raw())
    }

    fn pcm_write(&self, pcm: PcmHandle, buf: &[u8], frames: u64) -> Status<u64> {
        let pcm = self.pcm(pcm)?;
        let frames = Self::checked_frames(&pcm, buf.len(), frames)?;
        let data = buf.as_ptr() as *const c_void;
        frames_result(unsafe { ffi::snd_pcm_writei(pcm.raw(), data, frames) })
    }

    fn pcm_read(&self, pcm: PcmHandle, buf: &mut [u8], frames: u64) -> Status<u64> {
        let pcm = self.pcm(pcm)?;
        let frames = Self::checked_frames(&pcm, buf.len(), frames)?;
        let data = buf.as_mut_ptr() as *mut c_void;
        frames_result(unsafe { ffi::snd_pcm_readi(pcm.raw(), data, frames) })
    }

    fn hw_params_alloc(&self) -> Status<HwParamsHandle> {
        let mut raw = ptr::null_mut();
        check(unsafe { ffi::snd_pcm_hw_params_malloc(&mut raw) })?;
        let id = self.next_id();
        self.params.insert(id, HwParams(raw));
        Ok(HwParamsHandle::from_raw(id))
    }

    fn hw_params_free(&self, params: HwParamsHandle) {
        let _ = self.params.close(params.as_raw());
    }

    fn hw_params_any(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        check(unsafe { ffi::snd_pcm_hw_params_any(pcm.raw(), params.raw()) })
    }

    fn hw_params_set_access(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        access: Access,
    ) -> Status<()> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        let access = match access {
            Access::RwInterleaved => ffi::SND_PCM_ACCESS_RW_INTERLEAVED,
        };
        check(unsafe { ffi::snd_pcm_hw_params_set_access(pcm.raw(), params.raw(), access) })
    }

    fn hw_params_set_format(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        format: SampleFormat,
    ) -> Status<()> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        let format = match format {
            SampleFormat::U8 => ffi::SND_PCM_FORMAT_U8,
            SampleFormat::S16Le => ffi::SND_PCM_FORMAT_S16_LE,
            SampleFormat::S24Le => ffi::SND_PCM_FORMAT_S24_LE,
        };
        check(unsafe { ffi::snd_pcm_hw_params_set_format(pcm.raw(), params.raw(), format) })
    }

    fn hw_params_set_channels(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        channels: u32,
    ) -> Status<()> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        check(unsafe {
            ffi::snd_pcm_hw_params_set_channels(pcm.raw(), params.raw(), channels as c_uint)
        })
    }

    fn hw_params_set_rate_near(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        rate: u32,
    ) -> Status<RateNear> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        let mut rate: c_uint = rate;
        let mut direction: c_int = 0;
        check(unsafe {
            ffi::snd_pcm_hw_params_set_rate_near(pcm.raw(), params.raw(), &mut rate, &mut direction)
        })?;
        Ok(RateNear { rate, direction })
    }

    fn hw_params_commit(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()> {
        let (pcm, params) = (self.pcm(pcm)?, self.hw(params)?);
        check(unsafe { ffi::snd_pcm_hw_params(pcm.raw(), params.raw()) })
    }

    fn hw_params_period_size(&self, params: HwParamsHandle) -> Status<PeriodSize> {
        let params = self.hw(params)?;
        let mut frames: ffi::snd_pcm_uframes_t = 0;
        let mut direction: c_int = 0;
        check(unsafe {
            ffi::snd_pcm_hw_params_get_period_size(params.raw(), &mut frames, &mut direction)
        })?;
        Ok(PeriodSize {
            frames: frames as u64,
            direction,
        })
    }

    fn mixer_open(&self) -> Status<MixerHandle> {
        let mut raw = ptr::null_mut();
        check(unsafe { ffi::snd_mixer_open(&mut raw, 0) })?;
        let id = self.next_id();
        self.mixers.insert(id, Mixer(raw));
        Ok(MixerHandle::from_raw(id))
    }

    fn mixer_attach(&self, mixer: MixerHandle, device: &str) -> Status<()> {
        let mixer = self.mixers.get(mixer.as_raw())?;
        let name = CString::new(device).map_err(|_| EINVAL)?;
        check(unsafe { ffi::snd_mixer_attach(mixer.raw(), name.as_ptr()) })
    }

    fn mixer_register(&self, mixer: MixerHandle) -> Status<()> {
        let mixer = self.mixers.get(mixer.as_raw())?;
        let registered =
            unsafe { ffi::snd_mixer_selem_register(mixer.raw(), ptr::null_mut(), ptr::null_mut()) };
        check(registered)
    }

    fn mixer_load(&self, mixer: MixerHandle) -> Status<()> {
        let mixer = self.mixers.get(mixer.as_raw())?;
        check(unsafe { ffi::snd_mixer_load(mixer.raw()) })
    }

    fn mixer_first_element(&self, handle: MixerHandle) -> Status<MixerElement> {
        let mixer = self.mixers.get(handle.as_raw())?;
        let elem = unsafe { ffi::snd_mixer_first_elem(mixer.raw()) };
        if elem.is_null() {
            return Err(ENOENT);
        }
        Ok(MixerElement::new(handle, elem as usize as u64))
    }

    fn mixer_get_playback_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64> {
        let (_mixer, raw) = self.element(elem)?;
        let mut value: c_long = 0;
        check(unsafe {
            ffi::snd_mixer_selem_get_playback_volume(raw, channel_id(channel), &mut value)
        })?;
        Ok(i64::from(value))
    }

    fn mixer_set_playback_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()> {
        let (_mixer, raw) = self.element(elem)?;
        let value = c_long::try_from(value).map_err(|_| EINVAL)?;
        check(unsafe { ffi::snd_mixer_selem_set_playback_volume(raw, channel_id(channel), value) })
    }

    fn mixer_get_capture_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64> {
        let (_mixer, raw) = self.element(elem)?;
        let mut value: c_long = 0;
        check(unsafe {
            ffi::snd_mixer_selem_get_capture_volume(raw, channel_id(channel), &mut value)
        })?;
        Ok(i64::from(value))
    }

    fn mixer_set_capture_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()> {
        let (_mixer, raw) = self.element(elem)?;
        let value = c_long::try_from(value).map_err(|_| EINVAL)?;
        check(unsafe { ffi::snd_mixer_selem_set_capture_volume(raw, channel_id(channel), value) })
    }

    fn mixer_close(&self, mixer: MixerHandle) -> Status<()> {
        self.mixers.close(mixer.as_raw())
    }

    fn strerror(&self, code: i32) -> String {
        let message = unsafe { ffi::snd_strerror(code) };
        if message.is_null() {
            return format!("unknown error {}", code);
        }
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}
