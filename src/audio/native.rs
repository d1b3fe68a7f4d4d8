//! Native audio subsystem capability
//!
//! The engine never talks to ALSA directly. Everything it needs from the
//! sound system is expressed by [`AudioSubsystem`]: a handle-based set of
//! primitives where every call either succeeds or returns the negative status
//! code the subsystem produced. Messages are looked up separately through
//! [`AudioSubsystem::strerror`].

use std::fmt;

/// Raw result of a native call: `Err` holds the negative status code
pub type Status<T> = std::result::Result<T, i32>;

/// A native status code paired with the subsystem's description of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a backend-defined identifier
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn as_raw(self) -> u64 {
                self.0
            }
        }
    };
}

opaque_handle!(
    /// An open PCM stream
    PcmHandle
);
opaque_handle!(
    /// A hardware parameter object, valid for one session
    HwParamsHandle
);
opaque_handle!(
    /// An open mixer session
    MixerHandle
);

/// A mixer element, only usable while its mixer is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MixerElement {
    mixer: MixerHandle,
    raw: u64,
}

impl MixerElement {
    pub fn new(mixer: MixerHandle, raw: u64) -> Self {
        Self { mixer, raw }
    }

    pub fn mixer(self) -> MixerHandle {
        self.mixer
    }

    pub fn as_raw(self) -> u64 {
        self.raw
    }
}

/// Direction of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    Playback,
    Capture,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamDirection::Playback => "playback",
            StreamDirection::Capture => "capture",
        })
    }
}

/// Sample formats the engine can negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    S16Le,
    S24Le,
}

/// PCM access modes; only interleaved read/write is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    RwInterleaved,
}

/// Mixer channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerChannel {
    FrontLeft,
    FrontRight,
}

/// Rate actually chosen by the device and the direction it was rounded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateNear {
    pub rate: u32,
    pub direction: i32,
}

/// Period size in frames and the rounding direction reported with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSize {
    pub frames: u64,
    pub direction: i32,
}

/// Primitive operations of a handle-based native audio API
///
/// Implementations must be safe to call from several threads at once: the
/// playback, capture and mixer handles of one device are driven independently.
/// Calls on a handle that was already closed must fail with a negative status
/// rather than touch freed resources.
pub trait AudioSubsystem: Send + Sync {
    fn pcm_open(&self, device: &str, direction: StreamDirection) -> Status<PcmHandle>;
    fn pcm_start(&self, pcm: PcmHandle) -> Status<()>;
    fn pcm_pause(&self, pcm: PcmHandle, enable: bool) -> Status<()>;
    /// Wake a stream suspended by power management
    fn pcm_resume(&self, pcm: PcmHandle) -> Status<()>;
    /// Bring a stream back from an xrun or suspend reported as `code`
    fn pcm_recover(&self, pcm: PcmHandle, code: i32, silent: bool) -> Status<()>;
    fn pcm_drain(&self, pcm: PcmHandle) -> Status<()>;
    fn pcm_drop(&self, pcm: PcmHandle) -> Status<()>;
    fn pcm_close(&self, pcm: PcmHandle) -> Status<()>;

    /// Write `frames` interleaved frames from `buf`; returns frames written
    fn pcm_write(&self, pcm: PcmHandle, buf: &[u8], frames: u64) -> Status<u64>;
    /// Read up to `frames` interleaved frames into `buf`; returns frames read
    fn pcm_read(&self, pcm: PcmHandle, buf: &mut [u8], frames: u64) -> Status<u64>;

    fn hw_params_alloc(&self) -> Status<HwParamsHandle>;
    fn hw_params_free(&self, params: HwParamsHandle);
    fn hw_params_any(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()>;
    fn hw_params_set_access(&self, pcm: PcmHandle, params: HwParamsHandle, access: Access)
        -> Status<()>;
    fn hw_params_set_format(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        format: SampleFormat,
    ) -> Status<()>;
    fn hw_params_set_channels(&self, pcm: PcmHandle, params: HwParamsHandle, channels: u32)
        -> Status<()>;
    fn hw_params_set_rate_near(&self, pcm: PcmHandle, params: HwParamsHandle, rate: u32)
        -> Status<RateNear>;
    /// Install the parameter object on the handle
    fn hw_params_commit(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()>;
    fn hw_params_period_size(&self, params: HwParamsHandle) -> Status<PeriodSize>;

    fn mixer_open(&self) -> Status<MixerHandle>;
    fn mixer_attach(&self, mixer: MixerHandle, device: &str) -> Status<()>;
    fn mixer_register(&self, mixer: MixerHandle) -> Status<()>;
    fn mixer_load(&self, mixer: MixerHandle) -> Status<()>;
    fn mixer_first_element(&self, mixer: MixerHandle) -> Status<MixerElement>;
    fn mixer_get_playback_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64>;
    fn mixer_set_playback_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()>;
    fn mixer_get_capture_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64>;
    fn mixer_set_capture_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()>;
    fn mixer_close(&self, mixer: MixerHandle) -> Status<()>;

    /// Human-readable description of a status code
    fn strerror(&self, code: i32) -> String;

    /// Pair a status code with its description
    fn native_error(&self, code: i32) -> NativeError {
        NativeError::new(code, self.strerror(code))
    }
}
