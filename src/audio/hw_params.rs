//! Hardware parameter negotiation
//!
//! Drives the parameter-object protocol for one session: allocate, fill with
//! the device's full configuration space, then narrow access, format, channels
//! and rate before committing the object to the PCM handle.

use log::debug;

use crate::audio::native::{
    Access, AudioSubsystem, HwParamsHandle, PcmHandle, PeriodSize, RateNear, SampleFormat,
};
use crate::audio::wav::WavHeader;
use crate::error::{ConfigStep, Result, SoundError};

const EINVAL: i32 = -22;
const EOVERFLOW: i32 = -75;

/// Map a header's sample width to a native sample format
///
/// Fails when the width is not 8, 16 or 24 bits, or when the header
/// describes frames of zero bytes.
pub fn frame_format(header: &WavHeader) -> Result<SampleFormat> {
    let unsupported = || SoundError::UnsupportedSampleFormat {
        bits_per_sample: header.bits_per_sample,
        block_align: header.block_align,
    };
    if header.block_align == 0 {
        return Err(unsupported());
    }
    match header.bits_per_sample / 8 {
        1 => Ok(SampleFormat::U8),
        2 => Ok(SampleFormat::S16Le),
        3 => Ok(SampleFormat::S24Le),
        _ => Err(unsupported()),
    }
}

/// A committed parameter object; freed when dropped
pub struct HwParams<'a> {
    subsystem: &'a dyn AudioSubsystem,
    handle: HwParamsHandle,
    /// Rate the device settled on
    pub rate: RateNear,
}

impl HwParams<'_> {
    /// Frames moved per read or write call
    pub fn period_size(&self) -> Result<PeriodSize> {
        let period = self
            .subsystem
            .hw_params_period_size(self.handle)
            .map_err(|code| config_error(self.subsystem, ConfigStep::GetPeriodSize, code))?;
        if period.frames == 0 {
            return Err(config_error(self.subsystem, ConfigStep::GetPeriodSize, EINVAL));
        }
        Ok(period)
    }

    /// Bytes in one period's worth of frames
    pub fn transfer_bytes(&self, block_align: u16) -> Result<usize> {
        let period = self.period_size()?;
        period
            .frames
            .checked_mul(u64::from(block_align))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| config_error(self.subsystem, ConfigStep::BufferSize, EOVERFLOW))
    }
}

impl Drop for HwParams<'_> {
    fn drop(&mut self) {
        self.subsystem.hw_params_free(self.handle);
    }
}

fn config_error(subsystem: &dyn AudioSubsystem, step: ConfigStep, code: i32) -> SoundError {
    SoundError::DeviceConfig {
        step,
        native: subsystem.native_error(code),
    }
}

/// Configure `pcm` for the layout described by `header`
pub fn configure<'a>(
    subsystem: &'a dyn AudioSubsystem,
    pcm: PcmHandle,
    header: &WavHeader,
) -> Result<HwParams<'a>> {
    let fail = move |step: ConfigStep| move |code: i32| config_error(subsystem, step, code);

    let handle = subsystem
        .hw_params_alloc()
        .map_err(fail(ConfigStep::AllocateParameters))?;
    // From here on the object is freed on every exit path.
    let mut params = HwParams {
        subsystem,
        handle,
        rate: RateNear {
            rate: header.sample_rate,
            direction: 0,
        },
    };

    subsystem
        .hw_params_any(pcm, handle)
        .map_err(fail(ConfigStep::FillParameters))?;
    subsystem
        .hw_params_set_access(pcm, handle, Access::RwInterleaved)
        .map_err(fail(ConfigStep::SetAccessMode))?;

    let format = frame_format(header)?;
    subsystem
        .hw_params_set_format(pcm, handle, format)
        .map_err(fail(ConfigStep::SetSampleFormat))?;
    subsystem
        .hw_params_set_channels(pcm, handle, u32::from(header.num_channels))
        .map_err(fail(ConfigStep::SetChannels))?;
    params.rate = subsystem
        .hw_params_set_rate_near(pcm, handle, header.sample_rate)
        .map_err(fail(ConfigStep::SetRate))?;
    subsystem
        .hw_params_commit(pcm, handle)
        .map_err(fail(ConfigStep::SetHardwareParameters))?;

    debug!(
        "Configured {:?} x{} at {} Hz (requested {} Hz, dir {})",
        format, header.num_channels, params.rate.rate, header.sample_rate, params.rate.direction
    );
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockSubsystem;
    use crate::audio::native::StreamDirection;

    fn header(bits: u16) -> WavHeader {
        WavHeader::for_recording(8000, 2, bits, 1).unwrap()
    }

    #[test]
    fn test_bits_per_sample_mapping() {
        assert_eq!(frame_format(&header(8)).unwrap(), SampleFormat::U8);
        assert_eq!(frame_format(&header(16)).unwrap(), SampleFormat::S16Le);
        assert_eq!(frame_format(&header(24)).unwrap(), SampleFormat::S24Le);
        assert!(matches!(
            frame_format(&header(32)),
            Err(SoundError::UnsupportedSampleFormat {
                bits_per_sample: 32,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_width_frames_are_unsupported() {
        let mut h = header(16);
        h.num_channels = 0;
        h.block_align = 0;
        assert!(matches!(
            frame_format(&h),
            Err(SoundError::UnsupportedSampleFormat { .. })
        ));
    }

    #[test]
    fn test_configure_runs_protocol_in_order() {
        let mock = MockSubsystem::new().with_rate_adjust(-50);
        let pcm = mock.pcm_open("default", StreamDirection::Playback).unwrap();
        let params = configure(&mock, pcm, &header(16)).unwrap();
        assert_eq!(params.rate.rate, 7950);
        assert_eq!(mock.formats(), vec![SampleFormat::S16Le]);
        drop(params);

        assert_eq!(
            mock.calls(),
            vec![
                "pcm_open",
                "hw_params_alloc",
                "hw_params_any",
                "hw_params_set_access",
                "hw_params_set_format",
                "hw_params_set_channels",
                "hw_params_set_rate_near",
                "hw_params_commit",
                "hw_params_free",
            ]
        );
    }

    #[test]
    fn test_failed_step_is_tagged_and_params_freed() {
        let mock = MockSubsystem::new().fail_on("hw_params_set_channels", -22);
        let pcm = mock.pcm_open("default", StreamDirection::Playback).unwrap();
        let err = configure(&mock, pcm, &header(16)).err().unwrap();
        match err {
            SoundError::DeviceConfig { step, native } => {
                assert_eq!(step, ConfigStep::SetChannels);
                assert_eq!(native.code, -22);
                assert_eq!(native.message, "mock error -22");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.count("hw_params_free"), 1);
        assert_eq!(mock.count("hw_params_commit"), 0);
    }

    #[test]
    fn test_allocation_failure_frees_nothing() {
        let mock = MockSubsystem::new().fail_on("hw_params_alloc", -12);
        let pcm = mock.pcm_open("default", StreamDirection::Playback).unwrap();
        let err = configure(&mock, pcm, &header(8)).err().unwrap();
        assert!(matches!(
            err,
            SoundError::DeviceConfig {
                step: ConfigStep::AllocateParameters,
                ..
            }
        ));
        assert_eq!(mock.count("hw_params_free"), 0);
    }

    #[test]
    fn test_transfer_bytes_uses_period_and_frame_width() {
        let mock = MockSubsystem::new().with_period_frames(1000);
        let pcm = mock.pcm_open("default", StreamDirection::Capture).unwrap();
        let params = configure(&mock, pcm, &header(16)).unwrap();
        assert_eq!(params.period_size().unwrap().frames, 1000);
        assert_eq!(params.transfer_bytes(4).unwrap(), 4000);
    }

    #[test]
    fn test_zero_period_is_a_config_error() {
        let mock = MockSubsystem::new().with_period_frames(0);
        let pcm = mock.pcm_open("default", StreamDirection::Playback).unwrap();
        let params = configure(&mock, pcm, &header(16)).unwrap();
        assert!(matches!(
            params.transfer_bytes(4),
            Err(SoundError::DeviceConfig {
                step: ConfigStep::GetPeriodSize,
                ..
            })
        ));
    }

    #[test]
    fn test_oversized_period_is_a_config_error() {
        let mock = MockSubsystem::new().with_period_frames(u64::MAX / 2);
        let pcm = mock.pcm_open("default", StreamDirection::Playback).unwrap();
        let params = configure(&mock, pcm, &header(16)).unwrap();
        assert!(matches!(
            params.transfer_bytes(4),
            Err(SoundError::DeviceConfig {
                step: ConfigStep::BufferSize,
                ..
            })
        ));
    }
}
