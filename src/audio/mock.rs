//! Scriptable in-memory audio subsystem for tests
//!
//! Records every native call by name, echoes mixer volumes and produces
//! deterministic capture data (each read fills its buffer with the read index).

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::native::{
    Access, AudioSubsystem, HwParamsHandle, MixerChannel, MixerElement, MixerHandle, PcmHandle,
    PeriodSize, RateNear, SampleFormat, Status, StreamDirection,
};

const EBADFD: i32 = -77;

#[derive(Default)]
struct MockState {
    calls: Vec<&'static str>,
    next_id: u64,
    open_pcms: HashMap<u64, StreamDirection>,
    open_params: HashSet<u64>,
    open_mixers: HashSet<u64>,
    opened_devices: Vec<String>,
    attached_mixers: Vec<String>,
    formats: Vec<SampleFormat>,
    channels: Vec<u32>,
    write_frames: Vec<u64>,
    written: Vec<u8>,
    read_frames: Vec<u64>,
    playback_volume: [i64; 2],
    capture_volume: [i64; 2],
}

pub struct MockSubsystem {
    state: Mutex<MockState>,
    failures: HashMap<&'static str, i32>,
    period_frames: u64,
    rate_adjust: i32,
    open_delay: Duration,
    io_delay: Duration,
    reported_read_frames: Option<u64>,
}

impl MockSubsystem {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            failures: HashMap::new(),
            period_frames: 1000,
            rate_adjust: 0,
            open_delay: Duration::ZERO,
            io_delay: Duration::ZERO,
            reported_read_frames: None,
        }
    }

    /// Make every call to `op` fail with `code`
    pub fn fail_on(mut self, op: &'static str, code: i32) -> Self {
        self.failures.insert(op, code);
        self
    }

    pub fn with_period_frames(mut self, frames: u64) -> Self {
        self.period_frames = frames;
        self
    }

    /// Offset applied to the requested rate by `set_rate_near`
    pub fn with_rate_adjust(mut self, delta: i32) -> Self {
        self.rate_adjust = delta;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Delay applied to every PCM read and write
    pub fn with_io_delay(mut self, delay: Duration) -> Self {
        self.io_delay = delay;
        self
    }

    /// Frame count every read reports, whatever was requested
    pub fn with_reported_read_frames(mut self, frames: u64) -> Self {
        self.reported_read_frames = Some(frames);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn formats(&self) -> Vec<SampleFormat> {
        self.state.lock().formats.clone()
    }

    pub fn channels(&self) -> Vec<u32> {
        self.state.lock().channels.clone()
    }

    pub fn opened_devices(&self) -> Vec<String> {
        self.state.lock().opened_devices.clone()
    }

    pub fn attached_mixers(&self) -> Vec<String> {
        self.state.lock().attached_mixers.clone()
    }

    /// Frame counts passed to each write call
    pub fn write_frames(&self) -> Vec<u64> {
        self.state.lock().write_frames.clone()
    }

    /// Every byte handed to the device by write calls
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn read_frames(&self) -> Vec<u64> {
        self.state.lock().read_frames.clone()
    }

    pub fn open_pcm_count(&self) -> usize {
        self.state.lock().open_pcms.len()
    }

    pub fn open_mixer_count(&self) -> usize {
        self.state.lock().open_mixers.len()
    }

    pub fn live_params(&self) -> usize {
        self.state.lock().open_params.len()
    }

    pub fn playback_channels(&self) -> [i64; 2] {
        self.state.lock().playback_volume
    }

    pub fn capture_channels(&self) -> [i64; 2] {
        self.state.lock().capture_volume
    }

    /// Record the call and return its scripted failure, if any
    fn enter(&self, op: &'static str) -> Status<()> {
        self.state.lock().calls.push(op);
        match self.failures.get(op) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn check_pcm(&self, pcm: PcmHandle) -> Status<StreamDirection> {
        self.state
            .lock()
            .open_pcms
            .get(&pcm.as_raw())
            .copied()
            .ok_or(EBADFD)
    }

    fn check_params(&self, params: HwParamsHandle) -> Status<()> {
        if self.state.lock().open_params.contains(&params.as_raw()) {
            Ok(())
        } else {
            Err(EBADFD)
        }
    }

    fn check_mixer(&self, mixer: MixerHandle) -> Status<()> {
        if self.state.lock().open_mixers.contains(&mixer.as_raw()) {
            Ok(())
        } else {
            Err(EBADFD)
        }
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        state.next_id
    }

    fn volumes(state: &mut MockState, playback: bool) -> &mut [i64; 2] {
        if playback {
            &mut state.playback_volume
        } else {
            &mut state.capture_volume
        }
    }

    fn get_volume(&self, elem: MixerElement, channel: MixerChannel, playback: bool) -> Status<i64> {
        self.check_mixer(elem.mixer())?;
        let mut state = self.state.lock();
        Ok(Self::volumes(&mut state, playback)[channel_index(channel)])
    }

    fn set_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
        playback: bool,
    ) -> Status<()> {
        self.check_mixer(elem.mixer())?;
        let mut state = self.state.lock();
        Self::volumes(&mut state, playback)[channel_index(channel)] = value;
        Ok(())
    }
}

fn channel_index(channel: MixerChannel) -> usize {
    match channel {
        MixerChannel::FrontLeft => 0,
        MixerChannel::FrontRight => 1,
    }
}

impl AudioSubsystem for MockSubsystem {
    fn pcm_open(&self, device: &str, direction: StreamDirection) -> Status<PcmHandle> {
        self.enter("pcm_open")?;
        if !self.open_delay.is_zero() {
            thread::sleep(self.open_delay);
        }
        let id = self.next_id();
        let mut state = self.state.lock();
        state.open_pcms.insert(id, direction);
        state.opened_devices.push(device.to_string());
        Ok(PcmHandle::from_raw(id))
    }

    fn pcm_start(&self, pcm: PcmHandle) -> Status<()> {
        self.enter("pcm_start")?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_pause(&self, pcm: PcmHandle, enable: bool) -> Status<()> {
        self.enter(if enable { "pcm_pause" } else { "pcm_unpause" })?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_resume(&self, pcm: PcmHandle) -> Status<()> {
        self.enter("pcm_resume")?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_recover(&self, pcm: PcmHandle, _code: i32, _silent: bool) -> Status<()> {
        self.enter("pcm_recover")?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_drain(&self, pcm: PcmHandle) -> Status<()> {
        self.enter("pcm_drain")?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_drop(&self, pcm: PcmHandle) -> Status<()> {
        self.enter("pcm_drop")?;
        self.check_pcm(pcm).map(|_| ())
    }

    fn pcm_close(&self, pcm: PcmHandle) -> Status<()> {
        // The handle is released even when the close is scripted to fail.
        let result = self.enter("pcm_close");
        self.state.lock().open_pcms.remove(&pcm.as_raw());
        result
    }

    fn pcm_write(&self, pcm: PcmHandle, buf: &[u8], frames: u64) -> Status<u64> {
        self.enter("pcm_write")?;
        if !self.io_delay.is_zero() {
            thread::sleep(self.io_delay);
        }
        self.check_pcm(pcm)?;
        let mut state = self.state.lock();
        state.write_frames.push(frames);
        state.written.extend_from_slice(buf);
        Ok(frames)
    }

    fn pcm_read(&self, pcm: PcmHandle, buf: &mut [u8], frames: u64) -> Status<u64> {
        self.enter("pcm_read")?;
        if !self.io_delay.is_zero() {
            thread::sleep(self.io_delay);
        }
        self.check_pcm(pcm)?;
        let mut state = self.state.lock();
        let fill = state.read_frames.len() as u8;
        buf.fill(fill);
        state.read_frames.push(frames);
        Ok(self.reported_read_frames.unwrap_or(frames))
    }

    fn hw_params_alloc(&self) -> Status<HwParamsHandle> {
        self.enter("hw_params_alloc")?;
        let id = self.next_id();
        self.state.lock().open_params.insert(id);
        Ok(HwParamsHandle::from_raw(id))
    }

    fn hw_params_free(&self, params: HwParamsHandle) {
        self.state.lock().calls.push("hw_params_free");
        self.state.lock().open_params.remove(&params.as_raw());
    }

    fn hw_params_any(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()> {
        self.enter("hw_params_any")?;
        self.check_pcm(pcm)?;
        self.check_params(params)
    }

    fn hw_params_set_access(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        _access: Access,
    ) -> Status<()> {
        self.enter("hw_params_set_access")?;
        self.check_pcm(pcm)?;
        self.check_params(params)
    }

    fn hw_params_set_format(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        format: SampleFormat,
    ) -> Status<()> {
        self.enter("hw_params_set_format")?;
        self.check_pcm(pcm)?;
        self.check_params(params)?;
        self.state.lock().formats.push(format);
        Ok(())
    }

    fn hw_params_set_channels(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        channels: u32,
    ) -> Status<()> {
        self.enter("hw_params_set_channels")?;
        self.check_pcm(pcm)?;
        self.check_params(params)?;
        self.state.lock().channels.push(channels);
        Ok(())
    }

    fn hw_params_set_rate_near(
        &self,
        pcm: PcmHandle,
        params: HwParamsHandle,
        rate: u32,
    ) -> Status<RateNear> {
        self.enter("hw_params_set_rate_near")?;
        self.check_pcm(pcm)?;
        self.check_params(params)?;
        Ok(RateNear {
            rate: rate.saturating_add_signed(self.rate_adjust),
            direction: self.rate_adjust.signum(),
        })
    }

    fn hw_params_commit(&self, pcm: PcmHandle, params: HwParamsHandle) -> Status<()> {
        self.enter("hw_params_commit")?;
        self.check_pcm(pcm)?;
        self.check_params(params)
    }

    fn hw_params_period_size(&self, params: HwParamsHandle) -> Status<PeriodSize> {
        self.enter("hw_params_period_size")?;
        self.check_params(params)?;
        Ok(PeriodSize {
            frames: self.period_frames,
            direction: 0,
        })
    }

    fn mixer_open(&self) -> Status<MixerHandle> {
        self.enter("mixer_open")?;
        let id = self.next_id();
        self.state.lock().open_mixers.insert(id);
        Ok(MixerHandle::from_raw(id))
    }

    fn mixer_attach(&self, mixer: MixerHandle, device: &str) -> Status<()> {
        self.enter("mixer_attach")?;
        self.check_mixer(mixer)?;
        self.state.lock().attached_mixers.push(device.to_string());
        Ok(())
    }

    fn mixer_register(&self, mixer: MixerHandle) -> Status<()> {
        self.enter("mixer_register")?;
        self.check_mixer(mixer)
    }

    fn mixer_load(&self, mixer: MixerHandle) -> Status<()> {
        self.enter("mixer_load")?;
        self.check_mixer(mixer)
    }

    fn mixer_first_element(&self, mixer: MixerHandle) -> Status<MixerElement> {
        self.enter("mixer_first_element")?;
        self.check_mixer(mixer)?;
        Ok(MixerElement::new(mixer, 1))
    }

    fn mixer_get_playback_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64> {
        self.enter("mixer_get_playback_volume")?;
        self.get_volume(elem, channel, true)
    }

    fn mixer_set_playback_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()> {
        self.enter("mixer_set_playback_volume")?;
        self.set_volume(elem, channel, value, true)
    }

    fn mixer_get_capture_volume(&self, elem: MixerElement, channel: MixerChannel) -> Status<i64> {
        self.enter("mixer_get_capture_volume")?;
        self.get_volume(elem, channel, false)
    }

    fn mixer_set_capture_volume(
        &self,
        elem: MixerElement,
        channel: MixerChannel,
        value: i64,
    ) -> Status<()> {
        self.enter("mixer_set_capture_volume")?;
        self.set_volume(elem, channel, value, false)
    }

    fn mixer_close(&self, mixer: MixerHandle) -> Status<()> {
        let result = self.enter("mixer_close");
        self.state.lock().open_mixers.remove(&mixer.as_raw());
        result
    }

    fn strerror(&self, code: i32) -> String {
        format!("mock error {}", code)
    }
}
