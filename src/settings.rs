//! Connection settings
//!
//! Selects the playback, recording and mixer devices and the format used when
//! recording. Settings can be persisted as JSON under the user's config
//! directory (`<config>/sound-device/settings.json`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::error;
use serde::{Deserialize, Serialize};

const DEFAULT_DEVICE: &str = "default";

/// Device selection and default recording format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub playback_device_name: String,
    pub recording_device_name: String,
    pub mixer_device_name: String,
    pub recording_sample_rate: u32,
    pub recording_channels: u16,
    pub recording_bits_per_sample: u16,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            playback_device_name: DEFAULT_DEVICE.to_string(),
            recording_device_name: DEFAULT_DEVICE.to_string(),
            mixer_device_name: DEFAULT_DEVICE.to_string(),
            recording_sample_rate: 8000,
            recording_channels: 2,
            recording_bits_per_sample: 16,
        }
    }
}

impl ConnectionSettings {
    pub fn with_playback_device(mut self, name: impl Into<String>) -> Self {
        self.playback_device_name = name.into();
        self
    }

    pub fn with_recording_device(mut self, name: impl Into<String>) -> Self {
        self.recording_device_name = name.into();
        self
    }

    pub fn with_mixer_device(mut self, name: impl Into<String>) -> Self {
        self.mixer_device_name = name.into();
        self
    }

    pub fn with_recording_sample_rate(mut self, rate: u32) -> Self {
        self.recording_sample_rate = rate;
        self
    }

    pub fn with_recording_channels(mut self, channels: u16) -> Self {
        self.recording_channels = channels;
        self
    }

    pub fn with_recording_bits_per_sample(mut self, bits: u16) -> Self {
        self.recording_bits_per_sample = bits;
        self
    }

    /// Location of the settings file, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sound-device").join("settings.json"))
    }

    /// Read settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(io::Error::from)
    }

    /// Read settings from `path`, falling back to defaults
    ///
    /// A missing file is not an error; an unreadable or invalid one is logged.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                error!("Failed to load settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(io::Error::from)?;
        fs::write(path, text)
    }
}
