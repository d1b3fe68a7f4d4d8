//! Command-line interface for sound-device
//!
//! Handles argument parsing and logging configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use sound_device::ConnectionSettings;

/// sound-device - Play and record WAV files, adjust mixer volume
#[derive(Parser, Debug)]
#[command(name = "sound-device")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace, -vvvv = all deps
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to <config dir>/sound-device/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long, global = true)]
    pub save_config: bool,

    /// PCM device used for playback
    #[arg(long, global = true)]
    pub playback_device: Option<String>,

    /// PCM device used for recording
    #[arg(long, global = true)]
    pub recording_device: Option<String>,

    /// Mixer device used for volume control
    #[arg(long, global = true)]
    pub mixer_device: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a WAV file
    Play {
        path: PathBuf,
    },
    /// Record a WAV file
    Record {
        /// Duration in seconds
        #[arg(short, long, default_value_t = 5)]
        seconds: u32,

        /// Output file (defaults to a timestamped file in the audio directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show or set the mixer volume
    Volume {
        /// Use the capture volume instead of playback
        #[arg(long)]
        capture: bool,

        /// New volume; prints the current one when omitted
        value: Option<i64>,
    },
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Settings file in use, if one can be located
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(ConnectionSettings::default_path)
    }

    /// Load the settings file and apply device overrides from the command line
    pub fn settings(&self) -> ConnectionSettings {
        let mut settings = self
            .config_path()
            .map(ConnectionSettings::load_or_default)
            .unwrap_or_default();
        if let Some(name) = &self.playback_device {
            settings = settings.with_playback_device(name.as_str());
        }
        if let Some(name) = &self.recording_device {
            settings = settings.with_recording_device(name.as_str());
        }
        if let Some(name) = &self.mixer_device {
            settings = settings.with_mixer_device(name.as_str());
        }
        settings
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("sound_device", args.log_level());

    if args.verbose >= 4 {
        builder.filter_level(args.log_level());
    }

    builder.format_timestamp_millis().init();
}

/// Timestamped file name for a new recording, in the user's audio directory
pub fn default_recording_path() -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let uuid = uuid::Uuid::new_v4().to_string()[..8].to_string();
    dirs::audio_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("recording_{}_{}.wav", timestamp, uuid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let args = Args::parse_from(["sound-device", "-vv", "volume"]);
        assert_eq!(args.log_level(), LevelFilter::Debug);
        let args = Args::parse_from(["sound-device", "volume", "-q"]);
        assert_eq!(args.log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_device_overrides() {
        let args = Args::parse_from([
            "sound-device",
            "--config",
            "/nonexistent/sound-device.json",
            "--playback-device",
            "hw:1,0",
            "play",
            "a.wav",
        ]);
        let settings = args.settings();
        assert_eq!(settings.playback_device_name, "hw:1,0");
        assert_eq!(settings.recording_device_name, "default");
        assert!(matches!(args.command, Command::Play { .. }));
    }

    #[test]
    fn test_record_defaults() {
        let args = Args::parse_from(["sound-device", "record"]);
        match args.command {
            Command::Record { seconds, output } => {
                assert_eq!(seconds, 5);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_recording_name() {
        let path = default_recording_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("recording_"));
        assert!(name.ends_with(".wav"));
        // recording_ + YYYYmmdd_HHMMSS + _ + 8 hex digits + .wav
        assert_eq!(name.len(), 10 + 15 + 1 + 8 + 4);
    }
}
