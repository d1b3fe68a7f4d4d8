//! sound-device - WAV playback, recording and mixer volume for Linux
//!
//! This is the main entry point for the sound-device command line tool.

mod cli;
mod tokio_runtime;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use cli::Command;
use log::{info, warn};
use sound_device::{Completion, ConnectionSettings, SoundDevice, UnixSoundDevice};
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let settings = args.settings();
    if args.save_config {
        let path = args
            .config_path()
            .context("No config directory to save settings in")?;
        settings
            .save(&path)
            .with_context(|| format!("Failed to save settings to {}", path.display()))?;
        info!("Saved settings to {}", path.display());
    }
    info!(
        "Starting sound-device (playback: {}, recording: {}, mixer: {})",
        settings.playback_device_name, settings.recording_device_name, settings.mixer_device_name
    );

    tokio_runtime::block_on(run(args.command, settings))
        .context("Failed to start the Tokio runtime")?
}

async fn run(command: Command, settings: ConnectionSettings) -> anyhow::Result<()> {
    let device = UnixSoundDevice::new(settings);
    match command {
        Command::Play { path } => {
            let completion = device
                .play_file_async(&path, cancel_on_ctrl_c())
                .await
                .with_context(|| format!("Failed to play {}", path.display()))?;
            report("Playback", &path, completion);
        }
        Command::Record { seconds, output } => {
            let path = output.unwrap_or_else(cli::default_recording_path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let completion = device
                .record_file_async(seconds, &path, cancel_on_ctrl_c())
                .await
                .with_context(|| format!("Failed to record {}", path.display()))?;
            report("Recording", &path, completion);
        }
        Command::Volume { capture, value } => {
            let kind = if capture { "capture" } else { "playback" };
            match value {
                Some(volume) => {
                    let result = if capture {
                        device.set_recording_volume(volume)
                    } else {
                        device.set_playback_volume(volume)
                    };
                    result.with_context(|| format!("Failed to set {} volume", kind))?;
                    info!("Set {} volume to {}", kind, volume);
                }
                None => {
                    let result = if capture {
                        device.recording_volume()
                    } else {
                        device.playback_volume()
                    };
                    let volume =
                        result.with_context(|| format!("Failed to read {} volume", kind))?;
                    println!("{}", volume);
                }
            }
        }
    }
    Ok(())
}

/// A token cancelled by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            cancel.cancel();
        }
    });
    token
}

fn report(operation: &str, path: &Path, completion: Completion) {
    match completion {
        Completion::Finished => info!("{} of {} finished", operation, path.display()),
        Completion::Cancelled => warn!("{} of {} cancelled", operation, path.display()),
    }
}
