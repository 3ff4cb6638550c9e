use crate::keying::parse_hex_color;
use crate::keying::types::Rgb;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct ControlLine {
    #[command(subcommand)]
    command: ControlCommand,
}

/// Line-oriented runtime controls read from stdin
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Press and hold the capture control
    Press,
    /// Release the capture control
    Release,
    /// Tap the capture control (photo)
    Shoot,
    /// Screen tap; five quick taps toggle keying debug mode
    Tap,
    /// Set the key color (#RRGGBB)
    Key {
        #[arg(value_parser = parse_hex_color)]
        color: Rgb,
    },
    Similarity {
        value: f32,
    },
    Smoothness {
        value: f32,
    },
    /// Horizontal overlay shift as a fraction of viewport width
    Offset {
        #[arg(allow_negative_numbers = true)]
        value: f32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    /// Replace the overlay asset
    Overlay {
        path: PathBuf,
    },
    /// Resume overlay playback
    Play,
    /// Pause overlay playback
    Pause,
    /// Retry a failed initialization
    Retry,
    Share,
    Download,
    Discard,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ControlCommand, clap::Error> {
    ControlLine::try_parse_from(line.split_whitespace()).map(|parsed| parsed.command)
}

/// Read control commands from stdin on a helper thread
pub fn spawn_control_reader() -> mpsc::Receiver<ControlCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Control input closed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Unknown control command {:?}: {}", line.trim(), e),
            }
        }
    });
    rx
}
