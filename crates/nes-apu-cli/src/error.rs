use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid script {path}: {source}")]
    Script {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("script write #{index} at cycle {cycle} is past the end of the script ({cycles} cycles)")]
    WriteOutOfRange { index: usize, cycle: u64, cycles: u64 },

    #[error("WAV output failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] nes_apu_core::SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "playback")]
    #[error("audio device unavailable: {0}")]
    Playback(String),
}
