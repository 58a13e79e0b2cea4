//! Register-write scripts.
//!
//! ```toml
//! cycles = 1789773
//!
//! [[write]]
//! cycle = 0
//! addr = 0x4015
//! value = 0x01
//!
//! [[memory]]
//! addr = 0xC000
//! bytes = [0xAA, 0x55]
//! ```

use std::path::Path;

use nes_apu_core::FlatBus;
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegisterWrite {
    pub cycle: u64,
    pub addr: u16,
    pub value: u8,
}

/// Bytes placed in CPU address space for the DMC to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryImage {
    pub addr: u16,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Script {
    /// Total CPU cycles to run.
    pub cycles: u64,
    #[serde(default, rename = "write")]
    pub writes: Vec<RegisterWrite>,
    #[serde(default)]
    pub memory: Vec<MemoryImage>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Parse script text; `path` is only used in error messages.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, CliError> {
        let script: Self = toml::from_str(text).map_err(|source| CliError::Script {
            path: path.to_path_buf(),
            source,
        })?;
        script.validated()
    }

    /// Writes sorted by cycle, keeping file order within a cycle.
    fn validated(mut self) -> Result<Self, CliError> {
        if let Some((index, w)) = self
            .writes
            .iter()
            .enumerate()
            .find(|(_, w)| w.cycle > self.cycles)
        {
            return Err(CliError::WriteOutOfRange {
                index,
                cycle: w.cycle,
                cycles: self.cycles,
            });
        }
        self.writes.sort_by_key(|w| w.cycle);
        Ok(self)
    }

    pub fn bus(&self) -> FlatBus {
        let mut bus = FlatBus::new();
        for image in &self.memory {
            bus.load(image.addr, &image.bytes);
        }
        bus
    }
}
