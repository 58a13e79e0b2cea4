use std::path::Path;

use log::warn;
use nes_apu_core::ApuConfig;

/// Load engine settings from a TOML file. A missing file gives the defaults;
/// a malformed one is reported and also gives the defaults.
pub fn load_from_file(path: &Path) -> ApuConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to read config {}: {e}; using defaults", path.display());
            return ApuConfig::default();
        }
    };

    match toml::from_str::<ApuConfig>(&text) {
        Ok(cfg) => cfg.normalized(),
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            ApuConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nes_apu_core::Region;
    use nes_apu_core::mixer::MixerKind;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "region = \"pal\"\nsample_rate = 48000\nmixer = \"lookup\"").unwrap();
        let cfg = load_from_file(file.path());
        assert_eq!(cfg.region, Region::Pal);
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.mixer, Some(MixerKind::Lookup));
        assert_eq!(cfg.latency_ms, ApuConfig::default().latency_ms);
    }

    #[test]
    fn malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_rate = \"fast\"").unwrap();
        assert_eq!(load_from_file(file.path()), ApuConfig::default());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("absent.toml"));
        assert_eq!(cfg, ApuConfig::default());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_rate = 1000").unwrap();
        assert_eq!(load_from_file(file.path()).sample_rate, 8_000);
    }
}
