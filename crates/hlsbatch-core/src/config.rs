use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the parallelism picked when nothing is configured.
const DEFAULT_PARALLELISM_CAP: usize = 4;

/// Global configuration loaded from `~/.config/hlsbatch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsConfig {
    /// Path to the ffmpeg executable. When unset, ffmpeg is located next to
    /// the binary or on `PATH`.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Maximum number of encoder processes running at once (None = default parallelism).
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    /// Target duration of each HLS chunk in seconds.
    pub segment_duration_secs: u32,
    /// Seconds to wait after SIGTERM before killing a cancelled encoder.
    pub cancel_grace_secs: u64,
    /// Cadence of progress snapshots pushed to the presenter.
    pub progress_interval_ms: u64,
    /// Default output root when `--output` is not given.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            concurrency_limit: None,
            segment_duration_secs: 10,
            cancel_grace_secs: 5,
            progress_interval_ms: 1000,
            output_dir: None,
        }
    }
}

impl HlsConfig {
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Concurrency limit to use when the caller gives none.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.unwrap_or_else(default_parallelism)
    }
}

/// `min(4, available CPUs)`, never below 1.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, DEFAULT_PARALLELISM_CAP)
}

/// Largest concurrency limit a batch accepts: twice the default parallelism.
pub fn max_concurrency() -> usize {
    default_parallelism() * 2
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsbatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HlsConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] but for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<HlsConfig> {
    if !path.exists() {
        let default_cfg = HlsConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: HlsConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HlsConfig::default();
        assert_eq!(cfg.segment_duration_secs, 10);
        assert_eq!(cfg.cancel_grace_secs, 5);
        assert_eq!(cfg.progress_interval_ms, 1000);
        assert!(cfg.ffmpeg_path.is_none());
        assert!(cfg.concurrency_limit.is_none());
    }

    #[test]
    fn default_parallelism_is_bounded() {
        let n = default_parallelism();
        assert!((1..=DEFAULT_PARALLELISM_CAP).contains(&n));
        assert_eq!(max_concurrency(), n * 2);
        assert_eq!(HlsConfig::default().effective_concurrency(), n);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            concurrency_limit = 3
            segment_duration_secs = 6
            cancel_grace_secs = 2
            progress_interval_ms = 250
            output_dir = "/srv/hls"
        "#;
        let cfg: HlsConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        assert_eq!(cfg.effective_concurrency(), 3);
        assert_eq!(cfg.segment_duration_secs, 6);
        assert_eq!(cfg.cancel_grace(), Duration::from_secs(2));
        assert_eq!(cfg.progress_interval(), Duration::from_millis(250));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/srv/hls")));
    }

    #[test]
    fn load_or_init_writes_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let first = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        let second = load_or_init_at(&path).unwrap();
        assert_eq!(first.segment_duration_secs, second.segment_duration_secs);
        assert_eq!(first.cancel_grace_secs, second.cancel_grace_secs);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "segment_duration_secs = \"ten\"").unwrap();
        assert!(load_or_init_at(&path).is_err());
    }
}
