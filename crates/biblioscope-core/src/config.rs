use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root application configuration, loaded from `~/.config/biblioscope/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub recognize: RecognizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub library_path: String,
    /// Directory for short-lived extraction output. Defaults to the library path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_directory: Option<String>,
}

/// Tuning for the recognition queue, the resolver and its HTTP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizeConfig {
    /// Pages handed to the text extractor.
    pub max_pages: u32,
    /// Only the first N extracted lines are searched for a DOI.
    pub doi_search_lines: usize,
    /// Characters of extracted text sent to the recognition service.
    pub remote_text_limit: usize,
    /// Remote recognition endpoint. When unset the resolver goes straight
    /// from identifier lookups to full-text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition_service_url: Option<String>,
    /// Minimum spacing between requests to the same remote service.
    pub request_spacing_ms: u64,
    pub offline_poll_secs: u64,
    pub backoff_step_ms: u64,
    pub backoff_cap_secs: u64,
    /// Phrase queries built from the text for the last-resort full-text search. 0 disables it.
    pub full_text_queries: usize,
    pub extraction_timeout_secs: u64,
    pub pdftotext_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    /// Host:port probed to decide whether the network is reachable.
    pub connectivity_probe: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("biblioscope");

        Self {
            library_path: data_dir.to_string_lossy().to_string(),
            scratch_directory: None,
        }
    }
}

impl Default for RecognizeConfig {
    fn default() -> Self {
        Self {
            max_pages: 15,
            doi_search_lines: 80,
            remote_text_limit: 16384,
            recognition_service_url: None,
            request_spacing_ms: 0,
            offline_poll_secs: 5,
            backoff_step_ms: 1000,
            backoff_cap_secs: 60,
            full_text_queries: 3,
            extraction_timeout_secs: 30,
            pdftotext_path: "pdftotext".to_string(),
            polite_email: None,
            connectivity_probe: "api.crossref.org:443".to_string(),
        }
    }
}

impl RecognizeConfig {
    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    pub fn offline_poll_interval(&self) -> Duration {
        Duration::from_secs(self.offline_poll_secs)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Apply `BIBLIOSCOPE_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(url) = env_non_empty("BIBLIOSCOPE_RECOGNITION_URL") {
            self.recognition_service_url = Some(url);
        }
        if let Some(email) = env_non_empty("BIBLIOSCOPE_POLITE_EMAIL") {
            self.polite_email = Some(email);
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/biblioscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BIBLIOSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("biblioscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = Self::load_from(&path)?;
        config.recognize.apply_env();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.core.library_path).join("biblioscope.db")
    }

    /// Directory where extraction scratch files are written.
    pub fn scratch_dir(&self) -> PathBuf {
        self.core
            .scratch_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.core.library_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.recognize.max_pages, 15);
        assert_eq!(cfg.recognize.doi_search_lines, 80);
        assert_eq!(cfg.recognize.backoff_cap(), Duration::from_secs(60));
        assert!(cfg.recognize.recognition_service_url.is_none());
        assert!(!cfg.core.library_path.is_empty());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.recognize.request_spacing_ms = 250;
        cfg.recognize.polite_email = Some("me@example.org".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.recognize.request_spacing(), Duration::from_millis(250));
        assert_eq!(loaded.recognize.polite_email.as_deref(), Some("me@example.org"));
        assert_eq!(loaded.core.library_path, cfg.core.library_path);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recognize]\nmax_pages = 3\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.recognize.max_pages, 3);
        assert_eq!(loaded.recognize.remote_text_limit, 16384);
        assert_eq!(loaded.recognize.pdftotext_path, "pdftotext");
    }

    #[test]
    fn test_recognition_service_is_opt_in() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[recognize]\nrecognition_service_url = \"http://localhost:8003/recognize\"\n",
        )
        .unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(
            loaded.recognize.recognition_service_url.as_deref(),
            Some("http://localhost:8003/recognize")
        );

        let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(!rendered.contains("recognition_service_url"));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_biblioscope_config.toml")).unwrap();
        assert_eq!(cfg.recognize.full_text_queries, 3);
    }

    #[test]
    fn test_derived_paths() {
        let mut cfg = AppConfig::default();
        cfg.core.library_path = "/srv/library".to_string();
        assert_eq!(cfg.database_path(), PathBuf::from("/srv/library/biblioscope.db"));
        assert_eq!(cfg.scratch_dir(), PathBuf::from("/srv/library"));

        cfg.core.scratch_directory = Some("/tmp/scratch".to_string());
        assert_eq!(cfg.scratch_dir(), PathBuf::from("/tmp/scratch"));
    }
}
