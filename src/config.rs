//! Configuration management.
//!
//! Configuration comes from a TOML file with full defaults, so a
//! missing file is not an error. The path is taken from the CLI flag,
//! the `WAYBILL_CONFIG` environment variable, or the platform config
//! directory, in that order. Paths in the file may use `~`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::plate::PlateRegistry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory watched for incoming documents.
    pub watched_dir: PathBuf,
    /// Where quarantine artifacts are exported.
    pub quarantine_dir: PathBuf,
    /// Where fully processed documents end up.
    pub recorded_dir: PathBuf,
    /// Where unreadable documents end up.
    pub failed_dir: PathBuf,
    /// How long a document lease lives before a crashed run's lease
    /// can be reclaimed.
    pub lease_ttl_minutes: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let base = data_dir();
        Self {
            watched_dir: base.join("incoming"),
            quarantine_dir: base.join("quarantine"),
            recorded_dir: base.join("recorded"),
            failed_dir: base.join("failed"),
            lease_ttl_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file shared by every repository.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("waybill.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Known vehicle plates for fuzzy resolution.
    pub plates: Vec<String>,
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match std::env::var("WAYBILL_CONFIG") {
                Ok(p) => PathBuf::from(shellexpand::tilde(&p).into_owned()),
                Err(_) => default_config_path(),
            },
        };

        if !path.is_file() {
            tracing::debug!("no config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&raw)?;
        config.expand_paths();
        Ok(config)
    }

    /// Build the plate registry from the configured plates.
    pub fn plate_registry(&self) -> PlateRegistry {
        PlateRegistry::new(self.registry.plates.iter().cloned())
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.scanner.watched_dir,
            &mut self.scanner.quarantine_dir,
            &mut self.scanner.recorded_dir,
            &mut self.scanner.failed_dir,
            &mut self.storage.database,
        ] {
            *path = expand_tilde(path);
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waybill")
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waybill")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.scanner.lease_ttl_minutes, 30);
        assert!(config.registry.plates.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults_elsewhere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [registry]
            plates = ["ES745WH", "FC065ZW"]

            [scanner]
            lease_ttl_minutes = 5
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.registry.plates.len(), 2);
        assert_eq!(config.scanner.lease_ttl_minutes, 5);
        // Untouched sections fall back to defaults
        assert!(config.storage.database.ends_with("waybill.db"));
        assert!(!config.plate_registry().is_empty());
    }

    #[test]
    fn test_tilde_expansion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [storage]
            database = "~/waybill/waybill.db"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.storage.database.to_string_lossy().contains('~'));
    }
}
