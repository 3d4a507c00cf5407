//! Configuration system for the treehash CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use treehash_core::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};

/// Largest chunk size the CLI accepts (64 MiB)
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Most worker threads the CLI will spawn
const MAX_WORKERS: usize = 1024;

/// treehash configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Hashing configuration
    pub hash: HashConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashConfig {
    /// Worker threads; 0 means one per hardware thread
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Treat short chunk reads as fatal
    #[serde(default)]
    pub strict: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chunk_size: default_chunk_size(),
            strict: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("treehash/config.toml")
    }

    /// Load config from the default path, or create a default one there
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hash.chunk_size == 0 || self.hash.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!(
                "Chunk size must be between 1 byte and {} bytes",
                MAX_CHUNK_SIZE
            );
        }

        if self.hash.workers > MAX_WORKERS {
            anyhow::bail!("Worker count must be at most {}", MAX_WORKERS);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hash.workers, 2);
        assert_eq!(config.hash.chunk_size, 1024 * 1024);
        assert!(!config.hash.strict);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Zero workers means all hardware threads and is valid
        config.hash.workers = 0;
        assert!(config.validate().is_ok());

        config.hash.chunk_size = 0;
        assert!(config.validate().is_err());

        config.hash.chunk_size = 1024;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.hash.workers, deserialized.hash.workers);
        assert_eq!(config.hash.chunk_size, deserialized.hash.chunk_size);
        assert_eq!(config.logging.level, deserialized.logging.level);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[hash]\nworkers = 8\n").unwrap();
        assert_eq!(config.hash.workers, 8);
        assert_eq!(config.hash.chunk_size, 1024 * 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.hash.workers = 6;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.hash.workers, 6);
    }
}
