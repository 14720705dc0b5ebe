use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::search::{DEFAULT_DEPTH, Engine, MAX_SEARCH_DEPTH};
use crate::transposition::{DEFAULT_HASH_MB, MAX_HASH_MB, TranspositionTable};
use crate::zobrist::Zobrist;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine and server settings. Every field may be omitted from the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Transposition table budget in megabytes.
    pub hash_mb: usize,
    pub zobrist_seed: u64,
    /// Depth used when a request does not name one.
    pub default_depth: u8,
    /// Requests asking for more are clamped to this.
    pub max_depth: u8,
    pub bind: SocketAddr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: DEFAULT_HASH_MB,
            zobrist_seed: Zobrist::DEFAULT_SEED,
            default_depth: DEFAULT_DEPTH,
            max_depth: MAX_SEARCH_DEPTH,
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_HASH_MB).contains(&self.hash_mb) {
            return Err(ConfigError::Invalid(format!(
                "hash_mb must be between 1 and {}",
                MAX_HASH_MB
            )));
        }
        if !(1..=MAX_SEARCH_DEPTH).contains(&self.max_depth) {
            return Err(ConfigError::Invalid(format!(
                "max_depth must be between 1 and {}",
                MAX_SEARCH_DEPTH
            )));
        }
        if self.default_depth == 0 || self.default_depth > self.max_depth {
            return Err(ConfigError::Invalid(format!(
                "default_depth must be between 1 and max_depth ({})",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Requested depth, or the default, limited to `1..=max_depth`.
    pub fn clamp_depth(&self, requested: Option<u8>) -> u8 {
        requested
            .unwrap_or(self.default_depth)
            .clamp(1, self.max_depth.max(1))
    }

    pub fn build_engine(&self) -> Engine {
        Engine::new(
            std::sync::Arc::new(Zobrist::new(self.zobrist_seed)),
            TranspositionTable::new(self.hash_mb),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.hash_mb, 64);
        assert_eq!(config.zobrist_seed, 0xDEAD_BEEF);
        assert_eq!(config.default_depth, 4);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.bind.to_string(), "127.0.0.1:3000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml("hash_mb = 16\ndefault_depth = 3\n").unwrap();
        assert_eq!(config.hash_mb, 16);
        assert_eq!(config.default_depth, 3);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.zobrist_seed, Zobrist::DEFAULT_SEED);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(EngineConfig::from_toml("hash = 16\n").is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig {
            hash_mb: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.hash_mb = usize::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.hash_mb = MAX_HASH_MB;
        assert!(config.validate().is_ok());
        config.hash_mb = 1;
        config.default_depth = 11;
        assert!(config.validate().is_err());
        config.default_depth = 4;
        config.max_depth = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_depth() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_depth(None), 4);
        assert_eq!(config.clamp_depth(Some(0)), 1);
        assert_eq!(config.clamp_depth(Some(7)), 7);
        assert_eq!(config.clamp_depth(Some(99)), 10);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = EngineConfig::load("/nonexistent/alphabeta.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/alphabeta.toml"));
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("alphabeta-config-{}.toml", std::process::id()));
        std::fs::write(&path, "bind = \"0.0.0.0:8080\"\nmax_depth = 6\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.clamp_depth(Some(9)), 6);
    }
}
