//! Service configuration: the analysis settings plus how the HTTP server runs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ney_core::AnalyzerConfig;
use serde::{Deserialize, Serialize};

/// Everything a config file can set. Missing sections and fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,

    /// Server port (default: 5000)
    pub port: u16,

    /// Largest accepted request body in bytes (default: 25 MiB)
    pub max_upload_bytes: usize,

    /// Directory served for paths no route matches; the built-in page is used for `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 25 * 1024 * 1024,
            static_dir: None,
        }
    }
}

/// Loads a service configuration from a JSON file, or the defaults without one.
///
/// The analyzer section is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let config = match path {
        Some(path) => {
            let mut data = String::new();
            File::open(path)
                .and_then(|mut file| file.read_to_string(&mut data))
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => ServiceConfig::default(),
    };
    config.analyzer.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ney_core::Locale;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_upload_bytes, 26_214_400);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ney.json");
        std::fs::write(
            &path,
            r#"{ "server": { "port": 8080 }, "analyzer": { "locale": "en", "tracker": { "fmin_note": "G3" } } }"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.analyzer.locale, Locale::En);
        assert_eq!(config.analyzer.tracker.fmin_note, "G3");
        assert_eq!(config.analyzer.tracker.fmax_note, "C7");
    }

    #[test]
    fn test_invalid_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ney.json");
        std::fs::write(&path, r#"{ "analyzer": { "tracker": { "fmin_note": "C8" } } }"#).unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/ney.json"))).is_err());
    }
}
