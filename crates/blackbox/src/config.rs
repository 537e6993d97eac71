//! Configuration management for blackbox.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "blackbox";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "records.db";

/// Passphrase used by earlier report readers.
///
/// It is embedded in every copy of the tool, so it only keeps casual eyes
/// out of an archive. Set `export.password` to something private to do better.
pub const LEGACY_ARCHIVE_PASSWORD: &str = "123456789";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BLACKBOX_`, `__` between sections)
/// 2. TOML config file at `~/.config/blackbox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recorder behaviour.
    pub recorder: RecorderConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Archive export configuration.
    pub export: ExportConfig,
}

/// Recorder-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Diagnostic mode: clear on every start and export unprotected `debug.zip` files.
    pub debug: bool,
    /// Logical store name inside the database.
    pub store_name: String,
    /// Key the session snapshot is stored under.
    pub store_key: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/blackbox/records.db`
    pub database_path: Option<PathBuf>,
}

/// AES key size for protected archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionStrength {
    /// 128-bit AES.
    #[default]
    Aes128,
    /// 192-bit AES.
    Aes192,
    /// 256-bit AES.
    Aes256,
}

/// Archive export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// File name prefix for normal-mode archives.
    pub file_prefix: String,
    /// File extension for normal-mode archives.
    pub file_extension: String,
    /// Fixed file name used in diagnostic mode.
    pub debug_file_name: String,
    /// Encrypt normal-mode archives with `password`.
    pub protect: bool,
    /// Passphrase protecting normal-mode archives.
    pub password: Option<String>,
    /// AES key size used when a passphrase is set.
    pub encryption_strength: EncryptionStrength,
    /// Where downloaded archives are saved.
    /// Defaults to the user's downloads directory.
    pub download_dir: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            debug: false,
            store_name: "errorStore".to_string(),
            store_key: "errors".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: "MyErrorReport".to_string(),
            file_extension: "errorReport".to_string(),
            debug_file_name: "debug.zip".to_string(),
            protect: true,
            password: Some(LEGACY_ARCHIVE_PASSWORD.to_string()),
            encryption_strength: EncryptionStrength::Aes128,
            download_dir: None,
        }
    }
}

impl ExportConfig {
    /// The passphrase to encrypt with, or `None` when protection is off.
    #[must_use]
    pub fn active_password(&self) -> Option<&str> {
        if self.protect {
            self.password.as_deref()
        } else {
            None
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("BLACKBOX_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |message: String| -> Result<()> { Err(Error::ConfigValidation { message }) };

        if self.recorder.store_name.trim().is_empty() {
            return invalid("recorder.store_name must not be empty".to_string());
        }
        if self.recorder.store_key.trim().is_empty() {
            return invalid("recorder.store_key must not be empty".to_string());
        }

        for (field, value) in [
            ("export.file_prefix", &self.export.file_prefix),
            ("export.file_extension", &self.export.file_extension),
            ("export.debug_file_name", &self.export.debug_file_name),
        ] {
            if value.contains(|c: char| c == '/' || c == '\\') {
                return invalid(format!("{field} must not contain path separators: {value}"));
            }
        }
        if self.export.debug_file_name.trim().is_empty() {
            return invalid("export.debug_file_name must not be empty".to_string());
        }
        if self.export.password.as_deref() == Some("") {
            return invalid(
                "export.password must not be empty; set export.protect = false instead"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the download directory, resolving defaults if not set.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.export.download_dir.clone().unwrap_or_else(|| {
            dirs::download_dir().unwrap_or_else(|| Self::default_data_dir().join("exports"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(!config.recorder.debug);
        assert_eq!(config.recorder.store_name, "errorStore");
        assert_eq!(config.recorder.store_key, "errors");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_default_export_config() {
        let export = ExportConfig::default();

        assert_eq!(export.file_prefix, "MyErrorReport");
        assert_eq!(export.file_extension, "errorReport");
        assert_eq!(export.debug_file_name, "debug.zip");
        assert_eq!(export.password.as_deref(), Some(LEGACY_ARCHIVE_PASSWORD));
        assert_eq!(export.encryption_strength, EncryptionStrength::Aes128);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_store_key() {
        let mut config = Config::default();
        config.recorder.store_key = " ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("store_key"));
    }

    #[test]
    fn test_validate_prefix_with_separator() {
        let mut config = Config::default();
        config.export.file_prefix = "../escape".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("file_prefix"));
    }

    #[test]
    fn test_validate_empty_password() {
        let mut config = Config::default();
        config.export.password = Some(String::new());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("password"));
    }

    #[test]
    fn test_validate_no_password_is_allowed() {
        let mut config = Config::default();
        config.export.password = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("records.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_download_dir_custom() {
        let mut config = Config::default();
        config.export.download_dir = Some(PathBuf::from("/tmp/reports"));
        assert_eq!(config.download_dir(), PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("blackbox"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[recorder]
debug = true

[export]
file_prefix = "Crash"
encryption_strength = "aes256"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();

        assert!(config.recorder.debug);
        assert_eq!(config.recorder.store_key, "errors");
        assert_eq!(config.export.file_prefix, "Crash");
        assert_eq!(config.export.encryption_strength, EncryptionStrength::Aes256);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recorder]\nstore_name = \"\"\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_active_password() {
        let mut export = ExportConfig::default();
        assert_eq!(export.active_password(), Some(LEGACY_ARCHIVE_PASSWORD));

        export.protect = false;
        assert_eq!(export.active_password(), None);
    }

    #[test]
    fn test_load_can_disable_protection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export]\nprotect = false\n").unwrap();

        let config = Config::load_from(Some(path)).unwrap();

        assert!(!config.export.protect);
        assert_eq!(config.export.active_password(), None);
    }

    #[test]
    fn test_encryption_strength_serde() {
        let json = serde_json::to_string(&EncryptionStrength::Aes192).unwrap();
        assert_eq!(json, r#""aes192""#);
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        assert_eq!(config.clone(), config);
    }
}
