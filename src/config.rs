use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CalError, Result};

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:54321";

pub struct AppPaths {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub blobs_dir: PathBuf,
    pub mirror_path: PathBuf,
    pub settings_path: PathBuf,
    pub log_file: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl AppPaths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".postcal");
        Self::from_base(base)
    }

    pub fn from_base(base: PathBuf) -> Self {
        Self {
            db_path: base.join("postcal.db"),
            blobs_dir: base.join("storage"),
            mirror_path: base.join("mirror.json"),
            settings_path: base.join("settings.json"),
            log_file: base.join("postcal.log"),
            base_dir: base,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::create_dir_all(&self.blobs_dir)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Shown in the footer of exported snapshots.
    pub company_name: String,
    /// Prefix of public attachment URLs.
    pub public_base_url: String,
    /// Prefix of client share links.
    pub share_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            share_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Settings {
    /// Reads `settings.json`, falling back to defaults when the file does not exist.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        match fs::read_to_string(&paths.settings_path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CalError::Io(e)),
        }
    }

    pub fn save(&self, paths: &AppPaths) -> Result<()> {
        fs::create_dir_all(&paths.base_dir)?;
        fs::write(&paths.settings_path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base() {
        let paths = AppPaths::from_base(PathBuf::from("/tmp/test-postcal"));
        assert_eq!(paths.base_dir, PathBuf::from("/tmp/test-postcal"));
        assert_eq!(paths.db_path, PathBuf::from("/tmp/test-postcal/postcal.db"));
        assert_eq!(paths.blobs_dir, PathBuf::from("/tmp/test-postcal/storage"));
        assert_eq!(paths.mirror_path, PathBuf::from("/tmp/test-postcal/mirror.json"));
        assert_eq!(paths.settings_path, PathBuf::from("/tmp/test-postcal/settings.json"));
        assert_eq!(paths.log_file, PathBuf::from("/tmp/test-postcal/postcal.log"));
    }

    #[test]
    fn test_new_uses_dot_dir() {
        let paths = AppPaths::new();
        assert!(paths.base_dir.ends_with(".postcal"));
    }

    #[test]
    fn test_settings_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_base(dir.path().to_path_buf());
        assert_eq!(Settings::load(&paths).unwrap(), Settings::default());
    }

    #[test]
    fn test_settings_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_base(dir.path().join("nested"));
        let settings = Settings {
            company_name: "Studio Norte".into(),
            ..Default::default()
        };
        settings.save(&paths).unwrap();
        assert_eq!(Settings::load(&paths).unwrap(), settings);
    }

    #[test]
    fn test_settings_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_base(dir.path().to_path_buf());
        fs::write(&paths.settings_path, r#"{"companyName":"Acme"}"#).unwrap();
        let settings = Settings::load(&paths).unwrap();
        assert_eq!(settings.company_name, "Acme");
        assert_eq!(settings.public_base_url, DEFAULT_PUBLIC_BASE_URL);
    }
}
