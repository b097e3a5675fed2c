use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub icloud_container: Option<String>,
    pub documents_dir: Option<String>,
    pub document_picker_bookmarks: Option<String>,
    pub share_extension_bookmarks: Option<String>,

    // Feature configs
    pub reconciler: Option<ReconcilerConfig>,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub max_concurrent_checks: Option<usize>,
    pub probe_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between periodic sweeps; 0 disables them.
    pub interval_secs: Option<u64>,
    pub run_on_startup: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
db_path = "/data/catalog.db"
documents_dir = "/data/Documents"
share_extension_bookmarks = "/data/share.json"

[reconciler]
max_concurrent_checks = 8

[schedule]
interval_secs = 0
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("/data/catalog.db"));
        assert_eq!(config.documents_dir.as_deref(), Some("/data/Documents"));
        assert!(config.icloud_container.is_none());
        assert_eq!(config.reconciler.unwrap().max_concurrent_checks, Some(8));
        let schedule = config.schedule.unwrap();
        assert_eq!(schedule.interval_secs, Some(0));
        assert!(schedule.run_on_startup.is_none());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "db_path = [").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        assert!(FileConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
