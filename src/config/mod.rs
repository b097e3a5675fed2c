mod file_config;

pub use file_config::{FileConfig, ReconcilerConfig, ScheduleConfig};

use crate::reconciler::{DEFAULT_MAX_CONCURRENT_CHECKS, DEFAULT_PROBE_BYTES};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub icloud_container: Option<PathBuf>,
    pub documents_dir: Option<PathBuf>,
    pub document_picker_bookmarks: Option<PathBuf>,
    pub share_extension_bookmarks: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// App-managed roots; tracks under these are internal.
    pub icloud_container: Option<PathBuf>,
    pub documents_dir: Option<PathBuf>,
    pub document_picker_bookmarks: Option<PathBuf>,
    pub share_extension_bookmarks: Option<PathBuf>,

    pub reconciler: ReconcilerConfigSettings,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfigSettings {
    pub max_concurrent_checks: usize,
    pub probe_bytes: usize,
}

impl Default for ReconcilerConfigSettings {
    fn default() -> Self {
        Self {
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            probe_bytes: DEFAULT_PROBE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub interval_secs: u64,
    pub run_on_startup: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_startup: true,
        }
    }
}

impl ScheduleSettings {
    /// `None` when periodic sweeps are disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let icloud_container = file
            .icloud_container
            .map(PathBuf::from)
            .or_else(|| cli.icloud_container.clone());
        let documents_dir = file
            .documents_dir
            .map(PathBuf::from)
            .or_else(|| cli.documents_dir.clone());
        if icloud_container.is_none() && documents_dir.is_none() {
            bail!(
                "At least one of icloud_container or documents_dir must be specified via CLI or in config file"
            );
        }

        let document_picker_bookmarks = file
            .document_picker_bookmarks
            .map(PathBuf::from)
            .or_else(|| cli.document_picker_bookmarks.clone());
        let share_extension_bookmarks = file
            .share_extension_bookmarks
            .map(PathBuf::from)
            .or_else(|| cli.share_extension_bookmarks.clone());

        let reconciler_file = file.reconciler.unwrap_or_default();
        let reconciler = ReconcilerConfigSettings {
            max_concurrent_checks: reconciler_file
                .max_concurrent_checks
                .unwrap_or(DEFAULT_MAX_CONCURRENT_CHECKS),
            probe_bytes: reconciler_file.probe_bytes.unwrap_or(DEFAULT_PROBE_BYTES),
        };
        if reconciler.max_concurrent_checks == 0 {
            bail!("reconciler.max_concurrent_checks must be at least 1");
        }
        if reconciler.probe_bytes == 0 {
            bail!("reconciler.probe_bytes must be at least 1");
        }

        let schedule_file = file.schedule.unwrap_or_default();
        let defaults = ScheduleSettings::default();
        let schedule = ScheduleSettings {
            interval_secs: schedule_file
                .interval_secs
                .unwrap_or(defaults.interval_secs),
            run_on_startup: schedule_file
                .run_on_startup
                .unwrap_or(defaults.run_on_startup),
        };

        Ok(Self {
            db_path,
            icloud_container,
            documents_dir,
            document_picker_bookmarks,
            share_extension_bookmarks,
            reconciler,
            schedule,
        })
    }

    pub fn internal_roots(&self) -> Vec<PathBuf> {
        self.icloud_container
            .iter()
            .chain(self.documents_dir.iter())
            .cloned()
            .collect()
    }
}
