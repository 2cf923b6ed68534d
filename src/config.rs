//! Configuration loading.
//!
//! The configuration is a TOML file with three tables:
//!
//! ```toml
//! [log]
//! filename = "detection.csv"     # base name of the durable snapshots
//! working_path = "temp.csv"      # the working log, truncated at start
//!
//! [replication]
//! primary_dir = "/media/usb/csv" # removable media
//! backup_dir = "/srv/occupancy"  # optional
//! fallback_dir = "."
//! period_secs = 60
//! copy_timeout_secs = 30
//!
//! [annotation]                   # only for frames given to OccupancyPipeline::process_frame
//! enabled = true
//! caption = "Entrance camera"
//! ```
//!
//! Every key is optional. A missing file yields the defaults, matching the
//! behavior of running without a config at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{OccupancyError, Result};
use crate::integration::FrameAnnotator;
use crate::occupancy::Timestamp;
use crate::persistence::{PathResolver, ReplicatorConfig, snapshot_file_name};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyConfig {
    pub log: LogConfig,
    pub replication: ReplicationConfig,
    pub annotation: AnnotationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filename: String,
    pub working_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filename: "detection.csv".to_string(),
            working_path: PathBuf::from("temp.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub primary_dir: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub fallback_dir: PathBuf,
    pub period_secs: u64,
    pub copy_timeout_secs: u64,
    pub create_primary: bool,
    pub replicate_on_start: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            primary_dir: PathBuf::from("/media/usb/csv"),
            backup_dir: None,
            fallback_dir: PathBuf::from("."),
            period_secs: 60,
            copy_timeout_secs: 30,
            create_primary: false,
            replicate_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub enabled: bool,
    pub caption: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            caption: String::new(),
        }
    }
}

impl OccupancyConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(OccupancyError::Io {
                    context: format!("reading config {}", path.display()),
                    source,
                });
            }
        };

        let config = Self::from_toml(&content).map_err(|e| match e {
            OccupancyError::ConfigMalformed { details, .. } => OccupancyError::ConfigMalformed {
                path: path.to_path_buf(),
                details,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| OccupancyError::ConfigMalformed {
            path: PathBuf::new(),
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log.filename.trim().is_empty() {
            return Err(OccupancyError::ConfigInvalid("log.filename must not be empty".into()));
        }
        if self.replication.period_secs == 0 {
            return Err(OccupancyError::ConfigInvalid(
                "replication.period_secs must be positive".into(),
            ));
        }
        if self.replication.copy_timeout_secs == 0 {
            return Err(OccupancyError::ConfigInvalid(
                "replication.copy_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn path_resolver(&self) -> PathResolver {
        let r = &self.replication;
        PathResolver::new(&r.primary_dir, r.backup_dir.clone(), &r.fallback_dir)
            .with_create_primary(r.create_primary)
    }

    /// Replicator settings for a process started at `started`.
    pub fn replicator_config(&self, started: Timestamp) -> ReplicatorConfig {
        ReplicatorConfig {
            working_log: self.log.working_path.clone(),
            snapshot_name: snapshot_file_name(&self.log.filename, started),
            period: Duration::from_secs(self.replication.period_secs),
            copy_timeout: Duration::from_secs(self.replication.copy_timeout_secs),
            replicate_on_start: self.replication.replicate_on_start,
        }
    }

    pub fn annotator(&self) -> Option<FrameAnnotator> {
        self.annotation
            .enabled
            .then(|| FrameAnnotator::new(self.annotation.caption.clone()))
    }
}
