//! Choice of durable destination directory.

use std::fmt;
use std::path::{Path, PathBuf};

use fs_err as fs;

/// Which configured directory a resolution landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Removable media (e.g. the USB drive)
    Primary,
    /// Backup directory, used when the primary is not mounted
    Secondary,
    /// Local directory, used when neither of the above is available
    Fallback,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDir {
    pub destination: Destination,
    pub dir: PathBuf,
}

/// Resolves the durable directory from the current filesystem state.
///
/// Nothing is cached: removable media can appear or disappear between
/// two calls and each call reflects what is mounted right now.
#[derive(Debug, Clone)]
pub struct PathResolver {
    primary: PathBuf,
    secondary: Option<PathBuf>,
    fallback: PathBuf,
    create_primary: bool,
}

impl PathResolver {
    pub fn new(
        primary: impl Into<PathBuf>,
        secondary: Option<PathBuf>,
        fallback: impl Into<PathBuf>,
    ) -> Self {
        Self {
            primary: primary.into(),
            secondary,
            fallback: fallback.into(),
            create_primary: false,
        }
    }

    /// Create the primary directory when it is missing but its parent
    /// (the mount point) is present. Secondary and fallback directories
    /// are never created.
    pub fn with_create_primary(mut self, create: bool) -> Self {
        self.create_primary = create;
        self
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Path> {
        self.secondary.as_deref()
    }

    pub fn fallback(&self) -> &Path {
        &self.fallback
    }

    pub fn resolve(&self) -> ResolvedDir {
        if self.primary_available() {
            return ResolvedDir {
                destination: Destination::Primary,
                dir: self.primary.clone(),
            };
        }
        if let Some(backup) = self.backup_dir() {
            return ResolvedDir {
                destination: Destination::Secondary,
                dir: backup.to_path_buf(),
            };
        }
        ResolvedDir {
            destination: Destination::Fallback,
            dir: self.fallback.clone(),
        }
    }

    /// The secondary directory, only if it is currently accessible.
    pub fn backup_dir(&self) -> Option<&Path> {
        self.secondary.as_deref().filter(|dir| dir.is_dir())
    }

    fn primary_available(&self) -> bool {
        if self.primary.is_dir() {
            return true;
        }
        if !self.create_primary {
            return false;
        }
        let Some(parent) = self.primary.parent().filter(|p| p.is_dir()) else {
            return false;
        };
        match fs::create_dir_all(&self.primary) {
            Ok(()) => {
                tracing::info!(
                    dir = %self.primary.display(),
                    mount = %parent.display(),
                    "created primary directory"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    dir = %self.primary.display(),
                    error = %e,
                    "primary directory could not be created"
                );
                false
            }
        }
    }
}
