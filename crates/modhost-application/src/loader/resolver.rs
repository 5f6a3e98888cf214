//! Dependency and asset resolution
//!
//! Both resolvers probe an ordered list of directories and take the first
//! match. A unit's dependencies are looked up next to the unit first, then in
//! the host-shared dependency paths.

use std::path::{Path, PathBuf};

use modhost_domain::{Error, Result};

/// Resolves a unit's dependencies, scoped to the unit's own directory
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    unit_dir: PathBuf,
    shared_paths: Vec<PathBuf>,
}

impl DependencyResolver {
    pub fn new(unit_dir: impl Into<PathBuf>, shared_paths: Vec<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            shared_paths,
        }
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    /// Locations probed for `dependency`, in order
    pub fn probe_order(&self, dependency: &str) -> Vec<PathBuf> {
        std::iter::once(&self.unit_dir)
            .chain(&self.shared_paths)
            .map(|dir| dir.join(dependency))
            .collect()
    }

    /// First existing location of `dependency`
    ///
    /// Fails with `DependencyResolution`, listing every probed location.
    pub fn resolve(&self, unit: &str, dependency: &str) -> Result<PathBuf> {
        let probed = self.probe_order(dependency);
        if let Some(found) = probed.iter().find(|candidate| candidate.exists()) {
            return Ok(found.clone());
        }

        let diagnostic = probed
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::dependency_resolution(
            unit,
            dependency,
            format!("not found in: {diagnostic}"),
        ))
    }
}

/// Resolves module asset files
///
/// The module's assets directory is used when configured and present;
/// otherwise the host's module search paths are probed.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    assets_dir: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl AssetResolver {
    pub fn new(assets_dir: Option<PathBuf>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            assets_dir,
            search_paths,
        }
    }

    /// Directories probed, in order
    pub fn directories(&self) -> Vec<&Path> {
        match &self.assets_dir {
            Some(dir) if dir.is_dir() => vec![dir.as_path()],
            _ => self.search_paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    /// First match of `name`
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        self.directories()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::not_found(format!("asset '{name}'")))
    }
}
