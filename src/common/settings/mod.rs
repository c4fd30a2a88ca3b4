/*
 * semantic-fs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use super::constants;
use super::err::{SemResult, SemanticFsError};
use crate::common::mapper::DatastoreMapper;
use crate::common::types::PathInfo;
use directories::ProjectDirs;
use log::debug;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

pub mod config;

const TAG: &str = "settings";

/// `Settings` combines the resolved config (symbols, mount ownership) with
/// the two paths that are fixed for the lifetime of one mount: the
/// datastore root and the mountpoint. Unlike the teacher's multi-collection
/// `Settings`, this crate mounts exactly one datastore per process, so there
/// is no notion of a "current collection" to resolve.
pub struct Settings {
    config: RwLock<config::Config>,
    datastore_root: PathBuf,
    mountpoint: PathBuf,
}

impl Settings {
    pub fn new(datastore_root: PathBuf, mountpoint: PathBuf, cfg: config::Config) -> Self {
        Self {
            config: RwLock::new(cfg),
            datastore_root,
            mountpoint,
        }
    }

    /// Builds `Settings` the way `main.rs` does: compiled-in defaults,
    /// environment variables, then whatever CLI overrides are supplied as a
    /// `config::Source`.
    pub fn from_sources<T>(
        datastore_root: PathBuf,
        mountpoint: PathBuf,
        cli_overrides: T,
    ) -> Result<Self, Box<dyn std::error::Error>>
    where
        T: ::config::Source + Send + Sync + 'static,
    {
        let merged = config::build(cli_overrides);
        let cfg: config::Config = merged.try_into()?;
        Ok(Self::new(datastore_root, mountpoint, cfg))
    }

    pub fn get_config(&self) -> config::Config {
        self.config.read().clone()
    }

    pub fn datastore_root(&self) -> &Path {
        &self.datastore_root
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn semantic_prefix(&self) -> char {
        self.get_config().symbols.semantic_prefix
    }

    pub fn mapper(&self) -> DatastoreMapper<'_> {
        DatastoreMapper::new(&self.datastore_root, self.semantic_prefix())
    }

    pub fn pathinfo(&self, virtual_path: &Path) -> SemResult<PathInfo> {
        PathInfo::new(virtual_path, self.semantic_prefix())
    }

    pub fn physical_path(&self, virtual_path: &Path) -> SemResult<PathBuf> {
        self.mapper().physical_path(virtual_path)
    }

    pub fn graph_file(&self, entry_physical: &Path) -> PathBuf {
        entry_physical.join(self.get_config().symbols.graph_file_name())
    }

    pub fn assoc_file(&self, entry_physical: &Path) -> PathBuf {
        entry_physical.join(self.get_config().symbols.assoc_file_name())
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.get_config().symbols.is_reserved(name)
    }

    /// Rejects reserved names wherever the user is allowed to supply one:
    /// as an argument to `mkdir`, `create`, `rename`, etc.
    pub fn reject_reserved(&self, name: &str) -> SemResult<()> {
        if self.is_reserved(name) {
            Err(SemanticFsError::InvalidArgument(format!(
                "{} is a reserved name",
                name
            )))
        } else {
            Ok(())
        }
    }

    /// The directory `main.rs` looks for an optional `config.toml` override
    /// in, following the teacher's use of `directories::ProjectDirs`.
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from(constants::QUALIFIER, constants::ORG, constants::APP_NAME)
            .map(|d| d.config_dir().to_owned())
    }

    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }
}

pub fn ensure_dir(path: impl AsRef<Path>) -> std::io::Result<()> {
    debug!(target: TAG, "ensuring dir {} exists", path.as_ref().display());
    if !path.as_ref().exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::settings::config::HashMapSource;

    fn blank_settings() -> Settings {
        let source = HashMapSource(Default::default());
        Settings::from_sources(PathBuf::from("/ds"), PathBuf::from("/mnt"), source).unwrap()
    }

    #[test]
    fn default_prefix_is_underscore() {
        let s = blank_settings();
        assert_eq!(s.semantic_prefix(), '_');
    }

    #[test]
    fn reserved_names_rejected() {
        let s = blank_settings();
        let name = s.get_config().symbols.graph_file_name();
        assert!(s.reject_reserved(&name).is_err());
        assert!(s.reject_reserved("ordinary.txt").is_ok());
    }
}
