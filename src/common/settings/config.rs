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
use crate::common::constants;
use crate::common::types::file_perms::Permissions;
use ::config::{ConfigError, Source, Value};
use libc::{gid_t, uid_t};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HashMapSource(pub HashMap<String, config::Value>);

impl config::Source for HashMapSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Mount-wide ownership and permission defaults, reported for the mount
/// root and used as the fallback `getattr` answer wherever the host
/// filesystem doesn't have a more specific opinion.
#[derive(Serialize, Deserialize, Clone)]
pub struct Mount {
    pub uid: uid_t,
    pub gid: gid_t,
    pub permissions: Permissions,
}

/// The semantic prefix is configuration (§3): whether a path component is a
/// tag, entry point, or reserved metadata filename is derived entirely from
/// this one character.
#[derive(Serialize, Deserialize, Clone)]
pub struct Symbols {
    pub semantic_prefix: char,
}

impl Symbols {
    pub fn is_semantic(&self, name: &str) -> bool {
        name.starts_with(self.semantic_prefix)
    }

    pub fn graph_file_name(&self) -> String {
        format!("{}{}", self.semantic_prefix, constants::GRAPH_FILE_SUFFIX)
    }

    pub fn assoc_file_name(&self) -> String {
        format!("{}{}", self.semantic_prefix, constants::ASSOC_FILE_SUFFIX)
    }

    /// §3 invariant 4: reserved filenames never appear in a `readdir` and
    /// are never accepted as a user-supplied name.
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.graph_file_name() || name == self.assoc_file_name()
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    pub symbols: Symbols,
    pub mount: Mount,
}

/// Builds a config by layering, lowest to highest priority: compiled-in
/// defaults, environment variables prefixed `SEMFS_`, and whatever `source`
/// the caller supplies (CLI overrides).
pub fn build<T>(source: T) -> ::config::Config
where
    T: config::Source + Send + Sync + 'static,
{
    let mut merged_config = config::Config::new();

    merged_config
        .merge(config::File::from_str(
            constants::DEFAULT_CONFIG_TOML,
            config::FileFormat::Toml,
        ))
        .expect("unable to merge default config")
        .merge(config::Environment::with_prefix(constants::ENV_PREFIX))
        .expect("unable to merge settings from environment variables")
        .merge(source)
        .expect("unable to merge CLI-supplied config");

    merged_config
}
