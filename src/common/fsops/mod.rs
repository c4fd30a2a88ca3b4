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

//! The mutation engine behind every write-shaped FUSE call: one file per
//! operation, mirroring §4.8 of the specification. Each function here is
//! pure with respect to process state — it loads the `SemanticFolder` it
//! needs, mutates it, performs the physical operation, and persists the
//! folder back out. The dispatcher in `fuse::fs` is the only caller.

pub mod create;
pub mod existence;
pub mod mkdir;
pub mod rename;
pub mod rmdir;
pub mod unlink;

use crate::common::err::{SemResult, SemanticFsError};
use crate::common::folder::SemanticFolder;
use crate::common::settings::Settings;
use log::debug;
use std::path::{Path, PathBuf};

const TAG: &str = "fsops";

/// Loads the `SemanticFolder` for the entry point at virtual path
/// `entry_virtual`. `entry_virtual` must already be known to exist
/// physically (callers check this via `existence` first).
pub fn load_folder(settings: &Settings, entry_virtual: &Path) -> SemResult<SemanticFolder> {
    let entry_physical = settings.physical_path(entry_virtual)?;
    debug!(target: TAG, "loading semantic folder at {}", entry_physical.display());
    let graph_file = settings.graph_file(&entry_physical);
    let assoc_file = settings.assoc_file(&entry_physical);
    SemanticFolder::from_files(&graph_file, &assoc_file, entry_virtual.to_owned())
}

pub fn save_folder(settings: &Settings, folder: &SemanticFolder) -> SemResult<()> {
    let entry_physical = settings.physical_path(folder.path())?;
    debug!(target: TAG, "persisting semantic folder at {}", entry_physical.display());
    let graph_file = settings.graph_file(&entry_physical);
    let assoc_file = settings.assoc_file(&entry_physical);
    folder.to_files(&graph_file, &assoc_file)
}

/// A directory's user-visible listing: everything except `.`, `..`, and the
/// two reserved metadata files. Used by `rmdir`'s "must be user-empty" check
/// on an entry point.
pub fn user_visible_entries(settings: &Settings, physical_dir: &Path) -> SemResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(physical_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| {
            SemanticFsError::InvalidArgument(format!("non-utf8 entry in {}", physical_dir.display()))
        })?;
        if !settings.is_reserved(name) {
            out.push(entry.path());
        }
    }
    Ok(out)
}
