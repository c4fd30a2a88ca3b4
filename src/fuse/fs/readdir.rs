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

use super::TagFilesystem;
use crate::common::err::SemanticFsError;
use crate::common::fsops::{existence::exists, load_folder, user_visible_entries};
use crate::common::types::PathKind;
use chrono::{DateTime, Utc};
use fuse_sys::{FileEntry, FuseResult, Request};
use std::collections::HashSet;
use std::path::Path;

fn mtime_of(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|md| md.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

impl TagFilesystem {
    /// §4.8 readdir: dispatches on path kind. Every listing is prefixed with
    /// `.`/`..` by the caller (`readdir_common`, left at its default); this
    /// only returns the kind-specific entries.
    pub(super) fn readdir_impl(&self, _req: &Request, path: &Path) -> FuseResult<Box<dyn Iterator<Item = FileEntry>>> {
        if !exists(&self.settings, path) {
            return Err(SemanticFsError::NotFound(path.to_owned()).into());
        }

        let info = self.settings.pathinfo(path)?;
        let mut entries = Vec::new();

        match info.kind() {
            PathKind::Standard => {
                let physical = self.settings.physical_path(path)?;
                for entry in std::fs::read_dir(&physical)? {
                    let entry = entry?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let mtime = mtime_of(&entry.path());
                    entries.push(FileEntry { name, mtime });
                }
            }
            PathKind::EntryPoint => {
                let physical = self.settings.physical_path(path)?;
                for child in user_visible_entries(&self.settings, &physical)? {
                    let name = child
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    entries.push(FileEntry {
                        name,
                        mtime: mtime_of(&child),
                    });
                }
            }
            PathKind::Tag => {
                let folder = load_folder(&self.settings, info.entrypoint())?;
                let last_tag = info.last_tag().expect("tag kind has non-empty chain");
                let entry_physical = self.settings.physical_path(info.entrypoint())?;
                let chain: HashSet<String> = info.tag_chain().iter().cloned().collect();

                for out in folder.graph().outgoing_arcs(last_tag)? {
                    if chain.contains(out) || self.settings.is_reserved(out) {
                        continue;
                    }
                    entries.push(FileEntry {
                        name: out.clone(),
                        mtime: mtime_of(&entry_physical.join(out)),
                    });
                }

                for filename in folder.filetags().tagged_files(&chain) {
                    if self.settings.is_reserved(filename) {
                        continue;
                    }
                    entries.push(FileEntry {
                        name: filename.clone(),
                        mtime: mtime_of(&entry_physical.join(filename)),
                    });
                }
            }
            PathKind::TaggedObject => {
                return Err(SemanticFsError::NotADirectory(path.to_owned()).into());
            }
        }

        Ok(Box::new(entries.into_iter()))
    }
}
