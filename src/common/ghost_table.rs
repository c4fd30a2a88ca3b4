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

use crate::common::err::SemResult;
use crate::common::ghost::GhostFile;
use fuse_sys::off_t;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::io::{FromRawFd, RawFd};
use std::path::{Path, PathBuf};

const TAG: &str = "ghost_table";

/// Identity of one logical write session: the physical file plus the
/// normalized virtual path used to reach it. Two different tag paths to the
/// same physical file get distinct entries, so their ghost sessions can
/// diverge independently — see §4.7's last-committer-wins note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GhostKey {
    pub physical: PathBuf,
    pub virtual_path: PathBuf,
}

struct Entry {
    ghost: Mutex<GhostFile>,
    refcount: usize,
}

/// Process-wide `(physical-path, normalized-virtual-path) -> (GhostFile,
/// refcount)` map, plus the set of write-open file descriptors that own a
/// ghost. This is deliberately the *only* mutable process-wide state in the
/// crate (§9 design notes): it is owned by the dispatcher and never exposed
/// globally.
#[derive(Default)]
pub struct GhostTable {
    entries: Mutex<HashMap<GhostKey, Entry>>,
    write_fds: Mutex<HashMap<RawFd, GhostKey>>,
}

impl GhostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference to the ghost for `key`, creating it from the
    /// on-disk file at `physical` if this is the first writer. Call once
    /// per write-intent `open`/`create`.
    pub fn acquire(&self, key: GhostKey, fd: RawFd) -> SemResult<()> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.refcount += 1;
            }
            None => {
                debug!(target: TAG, "creating ghost for {:?}", key);
                let ghost = GhostFile::new(&key.physical)?;
                entries.insert(
                    key.clone(),
                    Entry {
                        ghost: Mutex::new(ghost),
                        refcount: 1,
                    },
                );
            }
        }
        self.write_fds.lock().insert(fd, key);
        Ok(())
    }

    /// Whether `fd` was opened through `acquire` and so owns a ghost. Close
    /// of a descriptor that never went through `acquire` bypasses commit,
    /// exactly as §4.6 specifies.
    pub fn is_write_fd(&self, fd: RawFd) -> bool {
        self.write_fds.lock().contains_key(&fd)
    }

    pub fn key_for_virtual(&self, virtual_path: &Path) -> Option<GhostKey> {
        let entries = self.entries.lock();
        entries.keys().find(|k| k.virtual_path == virtual_path).cloned()
    }

    pub fn with_ghost<T>(&self, key: &GhostKey, f: impl FnOnce(&mut GhostFile) -> T) -> Option<T> {
        let entries = self.entries.lock();
        entries.get(key).map(|entry| f(&mut entry.ghost.lock()))
    }

    pub fn truncate(&self, key: &GhostKey, length: u64) -> bool {
        self.with_ghost(key, |g| g.truncate(length)).is_some()
    }

    pub fn size(&self, key: &GhostKey) -> Option<u64> {
        self.with_ghost(key, |g| g.size())
    }

    /// Commits the ghost for `fd` (if it owns one) and drops the reference.
    /// Destroys the ghost once the refcount reaches zero, exactly as §4.6's
    /// `release` contract describes.
    pub fn release(&self, fd: RawFd) -> SemResult<()> {
        let key = match self.write_fds.lock().remove(&fd) {
            Some(k) => k,
            None => return Ok(()),
        };

        let fh = unsafe { std::fs::File::from_raw_fd(fd) };

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            entry.ghost.lock().apply(&fh)?;
        }

        if let Some(entry) = entries.get_mut(&key) {
            entry.refcount -= 1;
            if entry.refcount == 0 {
                debug!(target: TAG, "destroying ghost for {:?}", key);
                entries.remove(&key);
            }
        }
        Ok(())
    }

    pub fn read(&self, key: &GhostKey, length: u64, offset: off_t, fh: &std::fs::File) -> Option<SemResult<Vec<u8>>> {
        self.with_ghost(key, |g| g.read(length, offset as u64, fh))
    }

    pub fn write(&self, key: &GhostKey, buf: &[u8], offset: off_t, fh: &std::fs::File) -> Option<SemResult<usize>> {
        self.with_ghost(key, |g| g.write(buf, offset as u64, fh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_virtual_paths_to_same_physical_are_distinct_keys() {
        let k1 = GhostKey {
            physical: PathBuf::from("/ds/sem/x"),
            virtual_path: PathBuf::from("/sem/x"),
        };
        let k2 = GhostKey {
            physical: PathBuf::from("/ds/sem/x"),
            virtual_path: PathBuf::from("/sem/_t1/x"),
        };
        assert_ne!(k1, k2);
    }
}
