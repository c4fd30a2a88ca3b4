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
use crate::common::fsops::existence::exists;
use crate::common::ghost_table::GhostKey;
use crate::fuse::util::lstat_to_fuse;
use fuse_sys::{stat, FuseResult, Request};
use std::path::Path;

impl TagFilesystem {
    /// §4.8 getattr: a physical `lstat` with the size overridden by any live
    /// GhostFile for this path. The override is the only way a writer's
    /// buffered truncate/write is visible to a concurrent `stat` before
    /// `release` commits it.
    pub(super) fn getattr_impl(&self, _req: &Request, path: &Path) -> FuseResult<stat> {
        if !exists(&self.settings, path) {
            return Err(SemanticFsError::NotFound(path.to_owned()).into());
        }

        let physical = self.settings.physical_path(path)?;
        let size_override = self.ghosts.key_for_virtual(path).and_then(|key: GhostKey| self.ghosts.size(&key));

        Ok(lstat_to_fuse(&physical, size_override)?)
    }
}
