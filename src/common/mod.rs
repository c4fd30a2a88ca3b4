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

use crate::common::constants::VERSION;
use nix::sys::stat::stat;
use std::path::Path;

pub mod constants;
pub mod err;
pub mod file_tag_map;
pub mod folder;
pub mod fsops;
pub mod ghost;
pub mod ghost_table;
pub mod graph;
pub mod log;
pub mod mapper;
pub mod settings;
pub mod types;

/// Takes a physical path and gets the device and inode nums, used by
/// `getattr` to answer a `stat` call and by the ghost table to key physical
/// identity independent of which virtual path reached it.
pub fn get_device_inode(path: &Path) -> err::SemResult<(u64, u64)> {
    let st = stat(path)?;
    // on macos, st_dev is a i32.
    let dev = st.st_dev as u64;
    Ok((dev, st.st_ino))
}

pub fn get_filename(path: &Path) -> err::SemResult<&str> {
    path.components()
        .last()
        .ok_or_else(|| err::SemanticFsError::InvalidArgument(format!("no filename in {}", path.display())))?
        .as_os_str()
        .to_str()
        .ok_or_else(|| err::SemanticFsError::InvalidArgument(format!("non-utf8 filename in {}", path.display())))
}

pub fn version_str() -> String {
    format!("{}.{}.{}", VERSION.0, VERSION.1, VERSION.2)
}
