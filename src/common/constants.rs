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

pub const VERSION: (&str, &str, &str) = (
    env!("CARGO_PKG_VERSION_MAJOR"),
    env!("CARGO_PKG_VERSION_MINOR"),
    env!("CARGO_PKG_VERSION_PATCH"),
);
pub const ENV_PREFIX: &str = "SEMFS";
pub const APP_NAME: &str = "semantic-fs";
pub const ORG: &str = "io.semantic-fs";
pub const QUALIFIER: &str = "io";

/// The character that marks a path component as semantic (entry point, tag,
/// or reserved metadata file). Configurable, but this is the default.
pub const DEFAULT_SEMANTIC_PREFIX: char = '_';

/// Reserved filenames, stored inside each entry point's physical directory.
/// Built from the configured semantic prefix at runtime; these are the
/// defaults assuming the default prefix.
pub const GRAPH_FILE_SUFFIX: &str = "$$_SEMANTIC_FS_GRAPH_FILE_$$";
pub const ASSOC_FILE_SUFFIX: &str = "$$_SEMANTIC_FS_ASSOC_FILE_$$";

/// Version byte prefixing both serialized SemanticFolder blobs. Bump this if
/// the on-disk record layout ever changes incompatibly.
pub const FOLDER_FORMAT_VERSION: u8 = 1;

pub const DEFAULT_CONFIG_TOML: &str = r###"
[symbols]
semantic_prefix = "_"

[mount]
uid = 0
gid = 0
permissions = "755"
"###;

// https://github.com/torvalds/linux/blob/master/Documentation/admin-guide/devices.txt
// 60-63 LOCAL/EXPERIMENTAL USE
pub const DEVICE_ID: u64 = 63;
