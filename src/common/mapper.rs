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

use crate::common::err::{SemResult, SemanticFsError};
use crate::common::types::is_semantic_name;
use std::path::{Path, PathBuf};

/// Maps a virtual path to the physical path under the datastore root where
/// that object actually lives.
///
/// Every distinct tag gets exactly one physical directory, created once,
/// directly under its entry point — never nested, no matter how deep the tag
/// chain that reaches it. A tagged file likewise lives directly under its
/// entry point. This is what makes tagging two names for the same object
/// rather than two copies of it: the mapping collapses any run of adjacent
/// semantic components down to the last one before appending the next
/// component, so every route through a tag chain to a given object resolves
/// to the same physical path. The first two path components (the root
/// segment and the first real directory under it) are never subject to this
/// collapsing.
pub struct DatastoreMapper<'a> {
    root: &'a Path,
    prefix: char,
}

impl<'a> DatastoreMapper<'a> {
    pub fn new(root: &'a Path, prefix: char) -> Self {
        Self { root, prefix }
    }

    pub fn physical_path(&self, virtual_path: &Path) -> SemResult<PathBuf> {
        if !virtual_path.is_absolute() {
            return Err(SemanticFsError::InvalidArgument(format!(
                "virtual path must be absolute: {}",
                virtual_path.display()
            )));
        }

        let components: Vec<String> = virtual_path
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(os) => os.to_str().map(ToOwned::to_owned),
                _ => None,
            })
            .collect();

        // Mirrors the root placeholder at index 0 of a `str.split(os.sep)`
        // split of an absolute path, so the "first two components" rule
        // lines up exactly with the scan below.
        let mut tmp: Vec<String> = vec![String::new()];
        if let Some(first) = components.first() {
            tmp.push(first.clone());
        }

        for name in components.iter().skip(1) {
            if tmp.len() >= 2 {
                let a = &tmp[tmp.len() - 2];
                let b = &tmp[tmp.len() - 1];
                if is_semantic_name(a, self.prefix) && is_semantic_name(b, self.prefix) {
                    tmp.pop();
                }
            }
            tmp.push(name.clone());
        }

        let mut out = self.root.to_owned();
        for part in tmp.iter().skip(1) {
            out.push(part);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_datastore_root() {
        let root = Path::new("/ds");
        let m = DatastoreMapper::new(root, '_');
        assert_eq!(m.physical_path(Path::new("/")).unwrap(), root);
    }

    #[test]
    fn standard_path_is_unchanged() {
        let m = DatastoreMapper::new(Path::new("/ds"), '_');
        assert_eq!(
            m.physical_path(Path::new("/a/b/c")).unwrap(),
            Path::new("/ds/a/b/c")
        );
    }

    #[test]
    fn tagged_file_collapses_tag_chain() {
        let m = DatastoreMapper::new(Path::new("/ds"), '_');
        assert_eq!(
            m.physical_path(Path::new("/a/_b/_c/x")).unwrap(),
            Path::new("/ds/a/_b/x")
        );
    }

    #[test]
    fn entrypoint_only_is_preserved() {
        let m = DatastoreMapper::new(Path::new("/ds"), '_');
        assert_eq!(
            m.physical_path(Path::new("/a/_b")).unwrap(),
            Path::new("/ds/a/_b")
        );
    }

    #[test]
    fn deep_tag_chain_collapses_to_last_tag() {
        let m = DatastoreMapper::new(Path::new("/ds"), '_');
        assert_eq!(
            m.physical_path(Path::new("/a/_b/_c/_d")).unwrap(),
            Path::new("/ds/a/_b/_d")
        );
    }

    #[test]
    fn relative_path_is_rejected() {
        let m = DatastoreMapper::new(Path::new("/ds"), '_');
        assert!(m.physical_path(Path::new("a/b")).is_err());
    }
}
