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

use crate::common::fsops::load_folder;
use crate::common::settings::Settings;
use crate::common::types::semantic_subpaths;
use std::collections::HashSet;
use std::path::Path;

/// The full semantic existence predicate (§4.8): every semantic span along
/// `path` must check out — the tag chain must be a graph path in that
/// span's `SemanticFolder`, and a trailing object name must be a known,
/// correctly-tagged file — and the path must finally exist physically.
/// `rename`'s destination-existence rule and `getattr` both use this rather
/// than a bare physical `lstat`, since a tag path can "exist" semantically
/// at more than one physical location along the way.
pub fn exists(settings: &Settings, path: &Path) -> bool {
    for span in semantic_subpaths(path, settings.semantic_prefix()) {
        let folder = match load_folder(settings, &span.entrypoint) {
            Ok(f) => f,
            Err(_) => return false,
        };

        if !folder.graph().has_path(&span.tag_chain) {
            return false;
        }

        if !span.object_name.is_empty() {
            if !folder.filetags().has_file(&span.object_name) {
                return false;
            }
            let required: HashSet<String> = span.tag_chain.iter().cloned().collect();
            match folder.filetags().has_tags(&span.object_name, &required) {
                Ok(true) => {}
                _ => return false,
            }
        }
    }

    settings
        .physical_path(path)
        .map(|p| p.exists() || p.symlink_metadata().is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fsops::save_folder;
    use crate::common::settings::config::HashMapSource;
    use crate::common::settings::Settings;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn settings(root: &Path) -> Settings {
        Settings::from_sources(root.to_owned(), PathBuf::from("/mnt"), HashMapSource(Default::default()))
            .unwrap()
    }

    #[test]
    fn standard_path_checked_physically_only() {
        let ds = tempdir().unwrap();
        std::fs::create_dir_all(ds.path().join("a")).unwrap();
        let settings = settings(ds.path());
        assert!(exists(&settings, Path::new("/a")));
        assert!(!exists(&settings, Path::new("/missing")));
    }

    #[test]
    fn tagged_object_requires_registered_tags() {
        let ds = tempdir().unwrap();
        std::fs::create_dir_all(ds.path().join("sem")).unwrap();
        std::fs::write(ds.path().join("sem/x"), b"hi").unwrap();
        let settings = settings(ds.path());

        let mut folder = crate::common::folder::SemanticFolder::new(PathBuf::from("/sem"));
        folder.graph_mut().add_node("_t1").unwrap();
        let mut tags = HashSet::new();
        tags.insert("_t1".to_string());
        folder.filetags_mut().add_file("x", tags).unwrap();
        save_folder(&settings, &folder).unwrap();

        assert!(exists(&settings, Path::new("/sem/x")));
        assert!(exists(&settings, Path::new("/sem/_t1/x")));
        assert!(!exists(&settings, Path::new("/sem/_t2/x")));
    }
}
