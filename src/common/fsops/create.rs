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
use crate::common::fsops::existence::exists;
use crate::common::fsops::{load_folder, save_folder};
use crate::common::settings::Settings;
use crate::common::types::PathKind;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Implements §4.8's `mknod`/`create` contract: the tagged-mkdir logic of
/// `mkdir.rs`, generalized from directories to plain files. Returns the
/// physical path plus whether a fresh inode was created — the dispatcher
/// only seeds a new GhostFile and truncates it to 0 when it was, since a
/// second tag path onto an already-tagged file must not touch its bytes.
pub fn create(settings: &Settings, path: &Path) -> SemResult<(PathBuf, bool)> {
    if exists(settings, path) {
        return Err(SemanticFsError::Exists(path.to_owned()));
    }

    let info = settings.pathinfo(path)?;
    let name = crate::common::get_filename(path)?;
    settings.reject_reserved(name)?;

    match info.kind() {
        PathKind::Standard => {
            let physical = settings.physical_path(path)?;
            std::fs::File::create(&physical)?;
            Ok((physical, true))
        }
        PathKind::TaggedObject => {
            let mut folder = load_folder(settings, info.entrypoint())?;
            let object_name = info.object_name();
            let tags: HashSet<String> = info.tag_chain().iter().cloned().collect();
            let physical = settings.physical_path(path)?;

            let created = if folder.filetags().has_file(object_name) {
                folder.filetags_mut().assign_tags(object_name, &tags)?;
                false
            } else {
                std::fs::File::create(&physical)?;
                folder.filetags_mut().add_file(object_name, tags)?;
                true
            };
            save_folder(settings, &folder)?;
            Ok((physical, created))
        }
        PathKind::EntryPoint | PathKind::Tag => Err(SemanticFsError::NotSupported(format!(
            "cannot create a plain file at {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fsops::mkdir::mkdir;
    use crate::common::settings::config::HashMapSource;
    use tempfile::tempdir;

    fn settings(root: &Path) -> Settings {
        Settings::from_sources(root.to_owned(), PathBuf::from("/mnt"), HashMapSource(Default::default()))
            .unwrap()
    }

    #[test]
    fn standard_create_makes_empty_file() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        let (physical, created) = create(&settings, Path::new("/a")).unwrap();
        assert!(created);
        assert_eq!(physical, ds.path().join("a"));
        assert_eq!(std::fs::metadata(&physical).unwrap().len(), 0);
    }

    #[test]
    fn tagged_object_creates_and_registers() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();

        let (physical, created) = create(&settings, Path::new("/_sem/_t1/x")).unwrap();
        assert!(created);
        assert_eq!(physical, ds.path().join("_sem/x"));

        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.filetags().has_tag("x", "_t1").unwrap());
    }

    #[test]
    fn second_tag_path_onto_existing_file_does_not_recreate() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t2"), 0o755).unwrap();

        let (physical, _) = create(&settings, Path::new("/_sem/_t1/x")).unwrap();
        std::fs::write(&physical, b"hello").unwrap();

        let (physical2, created) = create(&settings, Path::new("/_sem/_t2/x")).unwrap();
        assert!(!created);
        assert_eq!(physical, physical2);
        assert_eq!(std::fs::read(&physical2).unwrap(), b"hello");
    }

    #[test]
    fn tag_and_entrypoint_reject_file_creation() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        assert!(create(&settings, Path::new("/_sem")).is_err());
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();
        assert!(create(&settings, Path::new("/_sem/_t1")).is_err());
    }
}
