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
use std::path::Path;

/// Implements §4.8's `unlink` contract for every path kind.
pub fn unlink(settings: &Settings, path: &Path) -> SemResult<()> {
    if !exists(settings, path) {
        return Err(SemanticFsError::NotFound(path.to_owned()));
    }

    let info = settings.pathinfo(path)?;

    match info.kind() {
        PathKind::Standard => {
            std::fs::remove_file(settings.physical_path(path)?)?;
            Ok(())
        }
        PathKind::EntryPoint | PathKind::Tag => Err(SemanticFsError::IsDirectory(path.to_owned())),
        PathKind::TaggedObject => {
            let mut folder = load_folder(settings, info.entrypoint())?;
            let object_name = info.object_name();

            if info.tag_chain().is_empty() {
                std::fs::remove_file(settings.physical_path(path)?)?;
                folder.filetags_mut().remove_file(object_name)?;
            } else {
                let last_tag = info.last_tag().expect("non-empty chain checked above");
                folder.filetags_mut().discard_tag(object_name, last_tag)?;
            }
            save_folder(settings, &folder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fsops::mkdir::mkdir;
    use crate::common::settings::config::HashMapSource;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn settings(root: &Path) -> Settings {
        Settings::from_sources(root.to_owned(), PathBuf::from("/mnt"), HashMapSource(Default::default()))
            .unwrap()
    }

    #[test]
    fn tag_and_entrypoint_unlink_rejected() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();
        assert!(unlink(&settings, Path::new("/_sem")).is_err());
        assert!(unlink(&settings, Path::new("/_sem/_t1")).is_err());
    }

    #[test]
    fn chain_empty_unlink_removes_physical_and_metadata() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        std::fs::write(ds.path().join("_sem/x"), b"hi").unwrap();

        let mut folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        folder.filetags_mut().add_file("x", Default::default()).unwrap();
        save_folder(&settings, &folder).unwrap();

        unlink(&settings, Path::new("/_sem/x")).unwrap();
        assert!(!ds.path().join("_sem/x").exists());
        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(!folder.filetags().has_file("x"));
    }

    #[test]
    fn chain_nonempty_unlink_only_discards_tag() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();
        std::fs::write(ds.path().join("_sem/x"), b"hi").unwrap();

        let mut folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        let mut tags = std::collections::HashSet::new();
        tags.insert("_t1".to_string());
        folder.filetags_mut().add_file("x", tags).unwrap();
        save_folder(&settings, &folder).unwrap();

        unlink(&settings, Path::new("/_sem/_t1/x")).unwrap();
        assert!(ds.path().join("_sem/x").exists());
        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.filetags().has_file("x"));
        assert!(!folder.filetags().has_tag("x", "_t1").unwrap());
    }
}
