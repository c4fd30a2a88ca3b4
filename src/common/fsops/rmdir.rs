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
use crate::common::folder::SemanticFolder;
use crate::common::fsops::existence::exists;
use crate::common::fsops::{load_folder, save_folder, user_visible_entries};
use crate::common::settings::Settings;
use crate::common::types::PathKind;
use std::path::Path;

/// Shared by `rmdir`'s tag branch and `rename`'s `convert_tag_to_folder`:
/// length-1 chains physically remove the (always-empty) tag directory and
/// drop the graph node, untagging every file that carried it; longer chains
/// only remove the arc from the chain's penultimate tag.
pub(crate) fn remove_tag(folder: &mut SemanticFolder, entry_physical: &Path, chain: &[String]) -> SemResult<()> {
    let last_tag = chain.last().expect("chain is non-empty");
    if chain.len() == 1 {
        std::fs::remove_dir(entry_physical.join(last_tag))?;
        folder.graph_mut().remove_node(last_tag)?;
        let affected: Vec<String> = folder
            .filetags()
            .files()
            .filter(|f| folder.filetags().has_tag(f, last_tag).unwrap_or(false))
            .cloned()
            .collect();
        for file in affected {
            folder.filetags_mut().discard_tag(&file, last_tag)?;
        }
    } else {
        let parent = &chain[chain.len() - 2];
        folder.graph_mut().remove_arc(parent, last_tag)?;
    }
    Ok(())
}

/// Implements §4.8's `rmdir` contract for every path kind.
pub fn rmdir(settings: &Settings, path: &Path) -> SemResult<()> {
    if !exists(settings, path) {
        return Err(SemanticFsError::NotFound(path.to_owned()));
    }

    let info = settings.pathinfo(path)?;

    match info.kind() {
        PathKind::Standard => {
            std::fs::remove_dir(settings.physical_path(path)?)?;
            Ok(())
        }
        PathKind::EntryPoint => {
            let physical = settings.physical_path(path)?;
            if !user_visible_entries(settings, &physical)?.is_empty() {
                return Err(SemanticFsError::NotEmpty(path.to_owned()));
            }
            let folder = load_folder(settings, path)?;
            std::fs::remove_file(settings.graph_file(&physical))?;
            std::fs::remove_file(settings.assoc_file(&physical))?;
            std::fs::remove_dir(&physical)?;
            drop(folder);
            Ok(())
        }
        PathKind::Tag => {
            let entry_physical = settings.physical_path(info.entrypoint())?;
            let mut folder = load_folder(settings, info.entrypoint())?;
            remove_tag(&mut folder, &entry_physical, info.tag_chain())?;
            save_folder(settings, &folder)
        }
        PathKind::TaggedObject => {
            let mut folder = load_folder(settings, info.entrypoint())?;
            let object_name = info.object_name();

            if info.tag_chain().is_empty() {
                let physical = settings.physical_path(path)?;
                std::fs::remove_dir(&physical)?;
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
    fn tag_rmdir_removes_node_and_untags_file() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/x"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_t1/x"), 0o755).unwrap();

        rmdir(&settings, Path::new("/_sem/_t1")).unwrap();

        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(!folder.graph().has_node("_t1"));
        assert!(folder.filetags().has_file("x"));
        assert!(!folder.filetags().has_tag("x", "_t1").unwrap());
        assert!(!ds.path().join("_sem/_t1").exists());
    }

    #[test]
    fn tag_rmdir_deep_chain_removes_only_arc() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_other"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_other/_t1"), 0o755).unwrap();

        rmdir(&settings, Path::new("/_sem/_other/_t1")).unwrap();

        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.graph().has_node("_t1"));
        assert!(!folder.graph().has_arc("_other", "_t1"));
    }

    #[test]
    fn entrypoint_rmdir_requires_user_empty() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/x"), 0o755).unwrap();
        assert!(rmdir(&settings, Path::new("/_sem")).is_err());

        rmdir(&settings, Path::new("/_sem/x")).unwrap();
        rmdir(&settings, Path::new("/_sem")).unwrap();
        assert!(!ds.path().join("_sem").exists());
    }
}
