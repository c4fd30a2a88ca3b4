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
use libc::mode_t;
use std::collections::HashSet;
use std::path::Path;

/// Implements §4.8's `mkdir` contract for every path kind.
pub fn mkdir(settings: &Settings, path: &Path, mode: mode_t) -> SemResult<()> {
    if exists(settings, path) {
        return Err(SemanticFsError::Exists(path.to_owned()));
    }

    let info = settings.pathinfo(path)?;
    if !info.is_standard() {
        let name = crate::common::get_filename(path)?;
        settings.reject_reserved(name)?;
    }

    match info.kind() {
        PathKind::Standard => {
            std::fs::create_dir(settings.physical_path(path)?)?;
            set_mode(&settings.physical_path(path)?, mode);
            Ok(())
        }
        PathKind::EntryPoint => {
            let physical = settings.physical_path(path)?;
            std::fs::create_dir(&physical)?;
            set_mode(&physical, mode);
            let folder = crate::common::folder::SemanticFolder::new(path.to_owned());
            save_folder(settings, &folder)?;
            Ok(())
        }
        PathKind::Tag => {
            let last_tag = info.last_tag().expect("tag kind has non-empty chain").to_owned();
            let chain = info.tag_chain();

            if chain[..chain.len() - 1].contains(&last_tag) {
                return Err(SemanticFsError::Exists(path.to_owned()));
            }

            let mut folder = load_folder(settings, info.entrypoint())?;
            if !folder.graph().has_node(&last_tag) {
                let tag_physical = settings.physical_path(path)?;
                std::fs::create_dir(&tag_physical)?;
                set_mode(&tag_physical, mode);
                folder.graph_mut().add_node(&last_tag)?;
            }
            if chain.len() >= 2 {
                let parent = &chain[chain.len() - 2];
                if !folder.graph().has_arc(parent, &last_tag) {
                    folder.graph_mut().add_arc(parent, &last_tag)?;
                }
            }
            save_folder(settings, &folder)
        }
        PathKind::TaggedObject => {
            let mut folder = load_folder(settings, info.entrypoint())?;
            let object_name = info.object_name();
            let tags: HashSet<String> = info.tag_chain().iter().cloned().collect();

            if folder.filetags().has_file(object_name) {
                folder.filetags_mut().assign_tags(object_name, &tags)?;
            } else {
                let physical = settings.physical_path(path)?;
                std::fs::create_dir(&physical)?;
                set_mode(&physical, mode);
                folder.filetags_mut().add_file(object_name, tags)?;
            }
            save_folder(settings, &folder)
        }
    }
}

fn set_mode(path: &Path, mode: mode_t) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(mode);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::settings::config::HashMapSource;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn settings(root: &Path) -> Settings {
        Settings::from_sources(root.to_owned(), PathBuf::from("/mnt"), HashMapSource(Default::default()))
            .unwrap()
    }

    #[test]
    fn entrypoint_creates_empty_semantic_folder() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        assert!(ds.path().join("_sem").is_dir());
        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.graph().nodes().next().is_none());
    }

    #[test]
    fn tag_chain_creates_nodes_and_arcs() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_a"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_a/_b"), 0o755).unwrap();

        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.graph().has_node("_a"));
        assert!(folder.graph().has_node("_b"));
        assert!(!folder.graph().has_arc("_b", "_a"));
        assert!(ds.path().join("_sem/_a").is_dir());
        assert!(ds.path().join("_sem/_b").is_dir());
    }

    #[test]
    fn repeated_tag_in_own_chain_is_exists() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_a"), 0o755).unwrap();
        assert!(mkdir(&settings, Path::new("/_sem/_a/_a"), 0o755).is_err());
    }

    #[test]
    fn tagged_directory_union_assigns_existing_file() {
        let ds = tempdir().unwrap();
        let settings = settings(ds.path());
        mkdir(&settings, Path::new("/_sem"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_a"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/x"), 0o755).unwrap();
        mkdir(&settings, Path::new("/_sem/_a/x"), 0o755).unwrap();

        let folder = load_folder(&settings, Path::new("/_sem")).unwrap();
        assert!(folder.filetags().has_tag("x", "_a").unwrap());
        // one physical inode, not two
        assert!(!ds.path().join("_sem/_a/x").exists());
    }
}
