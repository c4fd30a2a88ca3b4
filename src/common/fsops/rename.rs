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
use crate::common::fsops::rmdir::remove_tag;
use crate::common::fsops::{load_folder, save_folder};
use crate::common::settings::Settings;
use crate::common::types::{PathInfo, PathKind};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Implements §4.8's full rename transition matrix, keyed by the kind of
/// `old` and `new`. Renaming a path to itself is a no-op; every other
/// destination must not already exist under the full semantic existence
/// predicate (checked here rather than by a bare physical lookup, since a
/// tagged-object destination can "exist" through more than one tag path).
pub fn rename(settings: &Settings, old: &Path, new: &Path) -> SemResult<()> {
    if old == new {
        return Ok(());
    }
    if !exists(settings, old) {
        return Err(SemanticFsError::NotFound(old.to_owned()));
    }
    if exists(settings, new) {
        return Err(SemanticFsError::Exists(new.to_owned()));
    }
    if let Some(name) = new.file_name().and_then(|n| n.to_str()) {
        settings.reject_reserved(name)?;
    }

    let old_info = settings.pathinfo(old)?;
    let new_info = settings.pathinfo(new)?;
    let old_physical = settings.physical_path(old)?;
    let new_physical = settings.physical_path(new)?;

    match (old_info.kind(), new_info.kind()) {
        (PathKind::Standard, PathKind::Standard) => {
            std::fs::rename(&old_physical, &new_physical)?;
            Ok(())
        }
        (PathKind::Standard, PathKind::EntryPoint) => {
            if !std::fs::metadata(&old_physical)?.is_dir() {
                return Err(unsupported("standard file", "entry point"));
            }
            std::fs::rename(&old_physical, &new_physical)?;
            init_semantic_folder_from_contents(settings, new, &new_physical)
        }
        (PathKind::Standard, PathKind::Tag) => Err(unsupported("standard object", "tag")),
        (PathKind::Standard, PathKind::TaggedObject) => {
            std::fs::rename(&old_physical, &new_physical)?;
            tag_file_at_destination(settings, &new_info)
        }

        (PathKind::EntryPoint, PathKind::Standard) => Err(unsupported("entry point", "standard object")),
        (PathKind::EntryPoint, PathKind::EntryPoint) => {
            std::fs::rename(&old_physical, &new_physical)?;
            Ok(())
        }
        (PathKind::EntryPoint, PathKind::Tag) => Err(unsupported("entry point", "tag")),
        (PathKind::EntryPoint, PathKind::TaggedObject) => Err(unsupported("entry point", "tagged object")),

        (PathKind::Tag, PathKind::Standard) => {
            convert_tag_to_folder(settings, old_info.entrypoint(), old_info.tag_chain(), &new_physical)
        }
        (PathKind::Tag, PathKind::EntryPoint) => Err(unsupported("tag", "entry point")),
        (PathKind::Tag, PathKind::Tag) => {
            if old_info.entrypoint() != new_info.entrypoint() {
                return Err(unsupported("tag", "tag in a different entry point"));
            }
            let entry_physical = settings.physical_path(old_info.entrypoint())?;
            let mut folder = load_folder(settings, old_info.entrypoint())?;
            rename_tag_in_place(&mut folder, &entry_physical, old_info.tag_chain(), new_info.tag_chain())?;
            save_folder(settings, &folder)
        }
        (PathKind::Tag, PathKind::TaggedObject) => {
            convert_tag_to_folder(settings, old_info.entrypoint(), old_info.tag_chain(), &new_physical)?;
            tag_file_at_destination(settings, &new_info)
        }

        (PathKind::TaggedObject, PathKind::Standard) => extract_tagged_object(settings, &old_info, &new_physical),
        (PathKind::TaggedObject, PathKind::EntryPoint) => {
            if !std::fs::metadata(&old_physical)?.is_dir() {
                return Err(unsupported("tagged file", "entry point"));
            }
            extract_tagged_object(settings, &old_info, &new_physical)?;
            init_semantic_folder_from_contents(settings, new, &new_physical)
        }
        (PathKind::TaggedObject, PathKind::Tag) => Err(unsupported("tagged object", "tag")),
        (PathKind::TaggedObject, PathKind::TaggedObject) => tagged_to_tagged(settings, &old_info, &new_info),
    }
}

fn unsupported(from: &str, to: &str) -> SemanticFsError {
    SemanticFsError::NotSupported(format!("renaming a {} to a {} is not supported", from, to))
}

/// §4.8's `convert-tag-to-folder`: materializes every file reachable only
/// through `chain` into a brand new physical directory, strips `chain`'s
/// last tag from each, then removes the now-untagged tag node or arc.
fn convert_tag_to_folder(settings: &Settings, entry_virtual: &Path, chain: &[String], dest_physical: &Path) -> SemResult<()> {
    let entry_physical = settings.physical_path(entry_virtual)?;
    let mut folder = load_folder(settings, entry_virtual)?;

    std::fs::create_dir(dest_physical)?;

    let chain_set: HashSet<String> = chain.iter().cloned().collect();
    let files: Vec<String> = folder.filetags().tagged_files(&chain_set).into_iter().cloned().collect();
    let last_tag = chain.last().expect("tag kind has non-empty chain").clone();
    for file in &files {
        copy_recursive(&entry_physical.join(file), &dest_physical.join(file))?;
        folder.filetags_mut().discard_tag(file, &last_tag)?;
    }

    remove_tag(&mut folder, &entry_physical, chain)?;
    save_folder(settings, &folder)
}

/// §4.8's `extract-tagged-object`: an empty source chain means the object
/// is unreachable by any other tag path, so it is fully removed from the
/// source folder and physically moved. A non-empty chain only drops the
/// last tag — the object stays reachable through whatever tags remain — so
/// the destination gets a copy rather than a move.
fn extract_tagged_object(settings: &Settings, src_info: &PathInfo, dest_physical: &Path) -> SemResult<()> {
    let mut folder = load_folder(settings, src_info.entrypoint())?;
    let object_name = src_info.object_name();
    let src_physical = settings.physical_path(src_info.path())?;

    if src_info.tag_chain().is_empty() {
        std::fs::rename(&src_physical, dest_physical)?;
        folder.filetags_mut().remove_file(object_name)?;
    } else {
        let last_tag = src_info.last_tag().expect("non-empty chain checked above");
        folder.filetags_mut().discard_tag(object_name, last_tag)?;
        copy_recursive(&src_physical, dest_physical)?;
    }
    save_folder(settings, &folder)
}

/// Registers the physical object already sitting at `dest_info`'s physical
/// path as a tagged object in its entry point's folder. Used by every
/// transition that ends in kind `tagged`, after the physical move/copy has
/// already placed the bytes at the right spot.
fn tag_file_at_destination(settings: &Settings, dest_info: &PathInfo) -> SemResult<()> {
    let mut folder = load_folder(settings, dest_info.entrypoint())?;
    let tags: HashSet<String> = dest_info.tag_chain().iter().cloned().collect();
    folder.filetags_mut().add_file(dest_info.object_name(), tags)?;
    save_folder(settings, &folder)
}

/// A freshly-converted entry point's `SemanticFolder` starts with every
/// existing physical child registered as an untagged file, so it can be
/// tagged later without first having to notice it's there.
fn init_semantic_folder_from_contents(settings: &Settings, entry_virtual: &Path, physical: &Path) -> SemResult<()> {
    let mut folder = SemanticFolder::new(entry_virtual.to_owned());
    for entry in std::fs::read_dir(physical)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name
            .to_str()
            .ok_or_else(|| SemanticFsError::InvalidArgument(format!("non-utf8 entry in {}", physical.display())))?;
        folder.filetags_mut().add_file(name, HashSet::new())?;
    }
    save_folder(settings, &folder)
}

/// Same-entry-point tag rename: either a rename-node (same parent tag,
/// different leaf name) or a re-parent (same leaf name, different parent
/// tag in the chain) — never both at once.
fn rename_tag_in_place(folder: &mut SemanticFolder, entry_physical: &Path, old_chain: &[String], new_chain: &[String]) -> SemResult<()> {
    let old_leaf = old_chain.last().expect("tag kind has non-empty chain");
    let new_leaf = new_chain.last().expect("tag kind has non-empty chain");
    let old_parent = if old_chain.len() >= 2 { Some(old_chain[old_chain.len() - 2].clone()) } else { None };
    let new_parent = if new_chain.len() >= 2 { Some(new_chain[new_chain.len() - 2].clone()) } else { None };

    if old_parent == new_parent && old_leaf != new_leaf {
        std::fs::rename(entry_physical.join(old_leaf), entry_physical.join(new_leaf))?;
        folder.graph_mut().rename_node(old_leaf, new_leaf)
    } else if old_leaf == new_leaf && old_parent != new_parent {
        if let Some(p) = &old_parent {
            folder.graph_mut().remove_arc(p, old_leaf)?;
        }
        if let Some(p) = &new_parent {
            folder.graph_mut().add_arc(p, new_leaf)?;
        }
        Ok(())
    } else {
        Err(SemanticFsError::NotSupported(format!(
            "renaming tag {:?} to {:?} changes both its name and its position in the graph",
            old_chain, new_chain
        )))
    }
}

/// Tagged-object-to-tagged-object rename (§4.8). Within the same entry
/// point the caller may change the object's name *or* its tag chain, never
/// both; across entry points it is always extract-then-retag.
fn tagged_to_tagged(settings: &Settings, src_info: &PathInfo, dest_info: &PathInfo) -> SemResult<()> {
    if src_info.entrypoint() != dest_info.entrypoint() {
        let dest_physical = settings.physical_path(dest_info.path())?;
        extract_tagged_object(settings, src_info, &dest_physical)?;
        return tag_file_at_destination(settings, dest_info);
    }

    let filename_changed = src_info.object_name() != dest_info.object_name();
    let tagset_changed = src_info.tag_chain() != dest_info.tag_chain();

    if filename_changed && tagset_changed {
        return Err(SemanticFsError::NotSupported(
            "renaming a tagged object cannot change both its name and its tags at once".to_owned(),
        ));
    }

    let mut folder = load_folder(settings, src_info.entrypoint())?;
    if filename_changed {
        let entry_physical = settings.physical_path(src_info.entrypoint())?;
        std::fs::rename(
            entry_physical.join(src_info.object_name()),
            entry_physical.join(dest_info.object_name()),
        )?;
        folder.filetags_mut().rename_file(src_info.object_name(), dest_info.object_name())?;
    } else if tagset_changed {
        if let Some(old_tag) = src_info.last_tag() {
            folder.filetags_mut().discard_tag(src_info.object_name(), old_tag)?;
        }
        let new_tags: HashSet<String> = dest_info.tag_chain().iter().cloned().collect();
        folder.filetags_mut().assign_tags(dest_info.object_name(), &new_tags)?;
    }
    save_folder(settings, &folder)
}

fn copy_recursive(src: &Path, dst: &Path) -> SemResult<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_dir() {
        std::fs::create_dir_all(dst)?;
        for entry in WalkDir::new(src).min_depth(1) {
            let entry = entry.map_err(|e| SemanticFsError::Other(Box::new(e)))?;
            let rel = entry
                .path()
                .strip_prefix(src)
                .expect("walkdir always yields descendants of its root");
            let target = dst.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                std::fs::copy(entry.path(), &target)?;
            }
        }
    } else {
        std::fs::copy(src, dst)?;
    }
    Ok(())
}
