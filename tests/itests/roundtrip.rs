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

use crate::common::Fixture;

/// Round-trip law: `mkdir /_E; rmdir /_E` (only the two reserved metadata
/// files present) restores the parent's listing to what it was before.
#[test]
fn entrypoint_mkdir_then_rmdir_restores_parent_listing() {
    let f = Fixture::new();
    let before = f.readdir_names("/");

    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    assert_ne!(f.readdir_names("/"), before);

    std::fs::remove_dir(f.mounted("/_sem")).unwrap();
    assert_eq!(f.readdir_names("/"), before);
    assert!(!f.physical("/_sem").exists());
}

/// Round-trip law: `mkdir /_E/_t; rmdir /_E/_t` restores the SemanticFolder
/// to empty — the entry point's own listing goes back to nothing.
#[test]
fn tag_mkdir_then_rmdir_restores_empty_folder() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    assert!(f.readdir_names("/_sem").is_empty());

    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    assert_eq!(f.readdir_names("/_sem"), vec!["_t1"]);

    std::fs::remove_dir(f.mounted("/_sem/_t1")).unwrap();
    assert!(f.readdir_names("/_sem").is_empty());
    assert!(!f.physical("/_sem/_t1").exists());
}

/// Round-trip law: writing bytes identical to what's already on disk
/// through any tag path is observably a no-op on the physical file's
/// contents, whether or not a ghost session is actually involved.
#[test]
fn identical_write_through_tag_path_leaves_physical_bytes_unchanged() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();

    let content = b"the quick brown fox jumps over the lazy dog".to_vec();
    std::fs::write(f.mounted("/_sem/x"), &content).unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), &content).unwrap();

    let physical = f.physical("/_sem/x");
    let before = std::fs::read(&physical).unwrap();

    std::fs::write(f.mounted("/_sem/_t1/x"), &content).unwrap();

    let after = std::fs::read(&physical).unwrap();
    assert_eq!(before, after);
    assert_eq!(after, content);
}
