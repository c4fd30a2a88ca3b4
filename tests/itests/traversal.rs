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

/// Scenario 1: tag creation and traversal, plus the physical tree shape.
#[test]
fn tag_creation_and_traversal() {
    let f = Fixture::new();

    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_a")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_a/_b")).unwrap();

    assert_eq!(f.readdir_names("/_sem"), vec!["_a"]);
    assert_eq!(f.readdir_names("/_sem/_a"), vec!["_b"]);
    // no b->a arc exists, so _b's own listing is empty
    assert!(f.readdir_names("/_sem/_b").is_empty());

    let ds_root = f.datastore.path().canonicalize().unwrap();
    assert!(ds_root.join("_sem").is_dir());
    assert!(ds_root.join("_sem/_a").is_dir());
    assert!(ds_root.join("_sem/_b").is_dir());
}

/// Graph-listing consistency + reserved-name suppression: readdir of a tag
/// is out-arcs union tagged-files, and the metadata files never show up.
#[test]
fn tag_listing_unions_arcs_and_files() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1/_t2")).unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), b"hi").unwrap();

    let mut names = f.readdir_names("/_sem/_t1");
    names.sort();
    assert_eq!(names, vec!["_t2", "x"]);

    assert!(!names.iter().any(|n| n.contains("SEMANTIC_FS")));
}

/// Traversal suppression: a tag already in the chain is never offered again
/// deeper in that chain, even when an arc would otherwise produce it.
#[test]
fn chain_tag_is_suppressed_from_its_own_deeper_listing() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    // arc t1 -> t2
    std::fs::create_dir(f.mounted("/_sem/_t1/_t2")).unwrap();
    // arc t2 -> t1, making the graph cyclic
    std::fs::create_dir(f.mounted("/_sem/_t2/_t1")).unwrap();

    // from outside the t1 chain, the arc shows up normally
    assert_eq!(f.readdir_names("/_sem/_t2"), vec!["_t1"]);

    // but walking t2 underneath a chain that already contains t1 suppresses it
    let names = f.readdir_names("/_sem/_t1/_t2");
    assert!(!names.contains(&"_t1".to_string()));
}

/// Classification exclusivity: getattr succeeds uniformly whether the path
/// is an entry point, a tag, or a tagged object, and each is the kind its
/// position implies (checked indirectly: directories list as directories,
/// the tagged file is readable as a file).
#[test]
fn entrypoint_tag_and_object_are_distinguishable_by_kind() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), b"hi").unwrap();

    assert!(std::fs::metadata(f.mounted("/_sem")).unwrap().is_dir());
    assert!(std::fs::metadata(f.mounted("/_sem/_t1")).unwrap().is_dir());
    assert!(std::fs::metadata(f.mounted("/_sem/_t1/x")).unwrap().is_file());
}
