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
use std::fs::OpenOptions;
use std::io::{Read, Write};

fn write_new(path: &std::path::Path, content: &[u8]) {
    let mut f = OpenOptions::new().write(true).create(true).open(path).unwrap();
    f.write_all(content).unwrap();
}

fn read_all(path: &std::path::Path) -> Vec<u8> {
    let mut buf = Vec::new();
    OpenOptions::new().read(true).open(path).unwrap().read_to_end(&mut buf).unwrap();
    buf
}

/// Scenario 2: a tagged file reached through several tag paths is one
/// physical inode, and adding a second tag path is observably a no-op on
/// its bytes.
#[test]
fn tagged_file_identity_across_tag_paths() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t2")).unwrap();

    let content = "HelloWorld".repeat(1000).into_bytes();
    write_new(&f.mounted("/_sem/x"), &content);

    // first tag path: a fresh create onto an already-registered object
    write_new(&f.mounted("/_sem/_t1/x"), &content);
    assert_eq!(read_all(&f.mounted("/_sem/x")), content);
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")), content);
    assert_eq!(f.physical("/_sem/x"), f.physical("/_sem/_t1/x"));
    assert_eq!(std::fs::metadata(f.physical("/_sem/x")).unwrap().len(), content.len() as u64);

    // writing the same bytes again through the same tag path is a no-op
    write_new(&f.mounted("/_sem/_t1/x"), &content);
    assert_eq!(read_all(&f.mounted("/_sem/x")), content);

    // a second, different tag path reaches the same bytes
    write_new(&f.mounted("/_sem/_t2/x"), &content);
    assert_eq!(read_all(&f.mounted("/_sem/_t2/x")), content);
    assert_eq!(f.physical("/_sem/_t1/x"), f.physical("/_sem/_t2/x"));
}

/// Scenario 6: removing a tag untags the file it reached without removing
/// the file itself; removing a deeper arc only removes that arc.
#[test]
fn rmdir_on_tag_untags_without_deleting_file() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    write_new(&f.mounted("/_sem/_t1/x"), b"hello");

    std::fs::remove_dir(f.mounted("/_sem/_t1")).unwrap();

    assert!(!f.mounted("/_sem/_t1").exists());
    // the file is still present under the entry point itself
    assert_eq!(f.readdir_names("/_sem"), vec!["x"]);
    assert_eq!(read_all(&f.mounted("/_sem/x")), b"hello");
}

/// Scenario 6 (converse): rmdir on a tag reached through a longer chain
/// only drops the arc, leaving the tag node (and any other path to it)
/// intact.
#[test]
fn rmdir_on_deep_tag_only_removes_the_arc() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_other")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_other/_t1")).unwrap();

    std::fs::remove_dir(f.mounted("/_sem/_other/_t1")).unwrap();

    assert!(f.readdir_names("/_sem/_other").is_empty());
    // _t1 is still a live node elsewhere in the graph
    assert!(f.mounted("/_sem/_t1").exists());
}
