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
use std::io::Read;
use std::os::unix::fs::FileExt;

fn read_all(path: &std::path::Path) -> Vec<u8> {
    let mut buf = Vec::new();
    OpenOptions::new().read(true).open(path).unwrap().read_to_end(&mut buf).unwrap();
    buf
}

/// Scenario 3: a truncate buffered through a ghost handle is invisible to
/// every other tag path onto the same physical inode until the write
/// session closes.
#[test]
fn ghost_truncate_is_isolated_until_release() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    std::fs::write(f.mounted("/_sem/x"), b"abcdefghijklmnopqrstuvwxyz").unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), b"abcdefghijklmnopqrstuvwxyz").unwrap();

    let handle = OpenOptions::new().write(true).open(f.mounted("/_sem/_t1/x")).unwrap();
    handle.set_len(0).unwrap();

    assert_eq!(read_all(&f.mounted("/_sem/x")).len(), 26);
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")).len(), 0);

    drop(handle);

    assert_eq!(read_all(&f.mounted("/_sem/x")), Vec::<u8>::new());
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")), Vec::<u8>::new());
}

/// Scenario 4: a write whose bytes diverge from on-disk content forces an
/// immediate commit-through, observable from every tag path before close.
#[test]
fn ghost_diverging_write_commits_through_before_release() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    let original = b"abcdefghijklmnopqrstuvwxyz".to_vec();
    std::fs::write(f.mounted("/_sem/x"), &original).unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), &original).unwrap();

    let mut expected = b"!!!".to_vec();
    expected.extend_from_slice(&original);

    let handle = OpenOptions::new().write(true).open(f.mounted("/_sem/_t1/x")).unwrap();
    handle.write_all_at(b"!!!", 0).unwrap();
    handle.sync_all().unwrap();

    assert_eq!(read_all(&f.mounted("/_sem/x")), expected);
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")), expected);

    drop(handle);
    assert_eq!(read_all(&f.mounted("/_sem/x")), expected);
}

/// Scenario 5: a seek-write that lands past a non-rewritten prefix reads
/// back as zero-filled until either the session closes or a diverging
/// write forces materialization early.
#[test]
fn ghost_seek_write_leaves_holes_until_materialized() {
    let f = Fixture::new();
    std::fs::create_dir(f.mounted("/_sem")).unwrap();
    std::fs::create_dir(f.mounted("/_sem/_t1")).unwrap();
    let original = b"abcdefghijklmnopqrstuvwxyz".to_vec();
    std::fs::write(f.mounted("/_sem/x"), &original).unwrap();
    std::fs::write(f.mounted("/_sem/_t1/x"), &original).unwrap();

    let handle = OpenOptions::new().write(true).open(f.mounted("/_sem/_t1/x")).unwrap();
    handle.write_all_at(b"fghi", 5).unwrap();
    handle.sync_all().unwrap();

    assert_eq!(read_all(&f.mounted("/_sem/x")), original);

    let mut expected_hole = vec![0u8; 5];
    expected_hole.extend_from_slice(b"fghi");
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")), expected_hole);

    drop(handle);

    // fresh ghost session: writing bytes that differ from on-disk at the
    // same offset forces commit-through even before this second handle closes.
    std::fs::write(f.mounted("/_sem/x"), &original).unwrap();
    let handle2 = OpenOptions::new().write(true).open(f.mounted("/_sem/_t1/x")).unwrap();
    handle2.write_all_at(b"5555", 5).unwrap();
    handle2.sync_all().unwrap();

    let mut expected = vec![0u8; 5];
    expected.extend_from_slice(b"5555");
    assert_eq!(read_all(&f.mounted("/_sem/x")), expected);
    assert_eq!(read_all(&f.mounted("/_sem/_t1/x")), expected);
    drop(handle2);
}
