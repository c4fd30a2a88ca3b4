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

use crate::common::err::SemResult;
use std::fs::File;
use std::ops::Range;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// A sorted, merged set of disjoint half-open `[start, end)` ranges. No
/// interval-tree crate is reached for here — none of the dependencies this
/// project otherwise pulls in provide one, and this set never holds more
/// than a handful of spans at a time, so a plain sorted vector with a
/// merge-on-insert is the straightforward choice.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    ranges: Vec<Range<u64>>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// A single interval `[0, end)`, or empty if `end == 0`.
    pub fn full(end: u64) -> Self {
        if end > 0 {
            Self { ranges: vec![0..end] }
        } else {
            Self::new()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The end of the last interval, or 0 if empty.
    pub fn end(&self) -> u64 {
        self.ranges.last().map_or(0, |r| r.end)
    }

    pub fn ranges(&self) -> &[Range<u64>] {
        &self.ranges
    }

    /// Inserts `[start, end)`, merging with any interval it overlaps or is
    /// adjacent to. Keeps the whole set coalesced, so it's always safe to
    /// restart the scan after a merge rather than track indices carefully.
    pub fn insert_merge(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }
        let mut new_start = start;
        let mut new_end = end;
        let mut i = 0;
        while i < self.ranges.len() {
            let r = &self.ranges[i];
            if r.end < new_start || r.start > new_end {
                i += 1;
            } else {
                new_start = new_start.min(r.start);
                new_end = new_end.max(r.end);
                self.ranges.remove(i);
                i = 0;
            }
        }
        let pos = self.ranges.iter().position(|r| r.start > new_start).unwrap_or(self.ranges.len());
        self.ranges.insert(pos, new_start..new_end);
    }

    /// Clips the set to `[0, length)`, dropping anything beyond it and
    /// shortening the interval that straddles the boundary.
    pub fn truncate(&mut self, length: u64) {
        if length == 0 {
            self.ranges.clear();
            return;
        }
        self.ranges.retain(|r| r.start < length);
        if let Some(last) = self.ranges.last_mut() {
            if last.end > length {
                last.end = length;
            }
        }
    }

    /// All intervals overlapping `[start, end)`, clipped to it and sorted.
    pub fn overlapping(&self, start: u64, end: u64) -> Vec<Range<u64>> {
        self.ranges
            .iter()
            .filter_map(|r| {
                let s = r.start.max(start);
                let e = r.end.min(end);
                if s < e {
                    Some(s..e)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Buffers writes to a physical file shared by more than one tagged name,
/// so that overwriting a tagged path with identical bytes (the common case
/// when a file manager "copies" a file onto one of its own other names)
/// never touches the other names' view of the data.
///
/// A write whose bytes match what's already on disk at that offset is
/// recorded as covered but never physically performed. The first write that
/// actually diverges forces every previously-skipped range to be
/// materialized (zero-filled where a truncate had logically extended the
/// file without writing anything) before the divergent bytes are written for
/// real; from that point on the buffered view and the physical file agree
/// again, so the interval set collapses back to a single `[0, filesize)`
/// span.
pub struct GhostFile {
    data_path: PathBuf,
    filesize: u64,
    rewritten: IntervalSet,
    reader: File,
}

impl GhostFile {
    pub fn new(data_path: &Path) -> SemResult<Self> {
        let filesize = std::fs::metadata(data_path).map(|m| m.len()).unwrap_or(0);
        let reader = File::open(data_path)?;
        Ok(Self {
            data_path: data_path.to_owned(),
            filesize,
            rewritten: IntervalSet::full(filesize),
            reader,
        })
    }

    pub fn size(&self) -> u64 {
        self.filesize
    }

    pub fn truncate(&mut self, length: u64) {
        if length > 0 {
            self.rewritten.truncate(length);
        } else {
            self.rewritten = IntervalSet::new();
        }
        self.filesize = length;
        debug_assert!(self.filesize >= self.rewritten.end());
    }

    pub fn write(&mut self, buf: &[u8], offset: u64, fh: &File) -> SemResult<usize> {
        let on_disk_size = std::fs::metadata(&self.data_path)?.len();
        let buf_end = offset + buf.len() as u64;

        if buf_end <= on_disk_size && self.is_same_data(buf, offset)? {
            self.rewritten.insert_merge(offset, buf_end);
            self.filesize = self.filesize.max(buf_end);
            return Ok(buf.len());
        }

        self.rewritten.insert_merge(offset, buf_end);
        self.filesize = self.filesize.max(buf_end);

        self.write_tree_to_real_file(fh)?;
        fh.write_all_at(buf, offset)?;

        self.filesize = fh.metadata()?.len();
        self.rewritten = IntervalSet::full(self.filesize);

        Ok(buf.len())
    }

    pub fn read(&self, length: u64, offset: u64, fh: &File) -> SemResult<Vec<u8>> {
        if offset >= self.filesize || length == 0 {
            return Ok(Vec::new());
        }

        let end = offset + length;
        let intervals = self.rewritten.overlapping(offset, end);
        if intervals.is_empty() {
            let n = length.min(self.filesize - offset);
            return Ok(vec![0u8; n as usize]);
        }

        let mut data = Vec::new();
        let mut end_prev = offset;
        for interv in &intervals {
            data.extend(std::iter::repeat(0u8).take((interv.start - end_prev) as usize));
            let want = (interv.end - interv.start) as usize;
            let mut buf = vec![0u8; want];
            let got = read_best_effort(fh, &mut buf, interv.start)?;
            buf.truncate(got);
            buf.resize(want, 0);
            data.extend_from_slice(&buf);
            end_prev = interv.end;
        }

        let last_end = intervals.last().map_or(offset, |r| r.end);
        let tail = (offset + length).saturating_sub(last_end);
        data.extend(std::iter::repeat(0u8).take(tail as usize));

        if offset + length > self.filesize {
            data.truncate((self.filesize - offset) as usize);
        }

        Ok(data)
    }

    pub fn apply(&mut self, fh: &File) -> SemResult<()> {
        self.write_tree_to_real_file(fh)?;
        self.rewritten = IntervalSet::full(self.filesize);
        Ok(())
    }

    fn is_same_data(&self, buf: &[u8], offset: u64) -> SemResult<bool> {
        let mut old = vec![0u8; buf.len()];
        let got = read_best_effort(&self.reader, &mut old, offset)?;
        Ok(got == buf.len() && old == buf)
    }

    fn write_tree_to_real_file(&self, fh: &File) -> SemResult<()> {
        let mut end_prev = 0u64;
        for r in self.rewritten.ranges() {
            let gap = r.start - end_prev;
            if gap > 0 {
                fh.write_all_at(&vec![0u8; gap as usize], end_prev)?;
            }
            end_prev = r.end;
        }
        let tail = self.filesize.saturating_sub(end_prev);
        if tail > 0 {
            fh.write_all_at(&vec![0u8; tail as usize], end_prev)?;
        }
        debug_assert!(self.filesize >= self.rewritten.end());
        fh.set_len(self.filesize)?;
        Ok(())
    }
}

/// Reads as many bytes as are available into `buf`, returning the count
/// actually read rather than erroring on a short read at EOF.
fn read_best_effort(f: &File, buf: &mut [u8], offset: u64) -> SemResult<usize> {
    let mut total = 0;
    loop {
        if total == buf.len() {
            break;
        }
        match f.read_at(&mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn interval_set_merges_adjacent() {
        let mut s = IntervalSet::new();
        s.insert_merge(0, 5);
        s.insert_merge(5, 10);
        assert_eq!(s.ranges(), &[0..10]);
    }

    #[test]
    fn interval_set_merges_bridging_insert() {
        let mut s = IntervalSet::new();
        s.insert_merge(0, 2);
        s.insert_merge(10, 12);
        s.insert_merge(2, 10);
        assert_eq!(s.ranges(), &[0..12]);
    }

    #[test]
    fn interval_set_truncate_clips() {
        let mut s = IntervalSet::full(10);
        s.truncate(4);
        assert_eq!(s.ranges(), &[0..4]);
        s.truncate(0);
        assert!(s.is_empty());
    }

    #[test]
    fn same_data_write_is_noop_on_disk() {
        let mut tf = NamedTempFile::new().unwrap();
        tf.write_all(b"hello world").unwrap();
        tf.flush().unwrap();

        let mut ghost = GhostFile::new(tf.path()).unwrap();
        let fh = File::open(tf.path()).unwrap();
        let n = ghost.write(b"hello", 0, &fh).unwrap();
        assert_eq!(n, 5);

        let on_disk = std::fs::read(tf.path()).unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[test]
    fn diverging_write_materializes_and_writes() {
        let mut tf = NamedTempFile::new().unwrap();
        tf.write_all(b"hello world").unwrap();
        tf.flush().unwrap();

        let mut ghost = GhostFile::new(tf.path()).unwrap();
        let fh = std::fs::OpenOptions::new().write(true).open(tf.path()).unwrap();
        ghost.write(b"HELLO", 0, &fh).unwrap();

        let on_disk = std::fs::read(tf.path()).unwrap();
        assert_eq!(&on_disk[0..5], b"HELLO");
    }

    #[test]
    fn read_fills_holes_with_zeros_past_truncate() {
        let mut tf = NamedTempFile::new().unwrap();
        tf.write_all(b"ab").unwrap();
        tf.flush().unwrap();

        let mut ghost = GhostFile::new(tf.path()).unwrap();
        ghost.truncate(2);
        ghost.rewritten.insert_merge(0, 2);
        // simulate an extend-by-truncate beyond current data: filesize 5, no bytes written
        ghost.filesize = 5;

        let fh = File::open(tf.path()).unwrap();
        let data = ghost.read(5, 0, &fh).unwrap();
        assert_eq!(data, vec![b'a', b'b', 0, 0, 0]);
    }
}
