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

use crate::common::constants::FOLDER_FORMAT_VERSION;
use crate::common::err::{SemResult, SemanticFsError};
use crate::common::file_tag_map::FileTagMap;
use crate::common::graph::TagGraph;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A `TagGraph`/`FileTagMap` pair bound to one entry point, persisted as two
/// reserved files inside that entry point's physical directory. Replaces the
/// original implementation's pickle-based format with an explicit
/// length-prefixed binary layout: pickle can execute arbitrary code on
/// deserialization, which is not something a filesystem driver should accept
/// from an on-disk blob it didn't itself write this session.
pub struct SemanticFolder {
    path: PathBuf,
    graph: TagGraph,
    filetags: FileTagMap,
}

impl SemanticFolder {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            graph: TagGraph::new(),
            filetags: FileTagMap::new(),
        }
    }

    pub fn with_parts(path: PathBuf, graph: TagGraph, filetags: FileTagMap) -> Self {
        Self { path, graph, filetags }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn graph(&self) -> &TagGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut TagGraph {
        &mut self.graph
    }

    pub fn filetags(&self) -> &FileTagMap {
        &self.filetags
    }

    pub fn filetags_mut(&mut self) -> &mut FileTagMap {
        &mut self.filetags
    }

    /// Loads a `SemanticFolder` from the two reserved physical files. The
    /// virtual `path` is supplied by the caller (it isn't stored in either
    /// file).
    pub fn from_files(graph_file: &Path, assoc_file: &Path, path: PathBuf) -> SemResult<Self> {
        let mut graph_bytes = Vec::new();
        std::fs::File::open(graph_file)?.read_to_end(&mut graph_bytes)?;
        let graph = deserialize_graph(&graph_bytes)?;

        let mut assoc_bytes = Vec::new();
        std::fs::File::open(assoc_file)?.read_to_end(&mut assoc_bytes)?;
        let filetags = deserialize_filetags(&assoc_bytes)?;

        Ok(Self { path, graph, filetags })
    }

    /// Writes the graph and file-tag-map out to the two reserved physical
    /// files, overwriting whatever is there.
    pub fn to_files(&self, graph_file: &Path, assoc_file: &Path) -> SemResult<()> {
        let graph_bytes = serialize_graph(&self.graph);
        std::fs::File::create(graph_file)?.write_all(&graph_bytes)?;

        let assoc_bytes = serialize_filetags(&self.filetags);
        std::fs::File::create(assoc_file)?.write_all(&assoc_bytes)?;

        Ok(())
    }
}

fn serialize_graph(graph: &TagGraph) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u8(FOLDER_FORMAT_VERSION).expect("write to Vec never fails");

    let nodes: Vec<&String> = graph.nodes().collect();
    let index: HashMap<&str, u32> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i as u32))
        .collect();

    out.write_u32::<LittleEndian>(nodes.len() as u32).expect("write to Vec never fails");
    for name in &nodes {
        write_str(&mut out, name);
    }

    let mut arcs: Vec<(u32, u32)> = Vec::new();
    for name in &nodes {
        for to in graph.outgoing_arcs(name).expect("node came from graph.nodes()") {
            arcs.push((index[name.as_str()], index[to.as_str()]));
        }
    }
    out.write_u32::<LittleEndian>(arcs.len() as u32).expect("write to Vec never fails");
    for (from, to) in arcs {
        out.write_u32::<LittleEndian>(from).expect("write to Vec never fails");
        out.write_u32::<LittleEndian>(to).expect("write to Vec never fails");
    }

    out
}

fn deserialize_graph(bytes: &[u8]) -> SemResult<TagGraph> {
    let mut cur = bytes;
    let version = cur
        .read_u8()
        .map_err(|_| SemanticFsError::InvalidFormat("graph file truncated".to_owned()))?;
    if version != FOLDER_FORMAT_VERSION {
        return Err(SemanticFsError::InvalidFormat(format!(
            "unsupported graph file version {}",
            version
        )));
    }

    let node_count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| SemanticFsError::InvalidFormat("graph file truncated".to_owned()))?;
    let mut nodes = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        nodes.push(read_str(&mut cur)?);
    }

    let mut adjacency_out: HashMap<String, HashSet<String>> =
        nodes.iter().map(|n| (n.clone(), HashSet::new())).collect();
    let mut adjacency_in: HashMap<String, HashSet<String>> =
        nodes.iter().map(|n| (n.clone(), HashSet::new())).collect();

    let arc_count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| SemanticFsError::InvalidFormat("graph file truncated".to_owned()))?;
    for _ in 0..arc_count {
        let from_idx = cur
            .read_u32::<LittleEndian>()
            .map_err(|_| SemanticFsError::InvalidFormat("graph file truncated".to_owned()))?;
        let to_idx = cur
            .read_u32::<LittleEndian>()
            .map_err(|_| SemanticFsError::InvalidFormat("graph file truncated".to_owned()))?;
        let from = nodes
            .get(from_idx as usize)
            .ok_or_else(|| SemanticFsError::InvalidFormat("graph file arc index out of range".to_owned()))?
            .clone();
        let to = nodes
            .get(to_idx as usize)
            .ok_or_else(|| SemanticFsError::InvalidFormat("graph file arc index out of range".to_owned()))?
            .clone();
        adjacency_out.get_mut(&from).expect("index validated above").insert(to.clone());
        adjacency_in.get_mut(&to).expect("index validated above").insert(from);
    }

    Ok(TagGraph::from_raw(adjacency_out, adjacency_in))
}

fn serialize_filetags(filetags: &FileTagMap) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u8(FOLDER_FORMAT_VERSION).expect("write to Vec never fails");

    let files = filetags.raw();
    out.write_u32::<LittleEndian>(files.len() as u32).expect("write to Vec never fails");
    for (name, tags) in files {
        write_str(&mut out, name);
        out.write_u32::<LittleEndian>(tags.len() as u32).expect("write to Vec never fails");
        for tag in tags {
            write_str(&mut out, tag);
        }
    }

    out
}

fn deserialize_filetags(bytes: &[u8]) -> SemResult<FileTagMap> {
    let mut cur = bytes;
    let version = cur
        .read_u8()
        .map_err(|_| SemanticFsError::InvalidFormat("assoc file truncated".to_owned()))?;
    if version != FOLDER_FORMAT_VERSION {
        return Err(SemanticFsError::InvalidFormat(format!(
            "unsupported assoc file version {}",
            version
        )));
    }

    let file_count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| SemanticFsError::InvalidFormat("assoc file truncated".to_owned()))?;
    let mut files = HashMap::with_capacity(file_count as usize);
    for _ in 0..file_count {
        let name = read_str(&mut cur)?;
        let tag_count = cur
            .read_u32::<LittleEndian>()
            .map_err(|_| SemanticFsError::InvalidFormat("assoc file truncated".to_owned()))?;
        let mut tags = HashSet::with_capacity(tag_count as usize);
        for _ in 0..tag_count {
            tags.insert(read_str(&mut cur)?);
        }
        files.insert(name, tags);
    }

    Ok(FileTagMap::from_raw(files))
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).expect("write to Vec never fails");
    out.extend_from_slice(s.as_bytes());
}

fn read_str(cur: &mut &[u8]) -> SemResult<String> {
    let len = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| SemanticFsError::InvalidFormat("string field truncated".to_owned()))?;
    if cur.len() < len as usize {
        return Err(SemanticFsError::InvalidFormat("string field truncated".to_owned()));
    }
    let (raw, rest) = cur.split_at(len as usize);
    *cur = rest;
    String::from_utf8(raw.to_vec())
        .map_err(|_| SemanticFsError::InvalidFormat("string field is not valid UTF-8".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn graph_round_trips() {
        let mut g = TagGraph::new();
        g.add_node("music").unwrap();
        g.add_node("rock").unwrap();
        g.add_arc("music", "rock").unwrap();

        let bytes = serialize_graph(&g);
        let g2 = deserialize_graph(&bytes).unwrap();
        assert!(g2.has_node("music"));
        assert!(g2.has_arc("music", "rock"));
    }

    #[test]
    fn filetags_round_trip() {
        let mut m = FileTagMap::new();
        let mut tags = HashSet::new();
        tags.insert("rock".to_string());
        m.add_file("song.mp3", tags).unwrap();

        let bytes = serialize_filetags(&m);
        let m2 = deserialize_filetags(&bytes).unwrap();
        assert!(m2.has_tag("song.mp3", "rock").unwrap());
    }

    #[test]
    fn bad_version_byte_is_rejected() {
        let bytes = vec![0xff, 0, 0, 0, 0];
        assert!(deserialize_graph(&bytes).is_err());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = vec![FOLDER_FORMAT_VERSION, 1, 0];
        assert!(deserialize_graph(&bytes).is_err());
    }
}
