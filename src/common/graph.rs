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
use std::collections::{HashMap, HashSet};

/// Directed graph of tag nodes, kept as paired adjacency maps so in-edges and
/// out-edges are both O(1) to query.
#[derive(Debug, Clone, Default)]
pub struct TagGraph {
    adjacency_out: HashMap<String, HashSet<String>>,
    adjacency_in: HashMap<String, HashSet<String>>,
}

impl TagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) -> SemResult<()> {
        if self.has_node(name) {
            return Err(SemanticFsError::DuplicateNode(name.to_owned()));
        }
        self.adjacency_out.insert(name.to_owned(), HashSet::new());
        self.adjacency_in.insert(name.to_owned(), HashSet::new());
        Ok(())
    }

    pub fn remove_node(&mut self, name: &str) -> SemResult<()> {
        if !self.has_node(name) {
            return Err(SemanticFsError::MissingNode(name.to_owned()));
        }
        self.adjacency_out.remove(name);
        self.adjacency_in.remove(name);
        for nodes in self.adjacency_out.values_mut() {
            nodes.remove(name);
        }
        for nodes in self.adjacency_in.values_mut() {
            nodes.remove(name);
        }
        Ok(())
    }

    pub fn rename_node(&mut self, old: &str, new: &str) -> SemResult<()> {
        if !self.has_node(old) {
            return Err(SemanticFsError::MissingNode(old.to_owned()));
        }
        if self.has_node(new) {
            return Err(SemanticFsError::DuplicateNode(new.to_owned()));
        }

        let out = self.adjacency_out.remove(old).expect("checked has_node above");
        let inn = self.adjacency_in.remove(old).expect("checked has_node above");
        self.adjacency_out.insert(new.to_owned(), out);
        self.adjacency_in.insert(new.to_owned(), inn);

        for nodes in self.adjacency_out.values_mut().chain(self.adjacency_in.values_mut()) {
            if nodes.remove(old) {
                nodes.insert(new.to_owned());
            }
        }
        Ok(())
    }

    pub fn has_node(&self, name: &str) -> bool {
        debug_assert_eq!(
            self.adjacency_out.contains_key(name),
            self.adjacency_in.contains_key(name)
        );
        self.adjacency_out.contains_key(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.adjacency_in.keys()
    }

    pub fn has_arc(&self, from: &str, to: &str) -> bool {
        match (self.adjacency_out.get(from), self.adjacency_in.get(to)) {
            (Some(out), Some(inn)) => {
                debug_assert_eq!(out.contains(to), inn.contains(from));
                out.contains(to)
            }
            _ => false,
        }
    }

    /// Whether `nodes` forms a contiguous path: each node exists, and each
    /// consecutive pair is joined by an arc.
    pub fn has_path(&self, nodes: &[String]) -> bool {
        for (i, node) in nodes.iter().enumerate() {
            if !self.has_node(node) {
                return false;
            }
            if i > 0 && !self.has_arc(&nodes[i - 1], node) {
                return false;
            }
        }
        true
    }

    pub fn add_arc(&mut self, from: &str, to: &str) -> SemResult<()> {
        if !(self.has_node(from) && self.has_node(to)) {
            return Err(SemanticFsError::MissingNode(format!("{} or {}", from, to)));
        }
        self.adjacency_out.get_mut(from).expect("checked has_node above").insert(to.to_owned());
        self.adjacency_in.get_mut(to).expect("checked has_node above").insert(from.to_owned());
        Ok(())
    }

    pub fn remove_arc(&mut self, from: &str, to: &str) -> SemResult<()> {
        if !(self.has_node(from) && self.has_node(to)) {
            return Err(SemanticFsError::MissingNode(format!("{} or {}", from, to)));
        }
        self.adjacency_out.get_mut(from).expect("checked has_node above").remove(to);
        self.adjacency_in.get_mut(to).expect("checked has_node above").remove(from);
        Ok(())
    }

    pub fn incoming_arcs(&self, node: &str) -> SemResult<&HashSet<String>> {
        self.adjacency_in
            .get(node)
            .ok_or_else(|| SemanticFsError::MissingNode(node.to_owned()))
    }

    pub fn outgoing_arcs(&self, node: &str) -> SemResult<&HashSet<String>> {
        self.adjacency_out
            .get(node)
            .ok_or_else(|| SemanticFsError::MissingNode(node.to_owned()))
    }

    pub(crate) fn adjacency_out(&self) -> &HashMap<String, HashSet<String>> {
        &self.adjacency_out
    }

    pub(crate) fn adjacency_in(&self) -> &HashMap<String, HashSet<String>> {
        &self.adjacency_in
    }

    pub(crate) fn from_raw(
        adjacency_out: HashMap<String, HashSet<String>>,
        adjacency_in: HashMap<String, HashSet<String>>,
    ) -> Self {
        Self {
            adjacency_out,
            adjacency_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query_arc() {
        let mut g = TagGraph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_arc("a", "b").unwrap();
        assert!(g.has_arc("a", "b"));
        assert!(!g.has_arc("b", "a"));
    }

    #[test]
    fn duplicate_node_is_error() {
        let mut g = TagGraph::new();
        g.add_node("a").unwrap();
        assert!(g.add_node("a").is_err());
    }

    #[test]
    fn remove_node_clears_arcs() {
        let mut g = TagGraph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_arc("a", "b").unwrap();
        g.remove_node("b").unwrap();
        assert!(!g.has_node("b"));
        assert!(g.outgoing_arcs("a").unwrap().is_empty());
    }

    #[test]
    fn rename_node_preserves_arcs() {
        let mut g = TagGraph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_arc("a", "b").unwrap();
        g.rename_node("a", "z").unwrap();
        assert!(g.has_arc("z", "b"));
        assert!(!g.has_node("a"));
    }

    #[test]
    fn has_path_checks_contiguity() {
        let mut g = TagGraph::new();
        for n in ["a", "b", "c"] {
            g.add_node(n).unwrap();
        }
        g.add_arc("a", "b").unwrap();
        g.add_arc("b", "c").unwrap();
        assert!(g.has_path(&["a".to_string(), "b".to_string(), "c".to_string()]));
        assert!(!g.has_path(&["a".to_string(), "c".to_string()]));
    }
}
