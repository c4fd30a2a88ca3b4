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

use crate::common::err::SemanticFsError;
use std::path::{Path, PathBuf};

pub mod file_perms;

/// The four mutually-exclusive path classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    Standard,
    EntryPoint,
    Tag,
    TaggedObject,
}

/// `PathInfo` classifies a normalized absolute virtual path into one of the
/// four kinds in `PathKind`, and extracts the entry point, tag chain, and
/// trailing object name.
///
/// Handling the four kinds through a tagged variant, rather than ad-hoc field
/// checks at every call site, is deliberate: it makes the exhaustive rename
/// matrix in the dispatcher a compile-time completeness check.
#[derive(Debug, Clone)]
pub struct PathInfo {
    path: PathBuf,
    entrypoint: PathBuf,
    tag_chain: Vec<String>,
    object_name: String,
}

pub(crate) fn is_semantic_name(name: &str, prefix: char) -> bool {
    name.starts_with(prefix)
}

impl PathInfo {
    /// Classify `path` using `prefix` as the semantic prefix character.
    /// `path` must be absolute; constructing from a relative or empty path is
    /// an error.
    pub fn new(path: &Path, prefix: char) -> Result<Self, SemanticFsError> {
        if !path.is_absolute() {
            return Err(SemanticFsError::InvalidArgument(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }

        let components: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(os) => os.to_str().map(ToOwned::to_owned),
                _ => None,
            })
            .collect();

        if components.is_empty() {
            return Ok(Self {
                path: path.to_owned(),
                entrypoint: PathBuf::new(),
                tag_chain: vec![],
                object_name: String::new(),
            });
        }

        let last = components.last().expect("checked non-empty above");

        // largest index `k` <= n whose component is NOT semantic
        let last_nonsemantic_idx = |comps: &[String]| -> Option<usize> {
            comps
                .iter()
                .enumerate()
                .rev()
                .find(|(_, name)| !is_semantic_name(name, prefix))
                .map(|(i, _)| i)
        };

        if is_semantic_name(last, prefix) {
            // .../_a/_b: entry point ends at the first semantic component
            // after the last standard name.
            let k = last_nonsemantic_idx(&components);
            let entry_end = k.map_or(1, |k| k + 2);
            let entrypoint = join_components(&components[..entry_end]);
            let tag_chain = components[entry_end..].to_vec();
            Ok(Self {
                path: path.to_owned(),
                entrypoint,
                tag_chain,
                object_name: String::new(),
            })
        } else if components.len() >= 2 && is_semantic_name(&components[components.len() - 2], prefix) {
            // .../_a/b: tagged object, trailing component is the object name.
            let without_last = &components[..components.len() - 1];
            let k = last_nonsemantic_idx(without_last);
            let entry_end = k.map_or(1, |k| k + 2);
            let entrypoint = join_components(&components[..entry_end]);
            let tag_chain = components[entry_end..components.len() - 1].to_vec();
            Ok(Self {
                path: path.to_owned(),
                entrypoint,
                tag_chain,
                object_name: last.clone(),
            })
        } else {
            Ok(Self {
                path: path.to_owned(),
                entrypoint: PathBuf::new(),
                tag_chain: vec![],
                object_name: String::new(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The entry-point virtual path, e.g. `/root/_music`. Empty for a
    /// standard object.
    pub fn entrypoint(&self) -> &Path {
        &self.entrypoint
    }

    pub fn tag_chain(&self) -> &[String] {
        &self.tag_chain
    }

    /// The trailing non-semantic object name, empty if this path names a tag
    /// or entry point rather than a tagged object.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn kind(&self) -> PathKind {
        let has_entrypoint = !self.entrypoint.as_os_str().is_empty();
        if !has_entrypoint {
            PathKind::Standard
        } else if !self.object_name.is_empty() {
            PathKind::TaggedObject
        } else if !self.tag_chain.is_empty() {
            PathKind::Tag
        } else {
            PathKind::EntryPoint
        }
    }

    pub fn is_standard(&self) -> bool {
        self.kind() == PathKind::Standard
    }

    pub fn is_entrypoint(&self) -> bool {
        self.kind() == PathKind::EntryPoint
    }

    pub fn is_tag(&self) -> bool {
        self.kind() == PathKind::Tag
    }

    pub fn is_tagged_object(&self) -> bool {
        self.kind() == PathKind::TaggedObject
    }

    /// The last tag in the chain, if any (the tag the current path names, for
    /// kind `Tag`; the innermost tag a tagged object was reached through, for
    /// kind `TaggedObject`).
    pub fn last_tag(&self) -> Option<&str> {
        self.tag_chain.last().map(String::as_str)
    }
}

fn join_components(comps: &[String]) -> PathBuf {
    let mut p = PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
    for c in comps {
        p.push(c);
    }
    p
}

/// One semantic span encountered while descending a path: an entry point,
/// the tags traversed within it, and (if the span ends in one) the trailing
/// object name. A single virtual path may contain more than one span, e.g. a
/// tagged directory that itself contains a nested entry point.
#[derive(Debug, Clone)]
pub struct SemanticSubpath {
    pub entrypoint: PathBuf,
    pub tag_chain: Vec<String>,
    pub object_name: String,
}

/// Scans the *entire* path for every semantic span, not just the last one.
/// Used by the existence predicate, which must validate each span
/// independently (a path may pass through more than one entry point).
pub fn semantic_subpaths(path: &Path, prefix: char) -> Vec<SemanticSubpath> {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => os.to_str().map(ToOwned::to_owned),
            _ => None,
        })
        .collect();

    let mut info: Vec<SemanticSubpath> = vec![];
    let mut in_span = false;

    for (i, name) in components.iter().enumerate() {
        if !in_span {
            if is_semantic_name(name, prefix) {
                info.push(SemanticSubpath {
                    entrypoint: join_components(&components[..=i]),
                    tag_chain: vec![],
                    object_name: String::new(),
                });
                in_span = true;
            }
        } else if is_semantic_name(name, prefix) {
            info.last_mut().expect("in_span implies non-empty info").tag_chain.push(name.clone());
        } else {
            info.last_mut().expect("in_span implies non-empty info").object_name = name.clone();
            in_span = false;
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_object() {
        let pi = PathInfo::new(Path::new("/a/b/c"), '_').unwrap();
        assert!(pi.is_standard());
        assert_eq!(pi.entrypoint().as_os_str().len(), 0);
    }

    #[test]
    fn entrypoint_only() {
        let pi = PathInfo::new(Path::new("/a/_sem"), '_').unwrap();
        assert!(pi.is_entrypoint());
        assert_eq!(pi.entrypoint(), Path::new("/a/_sem"));
    }

    #[test]
    fn tag_chain() {
        let pi = PathInfo::new(Path::new("/a/_sem/_t1/_t2"), '_').unwrap();
        assert!(pi.is_tag());
        assert_eq!(pi.entrypoint(), Path::new("/a/_sem"));
        assert_eq!(pi.tag_chain(), &["_t1".to_string(), "_t2".to_string()]);
    }

    #[test]
    fn tagged_object_empty_chain() {
        let pi = PathInfo::new(Path::new("/a/_sem/x"), '_').unwrap();
        assert!(pi.is_tagged_object());
        assert_eq!(pi.entrypoint(), Path::new("/a/_sem"));
        assert!(pi.tag_chain().is_empty());
        assert_eq!(pi.object_name(), "x");
    }

    #[test]
    fn tagged_object_with_chain() {
        let pi = PathInfo::new(Path::new("/a/_sem/_t1/_t2/x"), '_').unwrap();
        assert!(pi.is_tagged_object());
        assert_eq!(pi.tag_chain(), &["_t1".to_string(), "_t2".to_string()]);
        assert_eq!(pi.object_name(), "x");
    }

    #[test]
    fn exclusivity_holds_across_cases() {
        for p in &["/a/b/c", "/a/_sem", "/a/_sem/_t1", "/a/_sem/_t1/x", "/a/_sem/x"] {
            let pi = PathInfo::new(Path::new(p), '_').unwrap();
            let flags = [
                pi.is_standard(),
                pi.is_entrypoint(),
                pi.is_tag(),
                pi.is_tagged_object(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "path {}", p);
        }
    }

    #[test]
    fn relative_path_is_error() {
        assert!(PathInfo::new(Path::new("a/b"), '_').is_err());
    }

    #[test]
    fn nested_entrypoints_collect_multiple_subpaths() {
        let spans = semantic_subpaths(Path::new("/a/_sem/_t1/x/_other/_t2/y"), '_');
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].entrypoint, PathBuf::from("/a/_sem"));
        assert_eq!(spans[0].tag_chain, vec!["_t1".to_string()]);
        assert_eq!(spans[0].object_name, "x");
        assert_eq!(spans[1].entrypoint, PathBuf::from("/a/_sem/_t1/x/_other"));
        assert_eq!(spans[1].tag_chain, vec!["_t2".to_string()]);
        assert_eq!(spans[1].object_name, "y");
    }
}
