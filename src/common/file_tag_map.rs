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

/// Maps filenames (unique within one semantic folder) to their tagsets.
#[derive(Debug, Clone, Default)]
pub struct FileTagMap {
    files: HashMap<String, HashSet<String>>,
}

impl FileTagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, filename: &str, tags: HashSet<String>) -> SemResult<()> {
        if self.files.contains_key(filename) {
            return Err(SemanticFsError::DuplicateFile(filename.to_owned()));
        }
        self.files.insert(filename.to_owned(), tags);
        Ok(())
    }

    pub fn remove_file(&mut self, filename: &str) -> SemResult<()> {
        self.files
            .remove(filename)
            .map(|_| ())
            .ok_or_else(|| SemanticFsError::MissingFile(filename.to_owned()))
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn rename_file(&mut self, old: &str, new: &str) -> SemResult<()> {
        if self.files.contains_key(new) {
            return Err(SemanticFsError::DuplicateFile(new.to_owned()));
        }
        let tags = self
            .files
            .remove(old)
            .ok_or_else(|| SemanticFsError::MissingFile(old.to_owned()))?;
        self.files.insert(new.to_owned(), tags);
        Ok(())
    }

    pub fn assign_tag(&mut self, filename: &str, tag: &str) -> SemResult<()> {
        self.tags_mut(filename)?.insert(tag.to_owned());
        Ok(())
    }

    pub fn assign_tags(&mut self, filename: &str, tags: &HashSet<String>) -> SemResult<()> {
        self.tags_mut(filename)?.extend(tags.iter().cloned());
        Ok(())
    }

    pub fn discard_tag(&mut self, filename: &str, tag: &str) -> SemResult<()> {
        self.tags_mut(filename)?.remove(tag);
        Ok(())
    }

    pub fn discard_tags(&mut self, filename: &str, tags: &HashSet<String>) -> SemResult<()> {
        let filetags = self.tags_mut(filename)?;
        for t in tags {
            filetags.remove(t);
        }
        Ok(())
    }

    /// Replaces tag `old` with `new` in every file's tagset. A no-op for
    /// files that don't have `old`.
    pub fn rename_tag(&mut self, old: &str, new: &str) {
        for filetags in self.files.values_mut() {
            if filetags.remove(old) {
                filetags.insert(new.to_owned());
            }
        }
    }

    pub fn has_tag(&self, filename: &str, tag: &str) -> SemResult<bool> {
        Ok(self.tags(filename)?.contains(tag))
    }

    pub fn has_tags(&self, filename: &str, tags: &HashSet<String>) -> SemResult<bool> {
        Ok(self.tags(filename)?.is_superset(tags))
    }

    pub fn files(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn tags(&self, filename: &str) -> SemResult<&HashSet<String>> {
        self.files
            .get(filename)
            .ok_or_else(|| SemanticFsError::MissingFile(filename.to_owned()))
    }

    fn tags_mut(&mut self, filename: &str) -> SemResult<&mut HashSet<String>> {
        self.files
            .get_mut(filename)
            .ok_or_else(|| SemanticFsError::MissingFile(filename.to_owned()))
    }

    /// Every file whose tagset is a superset of `tags`. An empty `tags`
    /// matches every file, by convention.
    pub fn tagged_files(&self, tags: &HashSet<String>) -> Vec<&String> {
        self.files
            .iter()
            .filter(|(_, filetags)| filetags.is_superset(tags))
            .map(|(name, _)| name)
            .collect()
    }

    pub(crate) fn raw(&self) -> &HashMap<String, HashSet<String>> {
        &self.files
    }

    pub(crate) fn from_raw(files: HashMap<String, HashSet<String>>) -> Self {
        Self { files }
    }
}
