// Directory tree search.

use crate::reader::Ext2Reader;
use crate::types::{FileType, MatchMode, SearchResult};
use log::{debug, warn};
use scry_core::ScryError;
use std::collections::HashSet;

/// Depth-first traversal of the directory tree, matching entry names and
/// collecting full root-relative paths.
///
/// Traversal is cycle-safe: a visited set keyed by inode number stops a
/// corrupted (or hostile) image from sending the walk back into one of its
/// own ancestors. A subtree whose decode fails is skipped with a warning
/// and the rest of the traversal continues; only a failure at the starting
/// directory aborts the search.
pub struct Searcher<'a> {
    reader: &'a Ext2Reader,
}

impl<'a> Searcher<'a> {
    pub fn new(reader: &'a Ext2Reader) -> Self {
        Searcher { reader }
    }

    /// Search the tree rooted at `root_inode` for entries whose name
    /// matches `query`. Matches at every depth are collected; the walk
    /// never stops at the first hit. Results are in traversal order, which
    /// is stable for a given image.
    pub fn find_by_name(
        &self,
        root_inode: u32,
        query: &str,
        mode: MatchMode,
    ) -> Result<Vec<SearchResult>, ScryError> {
        let query_lower = query.to_lowercase();
        let mut visited = HashSet::new();
        visited.insert(root_inode);

        let mut results = Vec::new();
        self.walk(root_inode, "/", query, &query_lower, mode, &mut visited, &mut results)?;
        debug!("Search for '{}' found {} matches", query, results.len());
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        dir_inode: u32,
        dir_path: &str,
        query: &str,
        query_lower: &str,
        mode: MatchMode,
        visited: &mut HashSet<u32>,
        results: &mut Vec<SearchResult>,
    ) -> Result<(), ScryError> {
        let entries = self.reader.list_directory(dir_inode)?;

        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }

            let entry_path = if dir_path.ends_with('/') {
                format!("{}{}", dir_path, entry.name)
            } else {
                format!("{}/{}", dir_path, entry.name)
            };

            if Self::matches(&entry.name, query, query_lower, mode) {
                match self.reader.inode_info(entry.inode) {
                    Ok(info) => results.push(SearchResult {
                        path: entry_path.clone(),
                        inode: entry.inode,
                        size: info.size,
                        file_type: info.file_type,
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable match {}: {}", entry_path, e);
                    }
                }
            }

            let is_dir = match entry.file_type {
                FileType::Directory => true,
                // Without the filetype feature the tag is blank; ask the
                // inode instead.
                FileType::Unknown => self
                    .reader
                    .inode_info(entry.inode)
                    .map(|i| i.file_type == FileType::Directory)
                    .unwrap_or(false),
                _ => false,
            };

            if is_dir {
                if !visited.insert(entry.inode) {
                    debug!(
                        "Directory cycle: inode {} at {} already visited",
                        entry.inode, entry_path
                    );
                    continue;
                }
                // Skip-on-error is deliberate: one corrupt subtree must not
                // hide matches elsewhere in the tree.
                if let Err(e) =
                    self.walk(entry.inode, &entry_path, query, query_lower, mode, visited, results)
                {
                    warn!("Skipping subtree at {}: {}", entry_path, e);
                }
            }
        }

        Ok(())
    }

    fn matches(name: &str, query: &str, query_lower: &str, mode: MatchMode) -> bool {
        match mode {
            MatchMode::Exact => name == query,
            MatchMode::Substring => name.to_lowercase().contains(query_lower),
        }
    }
}
