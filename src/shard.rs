//! On-disk layout of an export bundle: one directory per category holding
//! zero-padded, 1-based shard files.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

static SHARD_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*?(\d+)\.json").expect("shard index pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nodes,
    Lists,
    Relations,
}

impl Category {
    /// Transfer order. Lists and relations refer to ids created by the nodes
    /// phase, so every category must finish before the next one starts.
    pub const ORDERED: [Category; 3] = [Category::Nodes, Category::Lists, Category::Relations];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Nodes => "nodes",
            Category::Lists => "lists",
            Category::Relations => "relations",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardDocument {
    pub value_type: Category,
    pub values: Vec<Value>,
}

pub fn shard_file_name(index: u64) -> String {
    format!("{:06}.json", index)
}

/// Shard ordinal encoded in the file name; names without one map to 0.
/// Ordinals past `u64::MAX` saturate.
pub fn shard_index(path: &Path) -> u64 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    SHARD_INDEX
        .captures(&name)
        .map(|caps| caps[1].parse().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// `*.json` files of one category directory in file name order. A missing
/// directory holds no shards.
pub fn list_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            shards.push(path);
        }
    }
    shards.sort();
    Ok(shards)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardSet {
    pub nodes: Vec<PathBuf>,
    pub lists: Vec<PathBuf>,
    pub relations: Vec<PathBuf>,
}

impl ShardSet {
    pub fn discover(root: &Path) -> Result<Self> {
        Ok(ShardSet {
            nodes: list_shards(&root.join(Category::Nodes.as_str()))?,
            lists: list_shards(&root.join(Category::Lists.as_str()))?,
            relations: list_shards(&root.join(Category::Relations.as_str()))?,
        })
    }

    pub fn get(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Nodes => &self.nodes,
            Category::Lists => &self.lists,
            Category::Relations => &self.relations,
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ORDERED.iter().all(|c| self.get(*c).is_empty())
    }

    /// Every shard, category by category in transfer order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &PathBuf)> {
        Category::ORDERED
            .into_iter()
            .flat_map(move |c| self.get(c).iter().map(move |p| (c, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn categories_transfer_in_dependency_order() {
        assert!(Category::ORDERED.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Category::ORDERED[0], Category::Nodes);
        assert_eq!(Category::ORDERED[2], Category::Relations);
    }

    #[test]
    fn names_and_parses_shards() {
        assert_eq!(shard_file_name(1), "000001.json");
        assert_eq!(shard_file_name(1234567), "1234567.json");
        assert_eq!(shard_index(Path::new("/tmp/x/nodes/000042.json")), 42);
        assert_eq!(shard_index(Path::new("batch-7.json")), 7);
        assert_eq!(shard_index(Path::new("nodes/readme.json")), 0);
    }

    #[test]
    fn oversized_ordinal_saturates() {
        let name = format!("{}9.json", u64::MAX);
        assert_eq!(shard_index(Path::new(&name)), u64::MAX);
    }

    #[test]
    fn serializes_document_with_value_type() {
        let doc = ShardDocument {
            value_type: Category::Relations,
            values: vec![],
        };
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"valueType":"relations","values":[]}"#
        );
    }

    #[test]
    fn discovers_json_shards_sorted() {
        let dir = tempdir().unwrap();
        let nodes = dir.path().join("nodes");
        fs::create_dir_all(&nodes).unwrap();
        for name in ["000002.json", "000001.json", "notes.txt"] {
            fs::write(nodes.join(name), "{}").unwrap();
        }

        let set = ShardSet::discover(dir.path()).unwrap();
        assert_eq!(set.nodes, vec![nodes.join("000001.json"), nodes.join("000002.json")]);
        assert!(set.lists.is_empty());
        assert!(!set.is_empty());
        assert_eq!(set.iter().count(), 2);
    }
}
