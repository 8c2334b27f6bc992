use crate::error::Result;
use crate::shard::Category;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Highest successfully uploaded shard index per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportState {
    pub nodes: u64,
    pub lists: u64,
    pub relations: u64,
    /// Identity of the archive the shards were extracted from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ImportState {
    /// Reads persisted state; a missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable import state {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Replaces the state file in one rename so a crash never leaves it half written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Nodes => self.nodes,
            Category::Lists => self.lists,
            Category::Relations => self.relations,
        }
    }

    pub fn set(&mut self, category: Category, index: u64) {
        match category {
            Category::Nodes => self.nodes = index,
            Category::Lists => self.lists = index,
            Category::Relations => self.relations = index,
        }
    }
}
