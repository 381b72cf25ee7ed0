use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_ITEM_DB_PATH: &str = "assets/item-db.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize)]
struct RawItem {
    name: Option<String>,
}

/// Item catalog keyed by id. Iteration is ascending by id, which is also the
/// order that decides ties between records sharing a name.
#[derive(Debug, Default, Clone)]
pub struct ItemDb {
    items: BTreeMap<u32, ItemRecord>,
}

impl ItemDb {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read item database {}", path.display()))?;
        let db = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse item database {}", path.display()))?;
        if db.is_empty() {
            warn!("Item database {} has no usable entries", path.display());
        } else {
            info!("Loaded {} items from {}", db.len(), path.display());
        }
        Ok(db)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)?;
        let mut items = BTreeMap::new();

        for (key, value) in entries {
            let Ok(id) = key.trim().parse::<u32>() else {
                debug!("Skipping item entry with non-numeric id {:?}", key);
                continue;
            };
            let name = serde_json::from_value::<RawItem>(value).ok().and_then(|r| r.name);
            let Some(name) = name else {
                debug!("Skipping item {} without a name", id);
                continue;
            };
            items.insert(id, ItemRecord { id, name });
        }

        Ok(Self { items })
    }

    #[cfg(test)]
    pub fn from_records(records: impl IntoIterator<Item = ItemRecord>) -> Self {
        Self {
            items: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&ItemRecord> {
        self.items.get(&id)
    }

    /// Look up the id for a drop name. Falls back to the text before the first
    /// `(` so qualifiers like "Coins (m)" still hit "Coins".
    /// When several records share a name, the lowest id wins.
    pub fn resolve(&self, name: &str) -> Option<u32> {
        let wanted = name.to_lowercase();
        if let Some(id) = self.find_exact(&wanted) {
            return Some(id);
        }

        let base = base_name(&wanted);
        if base != wanted {
            return self.find_exact(base);
        }
        None
    }

    fn find_exact(&self, lowered: &str) -> Option<u32> {
        self.items
            .values()
            .find(|r| r.name.to_lowercase() == lowered)
            .map(|r| r.id)
    }
}

fn base_name(name: &str) -> &str {
    name.split('(').next().unwrap_or(name).trim()
}
