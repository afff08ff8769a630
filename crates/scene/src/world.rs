use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Category, Entity};

/// One refresh from a category's entity provider.
///
/// `items = None` is what a failed fetch looks like; it is stored as an
/// empty list, indistinguishable from "no entities".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderUpdate {
    #[serde(default)]
    pub items: Option<Vec<Entity>>,
    #[serde(default)]
    pub is_loading: bool,
}

impl ProviderUpdate {
    pub fn loaded(items: Vec<Entity>) -> Self {
        Self {
            items: Some(items),
            is_loading: false,
        }
    }

    pub fn loading() -> Self {
        Self {
            items: None,
            is_loading: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            items: None,
            is_loading: false,
        }
    }
}

/// Parses raw provider rows delivered for `category`.
///
/// Rows without a `category` tag get `category`; rows that still fail to
/// deserialize are skipped with a warning. Rows tagged with another category
/// are kept so `World::apply` can count and drop them.
pub fn parse_provider_rows(category: Category, rows: Vec<Value>) -> Vec<Entity> {
    rows.into_iter()
        .filter_map(|mut row| {
            if let Value::Object(obj) = &mut row {
                obj.entry("category")
                    .or_insert_with(|| Value::String(category.as_str().to_string()));
            }
            match serde_json::from_value::<Entity>(row) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(%category, error = %e, "provider row skipped");
                    None
                }
            }
        })
        .collect()
}

/// Latest provider state for one category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderSnapshot {
    pub items: Vec<Entity>,
    pub is_loading: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CategoryCounts {
    pub total: usize,
    pub with_coordinates: usize,
}

/// Summary of what `World::apply` kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub kept: usize,
    pub dropped_duplicates: usize,
    pub dropped_foreign: usize,
}

/// Raw, unfiltered entity arrays for every category.
///
/// The world is the only place raw provider data lives; filtering and
/// viewport restriction always read from here, so a recompute sees the
/// latest data regardless of when a fetch was issued.
#[derive(Debug, Default)]
pub struct World {
    snapshots: BTreeMap<Category, ProviderSnapshot>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `category`'s snapshot.
    ///
    /// Rows tagged with another category are dropped, as are repeated ids
    /// (first occurrence wins).
    pub fn apply(&mut self, category: Category, update: ProviderUpdate) -> ApplySummary {
        let raw = update.items.unwrap_or_default();
        let mut seen = HashSet::with_capacity(raw.len());
        let mut items = Vec::with_capacity(raw.len());
        let mut dropped_duplicates = 0usize;
        let mut dropped_foreign = 0usize;

        for entity in raw {
            if entity.category() != category {
                dropped_foreign += 1;
                continue;
            }
            if !seen.insert(entity.id.clone()) {
                dropped_duplicates += 1;
                continue;
            }
            items.push(entity);
        }

        if dropped_duplicates > 0 || dropped_foreign > 0 {
            tracing::warn!(
                %category,
                dropped_duplicates,
                dropped_foreign,
                "provider update contained unusable rows"
            );
        }

        let snapshot = self.snapshots.entry(category).or_default();
        snapshot.items = items;
        snapshot.is_loading = update.is_loading;

        ApplySummary {
            kept: snapshot.items.len(),
            dropped_duplicates,
            dropped_foreign,
        }
    }

    pub fn items(&self, category: Category) -> &[Entity] {
        self.snapshots
            .get(&category)
            .map(|s| s.items.as_slice())
            .unwrap_or(&[])
    }

    /// Categories that have never reported count as loading.
    pub fn is_loading(&self, category: Category) -> bool {
        self.snapshots.get(&category).is_none_or(|s| s.is_loading)
    }

    pub fn contains(&self, category: Category, id: &foundation::ids::EntityId) -> bool {
        self.items(category).iter().any(|e| &e.id == id)
    }

    pub fn counts(&self, category: Category) -> CategoryCounts {
        let items = self.items(category);
        CategoryCounts {
            total: items.len(),
            with_coordinates: items.iter().filter(|e| e.is_map_eligible()).count(),
        }
    }
}
