use std::collections::BTreeMap;

use foundation::ids::EntityId;

use crate::entity::{Category, Entity};

/// The single "active entity" shared by the list, the map and the mobile
/// preview card.
///
/// Selection is keyed by category so an id that exists in two categories can
/// never leak across layers. At most one entry exists at any time: selecting
/// in one category drops every other selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: BTreeMap<Category, EntityId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `id` in `category`. Returns `true` if the selection changed.
    pub fn select(&mut self, category: Category, id: EntityId) -> bool {
        if self.selected.len() == 1 && self.selected.get(&category) == Some(&id) {
            return false;
        }
        self.selected.clear();
        self.selected.insert(category, id);
        true
    }

    /// Returns `true` if something was selected.
    pub fn clear(&mut self) -> bool {
        let changed = !self.selected.is_empty();
        self.selected.clear();
        changed
    }

    pub fn selected_id(&self, category: Category) -> Option<&EntityId> {
        self.selected.get(&category)
    }

    pub fn current(&self) -> Option<(Category, &EntityId)> {
        self.selected.iter().next().map(|(c, id)| (*c, id))
    }

    pub fn is_selected(&self, category: Category, id: &EntityId) -> bool {
        self.selected_id(category) == Some(id)
    }

    /// Resolves the selected entity of `category` within `entities`.
    pub fn selected_entity<'a>(
        &self,
        category: Category,
        entities: &'a [Entity],
    ) -> Option<&'a Entity> {
        let id = self.selected_id(category)?;
        entities.iter().find(|e| &e.id == id)
    }
}

/// Moves the selected entity to the front, keeping everything else in its
/// original relative order. Without a selection, or when the selected id is
/// not in the list, the list is returned unchanged.
pub fn order_for_display<'a>(
    mut entities: Vec<&'a Entity>,
    selected: Option<&EntityId>,
) -> Vec<&'a Entity> {
    let Some(selected) = selected else {
        return entities;
    };
    if let Some(pos) = entities.iter().position(|e| &e.id == selected) {
        let chosen = entities.remove(pos);
        entities.insert(0, chosen);
    }
    entities
}
