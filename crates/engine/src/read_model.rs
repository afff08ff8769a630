use layers::popup::PopupContent;
use scene::entity::{Category, Entity};
use scene::query::FilterState;
use scene::world::CategoryCounts;
use serde::Serialize;

/// One sidebar row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem<'a> {
    #[serde(flatten)]
    pub entity: &'a Entity,
    pub selected: bool,
    /// Has a marker (usable coordinates).
    pub on_map: bool,
}

impl<'a> ListItem<'a> {
    pub fn new(entity: &'a Entity, selected: bool) -> Self {
        Self {
            entity,
            selected,
            on_map: entity.is_map_eligible(),
        }
    }
}

/// Everything the page needs to render the map view for the active mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView<'a> {
    pub mode: Category,
    pub is_loading: bool,
    /// Raw provider counts, before filtering.
    pub counts: CategoryCounts,
    pub filter: &'a FilterState,
    /// Search text typed but not applied yet.
    pub pending_query: Option<&'a str>,
    /// Filtered, in-view entities; the selected one first.
    pub items: Vec<ListItem<'a>>,
    pub selected: Option<&'a Entity>,
}

impl MapView<'_> {
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.entity.id.to_string()).collect()
    }
}

/// One page of the desktop sidebar. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<'a> {
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    pub items: Vec<ListItem<'a>>,
}

impl<'a> ListPage<'a> {
    /// Cuts `items` into pages of `page_size`, clamping `page` into range.
    pub fn paginate(items: Vec<ListItem<'a>>, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total = items.len();
        let page_count = total.div_ceil(page_size).max(1);
        let page = page.clamp(1, page_count);
        let items = items
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        Self {
            page,
            page_count,
            total,
            items,
        }
    }
}

/// Mobile bottom-sheet card for the selected entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewCard<'a> {
    pub category: Category,
    pub entity: &'a Entity,
    pub content: PopupContent,
}
