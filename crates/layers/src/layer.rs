use scene::entity::{Category, Entity};
use scene::query::SearchProfile;

use crate::categories::{ChargersLayer, DrivesLayer, LaundriesLayer, ListingsLayer, StationsLayer};
use crate::popup::{PhotoSlot, PopupContent};
use crate::symbology::MarkerVisual;

/// Everything category-specific about a map layer.
///
/// The reconciler is generic; the only per-category code is how an entity
/// is searched, drawn and described in its popup.
pub trait LayerStrategy: SearchProfile + Send + Sync {
    fn category(&self) -> Category;

    /// Glyph used on markers and as the popup photo placeholder.
    fn glyph(&self) -> &'static str;

    fn build_visual(&self, entity: &Entity, selected: bool) -> MarkerVisual;

    fn build_popup(&self, entity: &Entity) -> PopupContent;

    fn photo_slot(&self, entity: &Entity) -> PhotoSlot {
        match entity.first_photo() {
            Some(url) => PhotoSlot::Url {
                url: url.to_string(),
            },
            None => PhotoSlot::Placeholder {
                glyph: self.glyph(),
            },
        }
    }
}

static LISTINGS: ListingsLayer = ListingsLayer;
static LAUNDRIES: LaundriesLayer = LaundriesLayer;
static DRIVES: DrivesLayer = DrivesLayer;
static CHARGERS: ChargersLayer = ChargersLayer;
static STATIONS: StationsLayer = StationsLayer;

pub fn strategy_for(category: Category) -> &'static dyn LayerStrategy {
    match category {
        Category::Listings => &LISTINGS,
        Category::Laundries => &LAUNDRIES,
        Category::Drives => &DRIVES,
        Category::Chargers => &CHARGERS,
        Category::Stations => &STATIONS,
    }
}
