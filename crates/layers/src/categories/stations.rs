use scene::entity::{Attributes, Category, Entity};
use scene::query::SearchProfile;

use crate::layer::LayerStrategy;
use crate::popup::{PopupAction, PopupContent, PopupField, join_list};
use crate::symbology::{MarkerVisual, Rgb};

use super::navigate_href;

const COLOR: Rgb = Rgb(0xca, 0x8a, 0x04);

/// Fuel stations.
#[derive(Debug, Copy, Clone, Default)]
pub struct StationsLayer;

impl SearchProfile for StationsLayer {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.brand.as_deref());
        out.extend(entity.address.as_deref());
        out
    }
}

impl LayerStrategy for StationsLayer {
    fn category(&self) -> Category {
        Category::Stations
    }

    fn glyph(&self) -> &'static str {
        "⛽"
    }

    fn build_visual(&self, _entity: &Entity, selected: bool) -> MarkerVisual {
        MarkerVisual::two_state(COLOR, self.glyph(), selected)
    }

    fn build_popup(&self, entity: &Entity) -> PopupContent {
        let hours = matches!(&entity.attributes, Attributes::Stations(a) if a.open_24h)
            .then(|| "Open 24/7".to_string());
        PopupContent::build(
            entity.display_name.clone(),
            self.photo_slot(entity),
            vec![
                ("Brand", entity.brand.clone()),
                ("Fuel", join_list(&entity.tags)),
                ("Hours", hours),
            ],
            PopupField {
                label: "Station",
                value: "Fuel station".into(),
            },
            PopupAction {
                label: "Navigate",
                href: navigate_href(entity, "stations"),
            },
        )
    }
}
