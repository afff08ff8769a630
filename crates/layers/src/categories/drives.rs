use scene::entity::{Attributes, Category, Entity};
use scene::query::SearchProfile;

use crate::layer::LayerStrategy;
use crate::popup::{PopupAction, PopupContent, PopupField, format_price, format_rating};
use crate::symbology::{MarkerVisual, Rgb};

use super::detail_href;

const COLOR: Rgb = Rgb(0x7c, 0x3a, 0xed);

/// Drive venues: tracks, karting, drift parks.
#[derive(Debug, Copy, Clone, Default)]
pub struct DrivesLayer;

fn venue_type(entity: &Entity) -> Option<&str> {
    match &entity.attributes {
        Attributes::Drives(a) => a.venue_type.as_deref(),
        _ => None,
    }
}

impl SearchProfile for DrivesLayer {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.description.as_deref());
        out.extend(entity.address.as_deref());
        out.extend(venue_type(entity));
        out
    }
}

impl LayerStrategy for DrivesLayer {
    fn category(&self) -> Category {
        Category::Drives
    }

    fn glyph(&self) -> &'static str {
        "🏁"
    }

    fn build_visual(&self, _entity: &Entity, selected: bool) -> MarkerVisual {
        MarkerVisual::two_state(COLOR, self.glyph(), selected)
    }

    fn build_popup(&self, entity: &Entity) -> PopupContent {
        let price = match &entity.attributes {
            Attributes::Drives(a) => a.price_from.map(|p| format!("from {}", format_price(p))),
            _ => None,
        };
        PopupContent::build(
            entity.display_name.clone(),
            self.photo_slot(entity),
            vec![
                ("Venue", venue_type(entity).map(str::to_string)),
                ("Price", price),
                ("Rating", format_rating(entity.rating)),
            ],
            PopupField {
                label: "Venue",
                value: "Drive venue".into(),
            },
            PopupAction {
                label: "Details",
                href: detail_href("drives", &entity.id),
            },
        )
    }
}
