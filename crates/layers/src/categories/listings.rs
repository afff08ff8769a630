use scene::entity::{Attributes, Category, Entity};
use scene::query::SearchProfile;

use crate::layer::LayerStrategy;
use crate::popup::{PopupAction, PopupContent, PopupField, format_price_range, format_rating};
use crate::symbology::{MarkerVisual, Rgb};

use super::detail_href;

const COLOR: Rgb = Rgb(0xf9, 0x73, 0x16);

/// Mechanic service listings.
#[derive(Debug, Copy, Clone, Default)]
pub struct ListingsLayer;

impl SearchProfile for ListingsLayer {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.description.as_deref());
        out.extend(entity.address.as_deref());
        out.extend(entity.brand.as_deref());
        // Offered services ("brakes", "diagnostics") are what people type.
        out.extend(entity.tags.iter().map(String::as_str));
        out
    }
}

impl LayerStrategy for ListingsLayer {
    fn category(&self) -> Category {
        Category::Listings
    }

    fn glyph(&self) -> &'static str {
        "🔧"
    }

    fn build_visual(&self, _entity: &Entity, selected: bool) -> MarkerVisual {
        MarkerVisual::two_state(COLOR, self.glyph(), selected)
    }

    fn build_popup(&self, entity: &Entity) -> PopupContent {
        let (price, on_site) = match &entity.attributes {
            Attributes::Listings(a) => (
                format_price_range(a.price_min, a.price_max),
                a.on_site.then(|| "Comes to you".to_string()),
            ),
            _ => (None, None),
        };
        PopupContent::build(
            entity.display_name.clone(),
            self.photo_slot(entity),
            vec![
                ("Price", price),
                ("Rating", format_rating(entity.rating)),
                ("Service", on_site),
                ("Address", entity.address.clone()),
            ],
            PopupField {
                label: "Service",
                value: "Car service".into(),
            },
            PopupAction {
                label: "Book",
                href: detail_href("services", &entity.id),
            },
        )
    }
}
