use scene::entity::{Attributes, Category, Entity};
use scene::query::SearchProfile;

use crate::layer::LayerStrategy;
use crate::popup::{PopupAction, PopupContent, PopupField, join_list};
use crate::symbology::{MarkerVisual, Rgb};

use super::navigate_href;

const COLOR: Rgb = Rgb(0x16, 0xa3, 0x4a);
const FAST_COLOR: Rgb = Rgb(0x05, 0x96, 0x69);

/// EV chargers. Fast chargers get a darker tint.
#[derive(Debug, Copy, Clone, Default)]
pub struct ChargersLayer;

impl SearchProfile for ChargersLayer {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.address.as_deref());
        out.extend(entity.brand.as_deref());
        out.extend(entity.tags.iter().map(String::as_str));
        out
    }
}

impl LayerStrategy for ChargersLayer {
    fn category(&self) -> Category {
        Category::Chargers
    }

    fn glyph(&self) -> &'static str {
        "⚡"
    }

    fn build_visual(&self, entity: &Entity, selected: bool) -> MarkerVisual {
        let fast = matches!(&entity.attributes, Attributes::Chargers(a) if a.is_fast());
        let base = if fast { FAST_COLOR } else { COLOR };
        MarkerVisual::two_state(base, self.glyph(), selected)
    }

    fn build_popup(&self, entity: &Entity) -> PopupContent {
        let power = match &entity.attributes {
            Attributes::Chargers(a) => match (a.power_kw, a.power_class()) {
                (Some(kw), Some(class)) => Some(format!("{kw:.0} kW · {}", class.label())),
                _ => None,
            },
            _ => None,
        };
        PopupContent::build(
            entity.display_name.clone(),
            self.photo_slot(entity),
            vec![
                ("Power", power),
                ("Connectors", join_list(&entity.tags)),
                ("Operator", entity.brand.clone()),
            ],
            PopupField {
                label: "Charger",
                value: "EV charging point".into(),
            },
            PopupAction {
                label: "Navigate",
                href: navigate_href(entity, "chargers"),
            },
        )
    }
}
