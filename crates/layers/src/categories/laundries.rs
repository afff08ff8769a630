use scene::entity::{Attributes, Category, Entity};
use scene::query::SearchProfile;

use crate::layer::LayerStrategy;
use crate::popup::{PopupAction, PopupContent, PopupField, format_price, format_rating};
use crate::symbology::{MarkerVisual, Rgb};

use super::detail_href;

const COLOR: Rgb = Rgb(0x25, 0x63, 0xeb);

/// Car washes.
#[derive(Debug, Copy, Clone, Default)]
pub struct LaundriesLayer;

impl SearchProfile for LaundriesLayer {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.address.as_deref());
        out.extend(entity.description.as_deref());
        out
    }
}

impl LayerStrategy for LaundriesLayer {
    fn category(&self) -> Category {
        Category::Laundries
    }

    fn glyph(&self) -> &'static str {
        "🫧"
    }

    fn build_visual(&self, _entity: &Entity, selected: bool) -> MarkerVisual {
        MarkerVisual::two_state(COLOR, self.glyph(), selected)
    }

    fn build_popup(&self, entity: &Entity) -> PopupContent {
        let (price, kind) = match &entity.attributes {
            Attributes::Laundries(a) => {
                let kind = match (a.self_service, a.box_count) {
                    (true, Some(n)) => Some(format!("Self-service, {n} boxes")),
                    (true, None) => Some("Self-service".to_string()),
                    (false, Some(n)) => Some(format!("{n} boxes")),
                    (false, None) => None,
                };
                (a.price_from.map(|p| format!("from {}", format_price(p))), kind)
            }
            _ => (None, None),
        };
        PopupContent::build(
            entity.display_name.clone(),
            self.photo_slot(entity),
            vec![
                ("Price", price),
                ("Type", kind),
                ("Rating", format_rating(entity.rating)),
                ("Address", entity.address.clone()),
            ],
            PopupField {
                label: "Type",
                value: "Car wash".into(),
            },
            PopupAction {
                label: "Details",
                href: detail_href("laundries", &entity.id),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LaundriesLayer;
    use crate::layer::LayerStrategy;
    use crate::popup::PhotoSlot;
    use scene::entity::{Attributes, Entity, LaundryAttributes};

    #[test]
    fn popup_uses_photo_and_box_count() {
        let e = Entity::new(
            "wash-1",
            "Bubble Box",
            Attributes::Laundries(LaundryAttributes {
                price_from: Some(10.0),
                self_service: true,
                box_count: Some(4),
            }),
        )
        .with_photos(["https://cdn/wash.jpg"]);
        let p = LaundriesLayer.build_popup(&e);
        assert_eq!(
            p.photo,
            PhotoSlot::Url {
                url: "https://cdn/wash.jpg".into()
            }
        );
        assert_eq!(p.fields[0].value, "from 10 ₾");
        assert_eq!(p.fields[1].value, "Self-service, 4 boxes");
        assert_eq!(p.action.href, "/laundries/wash-1");
    }
}
