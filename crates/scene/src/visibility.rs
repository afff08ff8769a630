use foundation::bounds::GeoBounds;

use crate::entity::Entity;

/// Current visible rectangle of the map.
///
/// `None` until the map reports its first bounds; while unset nothing is
/// restricted. Only pan/zoom handlers write here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ViewportTracker {
    bounds: Option<GeoBounds>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Option<&GeoBounds> {
        self.bounds.as_ref()
    }

    /// Records new bounds. Returns `true` if they differ from the current ones.
    pub fn update(&mut self, bounds: GeoBounds) -> bool {
        if self.bounds == Some(bounds) {
            return false;
        }
        self.bounds = Some(bounds);
        true
    }
}

/// Keeps the entities that are "in view".
///
/// An entity passes if there are no bounds yet, if it has no usable
/// coordinates (it stays listed but never gets a marker), or if the bounds
/// contain it.
///
/// Ordering contract:
/// - Output preserves the relative order of `filtered`.
pub fn restrict_to_viewport<'a>(
    filtered: Vec<&'a Entity>,
    bounds: Option<&GeoBounds>,
) -> Vec<&'a Entity> {
    let Some(bounds) = bounds else {
        return filtered;
    };
    filtered
        .into_iter()
        .filter(|e| e.map_position().is_none_or(|p| bounds.contains(p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ViewportTracker, restrict_to_viewport};
    use crate::entity::{Category, Entity};
    use foundation::bounds::GeoBounds;

    fn view() -> GeoBounds {
        GeoBounds::from_edges(41.6, 44.7, 41.8, 44.9)
    }

    #[test]
    fn no_bounds_means_no_restriction() {
        let raw = vec![
            Entity::of(Category::Drives, 1, "in").at(41.7, 44.8),
            Entity::of(Category::Drives, 2, "far").at(42.5, 41.6),
        ];
        let all: Vec<&Entity> = raw.iter().collect();
        assert_eq!(restrict_to_viewport(all, None).len(), 2);
    }

    #[test]
    fn entities_without_coordinates_are_exempt() {
        let raw = vec![
            Entity::of(Category::Stations, 7, "no coords"),
            Entity::of(Category::Stations, 8, "outside").at(42.5, 41.6),
            Entity::of(Category::Stations, 9, "inside").at(41.7, 44.8),
        ];
        let all: Vec<&Entity> = raw.iter().collect();
        let b = view();
        let out: Vec<String> = restrict_to_viewport(all, Some(&b))
            .iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(out, vec!["7", "9"]);
    }

    #[test]
    fn tracker_reports_changes_only() {
        let mut t = ViewportTracker::new();
        assert!(t.bounds().is_none());
        assert!(t.update(view()));
        assert!(!t.update(view()));
        assert!(t.update(GeoBounds::from_edges(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(t.bounds(), Some(&GeoBounds::from_edges(0.0, 0.0, 1.0, 1.0)));
    }
}
