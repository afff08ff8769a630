use foundation::bounds::GeoBounds;
use foundation::geo::GeoPoint;
use foundation::ids::EntityId;
use layers::popup::PopupContent;
use layers::symbology::MarkerVisual;
use scene::entity::Category;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

/// Opaque marker reference handed out by a surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerHandle(pub u64);

/// Click payload attached to a marker: which entity it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerBinding {
    pub category: Category,
    pub entity_id: EntityId,
}

impl MarkerBinding {
    pub fn new(category: Category, entity_id: EntityId) -> Self {
        Self {
            category,
            entity_id,
        }
    }
}

/// Things the map tells the engine about. Delivered by the host adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// A marker was clicked.
    MarkerClicked(MarkerBinding),
    /// Pan or zoom finished.
    ViewportChanged(GeoBounds),
}

/// Creates map instances.
pub trait RenderBackend {
    type Map: MapSurface;

    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<Self::Map, SurfaceError>;
}

/// What the engine needs from a live map.
///
/// Contract:
/// - Every call except `is_attached` and `destroy` fails with
///   `SurfaceError::Detached` once the map is gone.
/// - Handles are only valid until `remove_marker`, `clear_markers` or
///   `destroy`.
/// - At most one popup is open at a time; `open_popup` closes the others.
pub trait MapSurface {
    fn is_attached(&self) -> bool;

    /// Current visible rectangle, `None` if the map has no size yet.
    fn bounds(&self) -> Option<GeoBounds>;

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), SurfaceError>;

    fn add_marker(
        &mut self,
        at: GeoPoint,
        visual: &MarkerVisual,
    ) -> Result<MarkerHandle, SurfaceError>;

    fn bind_popup(
        &mut self,
        marker: MarkerHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError>;

    /// Attaches the click payload. Clicking the marker later produces
    /// `SurfaceEvent::MarkerClicked` with this binding.
    fn bind_click(
        &mut self,
        marker: MarkerHandle,
        binding: MarkerBinding,
    ) -> Result<(), SurfaceError>;

    fn open_popup(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError>;

    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError>;

    /// Removes every marker, including their popups and click bindings.
    /// Returns how many were removed.
    fn clear_markers(&mut self) -> Result<usize, SurfaceError>;

    /// Releases the map. Idempotent.
    fn destroy(&mut self);
}
