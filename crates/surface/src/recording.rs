use std::collections::BTreeMap;

use foundation::bounds::GeoBounds;
use foundation::geo::GeoPoint;
use foundation::ids::EntityId;
use layers::popup::PopupContent;
use layers::symbology::MarkerVisual;
use scene::entity::Category;

use crate::error::SurfaceError;
use crate::surface::{MapSurface, MarkerBinding, MarkerHandle, RenderBackend, SurfaceEvent};

/// Web-map tile size; bounds are derived from it like a slippy map does.
const TILE_SIZE_PX: f64 = 256.0;

/// In-memory map that records every call. Used by tests and the CLI replay.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    viewport_px: (u32, u32),
    fail_create: Option<String>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            viewport_px: (1024, 768),
            fail_create: None,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose `create_map` always fails.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_create: Some(reason.into()),
            ..Self::default()
        }
    }
}

impl RenderBackend for RecordingBackend {
    type Map = RecordingSurface;

    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<RecordingSurface, SurfaceError> {
        if let Some(reason) = &self.fail_create {
            return Err(SurfaceError::Backend(reason.clone()));
        }
        Ok(RecordingSurface::new(center, zoom, self.viewport_px))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMarker {
    pub at: GeoPoint,
    pub visual: MarkerVisual,
    pub popup: Option<PopupContent>,
    pub binding: Option<MarkerBinding>,
    pub popup_open: bool,
}

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    attached: bool,
    center: GeoPoint,
    zoom: f64,
    viewport_px: (u32, u32),
    /// Set by `pan_to`; otherwise bounds follow center and zoom.
    explicit_bounds: Option<GeoBounds>,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, RecordedMarker>,
    adds_until_detach: Option<usize>,
    created_total: u64,
    removed_total: u64,
    click_bindings_total: u64,
    events: Vec<SurfaceEvent>,
}

impl RecordingSurface {
    pub fn new(center: GeoPoint, zoom: f64, viewport_px: (u32, u32)) -> Self {
        Self {
            attached: true,
            center,
            zoom,
            viewport_px,
            explicit_bounds: None,
            next_handle: 1,
            markers: BTreeMap::new(),
            adds_until_detach: None,
            created_total: 0,
            removed_total: 0,
            click_bindings_total: 0,
            events: Vec::new(),
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn markers(&self) -> impl Iterator<Item = (MarkerHandle, &RecordedMarker)> {
        self.markers.iter().map(|(h, m)| (*h, m))
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&RecordedMarker> {
        self.markers.get(&handle)
    }

    /// The live marker standing for `id` in `category`.
    pub fn marker_for(
        &self,
        category: Category,
        id: &EntityId,
    ) -> Option<(MarkerHandle, &RecordedMarker)> {
        self.markers().find(|(_, m)| {
            m.binding
                .as_ref()
                .is_some_and(|b| b.category == category && &b.entity_id == id)
        })
    }

    pub fn open_popups(&self) -> Vec<MarkerHandle> {
        self.markers()
            .filter(|(_, m)| m.popup_open)
            .map(|(h, _)| h)
            .collect()
    }

    /// Bound entity ids in marker creation order.
    pub fn bound_ids(&self) -> Vec<String> {
        self.markers()
            .filter_map(|(_, m)| m.binding.as_ref())
            .map(|b| b.entity_id.to_string())
            .collect()
    }

    pub fn created_total(&self) -> u64 {
        self.created_total
    }

    pub fn removed_total(&self) -> u64 {
        self.removed_total
    }

    pub fn click_bindings_total(&self) -> u64 {
        self.click_bindings_total
    }

    /// Simulates a user click: opens the popup and queues the click event.
    pub fn click(&mut self, handle: MarkerHandle) -> Option<MarkerBinding> {
        if !self.attached {
            return None;
        }
        let binding = self.markers.get(&handle)?.binding.clone()?;
        self.show_only_popup(handle);
        self.events.push(SurfaceEvent::MarkerClicked(binding.clone()));
        Some(binding)
    }

    /// Simulates a user pan/zoom ending on `bounds`.
    pub fn pan_to(&mut self, bounds: GeoBounds) {
        self.explicit_bounds = Some(bounds);
        self.center = bounds.center();
        self.events.push(SurfaceEvent::ViewportChanged(bounds));
    }

    /// Events produced since the last call, in order.
    pub fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Detaches after `n` more successful `add_marker` calls.
    pub fn detach_after_adds(&mut self, n: usize) {
        self.adds_until_detach = Some(n);
    }

    fn derived_bounds(&self) -> GeoBounds {
        let scale = TILE_SIZE_PX * 2f64.powf(self.zoom);
        let half_lon = 0.5 * f64::from(self.viewport_px.0) / scale * 360.0;
        let half_lat = 0.5 * f64::from(self.viewport_px.1) / scale * 360.0
            * self.center.lat.to_radians().cos();
        GeoBounds::from_edges(
            (self.center.lat - half_lat).max(-90.0),
            self.center.lon - half_lon,
            (self.center.lat + half_lat).min(90.0),
            self.center.lon + half_lon,
        )
    }

    fn show_only_popup(&mut self, handle: MarkerHandle) {
        for (h, m) in self.markers.iter_mut() {
            m.popup_open = *h == handle && m.popup.is_some();
        }
    }

    fn ensure_attached(&self) -> Result<(), SurfaceError> {
        if self.attached {
            Ok(())
        } else {
            Err(SurfaceError::Detached)
        }
    }

    fn marker_mut(&mut self, handle: MarkerHandle) -> Result<&mut RecordedMarker, SurfaceError> {
        self.ensure_attached()?;
        self.markers
            .get_mut(&handle)
            .ok_or(SurfaceError::UnknownMarker(handle))
    }
}

impl MapSurface for RecordingSurface {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn bounds(&self) -> Option<GeoBounds> {
        if !self.attached || self.viewport_px.0 == 0 || self.viewport_px.1 == 0 {
            return None;
        }
        Some(self.explicit_bounds.unwrap_or_else(|| self.derived_bounds()))
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), SurfaceError> {
        self.ensure_attached()?;
        self.center = center;
        self.zoom = zoom;
        self.explicit_bounds = None;
        let bounds = self.derived_bounds();
        self.events.push(SurfaceEvent::ViewportChanged(bounds));
        Ok(())
    }

    fn add_marker(
        &mut self,
        at: GeoPoint,
        visual: &MarkerVisual,
    ) -> Result<MarkerHandle, SurfaceError> {
        self.ensure_attached()?;
        let handle = MarkerHandle(self.next_handle);
        self.next_handle += 1;
        self.created_total += 1;
        self.markers.insert(
            handle,
            RecordedMarker {
                at,
                visual: visual.clone(),
                popup: None,
                binding: None,
                popup_open: false,
            },
        );
        if let Some(n) = self.adds_until_detach.as_mut() {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.adds_until_detach = None;
                self.attached = false;
            }
        }
        Ok(handle)
    }

    fn bind_popup(
        &mut self,
        marker: MarkerHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError> {
        self.marker_mut(marker)?.popup = Some(content.clone());
        Ok(())
    }

    fn bind_click(
        &mut self,
        marker: MarkerHandle,
        binding: MarkerBinding,
    ) -> Result<(), SurfaceError> {
        self.marker_mut(marker)?.binding = Some(binding);
        self.click_bindings_total += 1;
        Ok(())
    }

    fn open_popup(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError> {
        if self.marker_mut(marker)?.popup.is_none() {
            return Err(SurfaceError::Backend(format!(
                "marker {} has no popup",
                marker.0
            )));
        }
        self.show_only_popup(marker);
        Ok(())
    }

    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError> {
        self.ensure_attached()?;
        self.markers
            .remove(&marker)
            .ok_or(SurfaceError::UnknownMarker(marker))?;
        self.removed_total += 1;
        Ok(())
    }

    fn clear_markers(&mut self) -> Result<usize, SurfaceError> {
        self.ensure_attached()?;
        let n = self.markers.len();
        self.markers.clear();
        self.removed_total += n as u64;
        Ok(n)
    }

    fn destroy(&mut self) {
        self.markers.clear();
        self.events.clear();
        self.attached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordingBackend, RecordingSurface};
    use crate::error::SurfaceError;
    use crate::surface::{MapSurface, MarkerBinding, MarkerHandle, RenderBackend, SurfaceEvent};
    use foundation::bounds::GeoBounds;
    use foundation::geo::GeoPoint;
    use foundation::ids::EntityId;
    use layers::popup::{PhotoSlot, PopupAction, PopupContent, PopupField};
    use layers::symbology::{MarkerVisual, Rgb};
    use scene::entity::Category;

    const TBILISI: GeoPoint = GeoPoint::new(41.7151, 44.8271);

    fn visual() -> MarkerVisual {
        MarkerVisual::two_state(Rgb(1, 2, 3), "x", false)
    }

    fn popup() -> PopupContent {
        PopupContent::build(
            "t",
            PhotoSlot::Placeholder { glyph: "x" },
            vec![],
            PopupField {
                label: "a",
                value: "b".into(),
            },
            PopupAction {
                label: "go",
                href: "/x".into(),
            },
        )
    }

    fn surface() -> RecordingSurface {
        RecordingBackend::new().create_map(TBILISI, 12.0).unwrap()
    }

    fn add_bound(s: &mut RecordingSurface, id: i64) -> MarkerHandle {
        let h = s.add_marker(TBILISI, &visual()).unwrap();
        s.bind_popup(h, &popup()).unwrap();
        s.bind_click(h, MarkerBinding::new(Category::Drives, EntityId::Int(id)))
            .unwrap();
        h
    }

    #[test]
    fn derived_bounds_are_centered_and_shrink_with_zoom() {
        let mut s = surface();
        let b12 = s.bounds().unwrap();
        assert!(b12.contains(TBILISI));
        assert!((b12.center().lat - TBILISI.lat).abs() < 1e-9);
        s.set_view(TBILISI, 15.0).unwrap();
        let b15 = s.bounds().unwrap();
        assert!(b15.east() - b15.west() < b12.east() - b12.west());
        assert!(matches!(
            s.take_events().as_slice(),
            [SurfaceEvent::ViewportChanged(_)]
        ));
    }

    #[test]
    fn click_opens_popup_and_reports_binding() {
        let mut s = surface();
        let a = add_bound(&mut s, 1);
        let b = add_bound(&mut s, 2);
        s.open_popup(a).unwrap();
        let binding = s.click(b).unwrap();
        assert_eq!(binding.entity_id, EntityId::Int(2));
        assert_eq!(s.open_popups(), vec![b]);
        assert_eq!(
            s.take_events(),
            vec![SurfaceEvent::MarkerClicked(binding)]
        );
        assert!(s.take_events().is_empty());
    }

    #[test]
    fn detaches_after_requested_adds() {
        let mut s = surface();
        s.detach_after_adds(2);
        add_bound(&mut s, 1);
        let h = s.add_marker(TBILISI, &visual()).unwrap();
        assert!(!s.is_attached());
        assert_eq!(s.bind_popup(h, &popup()), Err(SurfaceError::Detached));
        assert_eq!(s.add_marker(TBILISI, &visual()), Err(SurfaceError::Detached));
        assert_eq!(s.bounds(), None);
    }

    #[test]
    fn clear_and_remove_track_totals() {
        let mut s = surface();
        let a = add_bound(&mut s, 1);
        add_bound(&mut s, 2);
        s.remove_marker(a).unwrap();
        assert_eq!(s.remove_marker(a), Err(SurfaceError::UnknownMarker(a)));
        assert_eq!(s.clear_markers().unwrap(), 1);
        assert_eq!(s.created_total(), 2);
        assert_eq!(s.removed_total(), 2);
        assert_eq!(s.click_bindings_total(), 2);
        assert_eq!(s.marker_count(), 0);
    }

    #[test]
    fn pan_sets_explicit_bounds() {
        let mut s = surface();
        let b = GeoBounds::from_edges(41.0, 44.0, 42.0, 45.0);
        s.pan_to(b);
        assert_eq!(s.bounds(), Some(b));
        assert_eq!(s.take_events(), vec![SurfaceEvent::ViewportChanged(b)]);
    }

    #[test]
    fn failing_backend_reports_reason() {
        let err = RecordingBackend::failing("no container")
            .create_map(TBILISI, 12.0)
            .unwrap_err();
        assert_eq!(err, SurfaceError::Backend("no container".into()));
    }

    #[test]
    fn surface_events_have_a_stable_wire_shape() {
        let ev = SurfaceEvent::MarkerClicked(MarkerBinding::new(
            Category::Chargers,
            EntityId::Text("c-1".into()),
        ));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "marker_clicked", "category": "chargers", "entity_id": "c-1"})
        );
    }
}
