use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use foundation::bounds::GeoBounds;
use foundation::geo::GeoPoint;
use layers::popup::{PopupContent, escape_html};
use layers::symbology::MarkerVisual;
use surface::{MapSurface, MarkerBinding, MarkerHandle, RenderBackend, SurfaceError, SurfaceEvent};
use wasm_bindgen::prelude::*;

/// Surface events raised by Leaflet callbacks, waiting to be handed to the
/// controller.
pub type EventQueue = Rc<RefCell<VecDeque<SurfaceEvent>>>;

// Leaflet is expected as the global `L`. Markers live in one layer group per
// map so clearing never touches tiles or other overlays.
#[wasm_bindgen(inline_js = "
export function mv_create_map(containerId, lat, lon, zoom) {
    const el = document.getElementById(containerId);
    if (!el || typeof L === 'undefined') return null;
    const map = L.map(el).setView([lat, lon], zoom);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
        attribution: '&copy; OpenStreetMap contributors',
        maxZoom: 19,
    }).addTo(map);
    map.__mvLayer = L.layerGroup().addTo(map);
    return map;
}

export function mv_is_attached(map) {
    return !!(map && map.__mvLayer && map._container && map._container.isConnected);
}

export function mv_get_bounds(map) {
    const b = map.getBounds();
    return [b.getSouth(), b.getWest(), b.getNorth(), b.getEast()];
}

export function mv_on_viewport(map, cb) {
    map.on('moveend', () => {
        const b = map.getBounds();
        cb(b.getSouth(), b.getWest(), b.getNorth(), b.getEast());
    });
}

export function mv_set_view(map, lat, lon, zoom) {
    map.setView([lat, lon], zoom);
}

export function mv_add_marker(map, lat, lon, html, size, zIndex) {
    const icon = L.divIcon({
        className: 'mv-marker',
        html: html,
        iconSize: [size, size],
        iconAnchor: [size / 2, size],
        popupAnchor: [0, -size],
    });
    const marker = L.marker([lat, lon], { icon: icon, zIndexOffset: zIndex });
    map.__mvLayer.addLayer(marker);
    return marker;
}

export function mv_bind_popup(marker, html) {
    marker.bindPopup(html, { maxWidth: 280 });
}

export function mv_on_click(marker, cb) {
    marker.on('click', () => cb());
}

export function mv_open_popup(marker) {
    marker.openPopup();
}

export function mv_remove_marker(map, marker) {
    marker.off();
    map.__mvLayer.removeLayer(marker);
}

export function mv_clear_layer(map) {
    map.__mvLayer.eachLayer((m) => m.off());
    map.__mvLayer.clearLayers();
}

export function mv_destroy(map) {
    map.off();
    map.remove();
    map.__mvLayer = null;
}
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn mv_create_map(container_id: &str, lat: f64, lon: f64, zoom: f64) -> Result<JsValue, JsValue>;

    fn mv_is_attached(map: &JsValue) -> bool;

    #[wasm_bindgen(catch)]
    fn mv_get_bounds(map: &JsValue) -> Result<JsValue, JsValue>;

    fn mv_on_viewport(map: &JsValue, cb: &Closure<dyn FnMut(f64, f64, f64, f64)>);

    #[wasm_bindgen(catch)]
    fn mv_set_view(map: &JsValue, lat: f64, lon: f64, zoom: f64) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn mv_add_marker(
        map: &JsValue,
        lat: f64,
        lon: f64,
        html: &str,
        size: u32,
        z_index: i32,
    ) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    fn mv_bind_popup(marker: &JsValue, html: &str) -> Result<(), JsValue>;

    fn mv_on_click(marker: &JsValue, cb: &Closure<dyn FnMut()>);

    #[wasm_bindgen(catch)]
    fn mv_open_popup(marker: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn mv_remove_marker(map: &JsValue, marker: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn mv_clear_layer(map: &JsValue) -> Result<(), JsValue>;

    fn mv_destroy(map: &JsValue);
}

fn js_error(e: JsValue) -> SurfaceError {
    SurfaceError::Backend(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

/// Creates Leaflet maps inside one container element.
pub struct LeafletBackend {
    container_id: String,
    queue: EventQueue,
    notify: Rc<dyn Fn()>,
}

impl LeafletBackend {
    /// `notify` runs after a Leaflet callback queued an event.
    pub fn new(container_id: impl Into<String>, queue: EventQueue, notify: Rc<dyn Fn()>) -> Self {
        Self {
            container_id: container_id.into(),
            queue,
            notify,
        }
    }
}

impl RenderBackend for LeafletBackend {
    type Map = LeafletSurface;

    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<LeafletSurface, SurfaceError> {
        let map = mv_create_map(&self.container_id, center.lat, center.lon, zoom).map_err(js_error)?;
        if map.is_null() || map.is_undefined() {
            return Err(SurfaceError::Backend(format!(
                "no element #{} or Leaflet not loaded",
                self.container_id
            )));
        }

        let queue = self.queue.clone();
        let notify = self.notify.clone();
        let on_viewport = Closure::wrap(Box::new(move |s: f64, w: f64, n: f64, e: f64| {
            queue
                .borrow_mut()
                .push_back(SurfaceEvent::ViewportChanged(GeoBounds::from_edges(s, w, n, e)));
            notify();
        }) as Box<dyn FnMut(f64, f64, f64, f64)>);
        mv_on_viewport(&map, &on_viewport);

        Ok(LeafletSurface {
            map: Some(map),
            markers: HashMap::new(),
            next_handle: 1,
            queue: self.queue.clone(),
            notify: self.notify.clone(),
            _on_viewport: Some(on_viewport),
        })
    }
}

struct MarkerEntry {
    marker: JsValue,
    /// Dropped together with the marker; Leaflet handlers are removed first.
    on_click: Option<Closure<dyn FnMut()>>,
}

/// One live Leaflet map. Owns every JS callback it registers.
pub struct LeafletSurface {
    map: Option<JsValue>,
    markers: HashMap<MarkerHandle, MarkerEntry>,
    next_handle: u64,
    queue: EventQueue,
    notify: Rc<dyn Fn()>,
    _on_viewport: Option<Closure<dyn FnMut(f64, f64, f64, f64)>>,
}

impl LeafletSurface {
    fn live_map(&self) -> Result<&JsValue, SurfaceError> {
        match &self.map {
            Some(m) if mv_is_attached(m) => Ok(m),
            _ => Err(SurfaceError::Detached),
        }
    }

    fn entry(&self, handle: MarkerHandle) -> Result<&MarkerEntry, SurfaceError> {
        self.live_map()?;
        self.markers
            .get(&handle)
            .ok_or(SurfaceError::UnknownMarker(handle))
    }
}

fn marker_html(visual: &MarkerVisual) -> String {
    format!(
        "<div class=\"mv-pin{}\" style=\"background:{};width:{}px;height:{}px;line-height:{}px\">{}</div>",
        if visual.raised { " mv-pin-selected" } else { "" },
        visual.color.css_hex(),
        visual.size_px,
        visual.size_px,
        visual.size_px,
        escape_html(visual.glyph),
    )
}

impl MapSurface for LeafletSurface {
    fn is_attached(&self) -> bool {
        self.map.as_ref().is_some_and(mv_is_attached)
    }

    fn bounds(&self) -> Option<GeoBounds> {
        let map = self.live_map().ok()?;
        let raw = js_sys::Array::from(&mv_get_bounds(map).ok()?);
        let edge = |i: u32| raw.get(i).as_f64();
        Some(GeoBounds::from_edges(edge(0)?, edge(1)?, edge(2)?, edge(3)?))
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), SurfaceError> {
        let map = self.live_map()?;
        mv_set_view(map, center.lat, center.lon, zoom).map_err(js_error)
    }

    fn add_marker(
        &mut self,
        at: GeoPoint,
        visual: &MarkerVisual,
    ) -> Result<MarkerHandle, SurfaceError> {
        let map = self.live_map()?;
        let z_index = if visual.raised { 1000 } else { 0 };
        let marker = mv_add_marker(map, at.lat, at.lon, &marker_html(visual), visual.size_px, z_index)
            .map_err(js_error)?;
        let handle = MarkerHandle(self.next_handle);
        self.next_handle += 1;
        self.markers.insert(
            handle,
            MarkerEntry {
                marker,
                on_click: None,
            },
        );
        Ok(handle)
    }

    fn bind_popup(
        &mut self,
        marker: MarkerHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError> {
        let entry = self.entry(marker)?;
        mv_bind_popup(&entry.marker, &content.to_html()).map_err(js_error)
    }

    fn bind_click(
        &mut self,
        marker: MarkerHandle,
        binding: MarkerBinding,
    ) -> Result<(), SurfaceError> {
        self.live_map()?;
        let queue = self.queue.clone();
        let notify = self.notify.clone();
        let entry = self
            .markers
            .get_mut(&marker)
            .ok_or(SurfaceError::UnknownMarker(marker))?;
        if entry.on_click.is_some() {
            return Err(SurfaceError::Backend(format!(
                "marker {} already has a click handler",
                marker.0
            )));
        }
        let on_click = Closure::wrap(Box::new(move || {
            queue
                .borrow_mut()
                .push_back(SurfaceEvent::MarkerClicked(binding.clone()));
            notify();
        }) as Box<dyn FnMut()>);
        mv_on_click(&entry.marker, &on_click);
        entry.on_click = Some(on_click);
        Ok(())
    }

    fn open_popup(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError> {
        let entry = self.entry(marker)?;
        mv_open_popup(&entry.marker).map_err(js_error)
    }

    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), SurfaceError> {
        let map = self.live_map()?;
        let entry = self
            .markers
            .get(&marker)
            .ok_or(SurfaceError::UnknownMarker(marker))?;
        mv_remove_marker(map, &entry.marker).map_err(js_error)?;
        self.markers.remove(&marker);
        Ok(())
    }

    fn clear_markers(&mut self) -> Result<usize, SurfaceError> {
        let map = self.live_map()?;
        mv_clear_layer(map).map_err(js_error)?;
        let n = self.markers.len();
        self.markers.clear();
        Ok(n)
    }

    fn destroy(&mut self) {
        if let Some(map) = self.map.take() {
            mv_destroy(&map);
        }
        self.markers.clear();
        self._on_viewport = None;
    }
}
