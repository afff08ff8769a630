use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use engine::{EngineConfig, EngineError, MapViewController, UiEffect};
use foundation::ids::EntityId;
use foundation::time::Time;
use scene::entity::{Category, Entity};
use scene::query::FilterState;
use scene::world::{ProviderUpdate, parse_provider_rows};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

mod leaflet;
pub mod logging;

use leaflet::{EventQueue, LeafletBackend};

type Controller = MapViewController<LeafletBackend>;

fn now() -> Time {
    Time::from_millis(js_sys::Date::now())
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_category(s: &str) -> Result<Category, JsValue> {
    Category::parse(s).ok_or_else(|| to_js(format!("unknown category `{s}`")))
}

/// Provider rows as handed over by the page; `null` is a failed fetch.
fn parse_items(category: Category, json: &str) -> Result<Option<Vec<Entity>>, JsValue> {
    let raw: Option<Vec<Value>> = serde_json::from_str(json).map_err(to_js)?;
    Ok(raw.map(|rows| parse_provider_rows(category, rows)))
}

/// Milliseconds until `at`, rounded up; never negative.
fn tick_delay_ms(at: Time, now_ms: f64) -> i32 {
    (at.as_millis() - now_ms).max(0.0).ceil() as i32
}

fn parse_entity_id(id: &JsValue) -> Result<EntityId, JsValue> {
    if let Some(n) = id.as_f64() {
        if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
            return Ok(EntityId::Int(n as i64));
        }
    }
    id.as_string()
        .map(EntityId::Text)
        .ok_or_else(|| to_js("entity id must be an integer or a string"))
}

/// State shared between the JS-facing explorer and the Leaflet callbacks.
struct Shared {
    controller: RefCell<Controller>,
    queue: EventQueue,
    effects: RefCell<Vec<UiEffect>>,
    on_change: RefCell<Option<js_sys::Function>>,
}

impl Shared {
    /// Runs `f` against the controller, then processes whatever it caused.
    fn run<R>(self: &Rc<Self>, f: impl FnOnce(&mut Controller) -> Result<R, EngineError>) -> Result<R, JsValue> {
        let out = {
            let mut c = self
                .controller
                .try_borrow_mut()
                .map_err(|_| to_js("map view is busy"))?;
            f(&mut c)
        };
        self.pump();
        out.map_err(to_js)
    }

    /// Hands queued surface events to the controller. Leaflet fires some
    /// events synchronously while the controller is busy (e.g. `moveend`
    /// during `setView`); those stay queued until the outer call pumps.
    fn pump(self: &Rc<Self>) {
        {
            let Ok(mut c) = self.controller.try_borrow_mut() else {
                return;
            };
            loop {
                let next = self.queue.borrow_mut().pop_front();
                let Some(event) = next else {
                    break;
                };
                if let Err(e) = c.handle_surface_event(event) {
                    tracing::warn!(error = %e, "surface event dropped");
                }
            }
        }
        self.collect_effects();
        self.notify_change();
    }

    fn collect_effects(self: &Rc<Self>) {
        let drained = match self.controller.try_borrow_mut() {
            Ok(mut c) => c.drain_effects(),
            Err(_) => return,
        };
        for effect in drained {
            match effect {
                UiEffect::ScheduleTick { at } => self.schedule_tick(at),
                other => self.effects.borrow_mut().push(other),
            }
        }
    }

    fn schedule_tick(self: &Rc<Self>, at: Time) {
        let weak: Weak<Shared> = Rc::downgrade(self);
        let delay_ms = tick_delay_ms(at, js_sys::Date::now());
        let cb = Closure::once_into_js(move || {
            if let Some(shared) = weak.upgrade() {
                let applied = shared
                    .controller
                    .try_borrow_mut()
                    .map(|mut c| c.tick(now()))
                    .unwrap_or(false);
                if applied {
                    shared.pump();
                }
            }
        });
        let Some(window) = web_sys::window() else {
            tracing::warn!("no window; search tick not scheduled");
            return;
        };
        if let Err(e) =
            window.set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), delay_ms)
        {
            tracing::warn!(error = ?e, delay_ms, "could not schedule search tick");
        }
    }

    fn notify_change(&self) {
        let callback = self.on_change.borrow().clone();
        if let Some(f) = callback {
            if let Err(e) = f.call0(&JsValue::NULL) {
                tracing::warn!(error = ?e, "on_change callback threw");
            }
        }
    }
}

/// Map explorer bound to a Leaflet container. Read models and effects are
/// exchanged as JSON strings.
#[wasm_bindgen]
pub struct MapExplorer {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl MapExplorer {
    /// `config_json` may be omitted for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, config_json: Option<String>) -> Result<MapExplorer, JsValue> {
        logging::init(tracing::Level::INFO);
        let config = match config_json.as_deref() {
            Some(json) => EngineConfig::from_json_str(json).map_err(to_js)?,
            None => EngineConfig::default(),
        };
        let queue: EventQueue = Rc::new(RefCell::new(VecDeque::new()));
        let shared = Rc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            let notify: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.pump();
                }
            });
            let backend = LeafletBackend::new(container_id, queue.clone(), notify);
            Shared {
                controller: RefCell::new(MapViewController::new(backend, config)),
                queue,
                effects: RefCell::new(Vec::new()),
                on_change: RefCell::new(None),
            }
        });
        Ok(MapExplorer { shared })
    }

    /// Called after anything visible changed (list, selection, markers).
    pub fn set_on_change(&self, callback: js_sys::Function) {
        *self.shared.on_change.borrow_mut() = Some(callback);
    }

    pub fn init(&self, route: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.init(route))
    }

    pub fn teardown(&self) -> Result<(), JsValue> {
        self.shared.run(|c| {
            c.teardown();
            Ok(())
        })
    }

    pub fn navigate_to(&self, mode: &str) -> Result<(), JsValue> {
        let mode = parse_category(mode)?;
        self.shared.run(|c| c.navigate_to(mode))
    }

    pub fn on_route_changed(&self, path: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.on_route_changed(path))
    }

    /// `items_json` is a JSON array of entities, or `null` for a failed fetch.
    pub fn apply_provider_update(
        &self,
        category: &str,
        items_json: &str,
        is_loading: bool,
    ) -> Result<(), JsValue> {
        let category = parse_category(category)?;
        let items = parse_items(category, items_json)?;
        self.shared.run(|c| {
            c.apply_provider_update(category, ProviderUpdate { items, is_loading });
            Ok(())
        })
    }

    pub fn set_search_text(&self, text: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_search_text(text, now()))
    }

    pub fn set_city(&self, city: Option<String>) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_city(city))
    }

    pub fn set_district(&self, district: Option<String>) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_district(district))
    }

    pub fn set_category_id(&self, category_id: Option<f64>) -> Result<(), JsValue> {
        let category_id = category_id.filter(|v| v.is_finite()).map(|v| v as i64);
        self.shared.run(|c| c.set_category_id(category_id))
    }

    pub fn set_venue_type(&self, venue_type: Option<String>) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_venue_type(venue_type))
    }

    pub fn toggle_brand(&self, brand: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.toggle_brand(brand))
    }

    pub fn toggle_tag(&self, tag: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.toggle_tag(tag))
    }

    pub fn set_on_site_only(&self, on: bool) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_on_site_only(on))
    }

    pub fn set_fast_charger_only(&self, on: bool) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_fast_charger_only(on))
    }

    pub fn set_open_24h_only(&self, on: bool) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_open_24h_only(on))
    }

    pub fn set_min_rating_input(&self, raw: &str) -> Result<(), JsValue> {
        self.shared.run(|c| c.set_min_rating_input(raw))
    }

    /// Replaces the active filters with a JSON `FilterState`.
    pub fn set_filter_json(&self, json: &str) -> Result<(), JsValue> {
        let state: FilterState = serde_json::from_str(json).map_err(to_js)?;
        self.shared.run(|c| c.replace_filter(state))
    }

    pub fn clear_filters(&self) -> Result<(), JsValue> {
        self.shared.run(|c| c.clear_filters())
    }

    pub fn select_from_list(&self, id: JsValue) -> Result<(), JsValue> {
        let id = parse_entity_id(&id)?;
        self.shared.run(|c| c.select_from_list(id))
    }

    pub fn clear_selection(&self) -> Result<(), JsValue> {
        self.shared.run(|c| {
            c.clear_selection();
            Ok(())
        })
    }

    /// Pending effects (route changes, list scrolling) as a JSON array.
    pub fn drain_effects_json(&self) -> Result<String, JsValue> {
        let effects = std::mem::take(&mut *self.shared.effects.borrow_mut());
        serde_json::to_string(&effects).map_err(to_js)
    }

    pub fn view_json(&self) -> Result<String, JsValue> {
        let c = self.shared.controller.try_borrow().map_err(to_js)?;
        serde_json::to_string(&c.view()).map_err(to_js)
    }

    pub fn list_page_json(&self, page: u32) -> Result<String, JsValue> {
        let c = self.shared.controller.try_borrow().map_err(to_js)?;
        serde_json::to_string(&c.list_page(page as usize)).map_err(to_js)
    }

    /// Bottom-sheet card for the selected entity, `null` without one.
    pub fn preview_card_json(&self) -> Result<String, JsValue> {
        let c = self.shared.controller.try_borrow().map_err(to_js)?;
        serde_json::to_string(&c.preview_card()).map_err(to_js)
    }

    pub fn metrics_json(&self) -> Result<String, JsValue> {
        let c = self.shared.controller.try_borrow().map_err(to_js)?;
        let snapshot = c.metrics().snapshot();
        let counters: serde_json::Map<String, Value> = snapshot
            .counters
            .iter()
            .map(|(name, v)| (name.to_string(), Value::from(*v)))
            .collect();
        let eligible = snapshot.eligible_per_reconcile;
        Ok(serde_json::json!({
            "counters": counters,
            "live_markers": snapshot.live_markers,
            "eligible": {
                "count": eligible.count,
                "min": eligible.min,
                "max": eligible.max,
                "mean": eligible.mean(),
            },
        })
        .to_string())
    }
}
