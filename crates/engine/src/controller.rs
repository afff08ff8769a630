use std::collections::BTreeMap;

use foundation::bounds::GeoBounds;
use foundation::ids::EntityId;
use foundation::time::Time;
use layers::layer::strategy_for;
use runtime::{Counter, Debouncer, EventBus, Metrics};
use scene::entity::{Category, Entity};
use scene::query::{FilterState, filter_entities};
use scene::selection::{SelectionState, order_for_display};
use scene::visibility::{ViewportTracker, restrict_to_viewport};
use scene::world::{ProviderUpdate, World};
use surface::{MapSurface, MarkerBinding, RenderBackend, SurfaceEvent};

use crate::config::EngineConfig;
use crate::effects::UiEffect;
use crate::error::EngineError;
use crate::read_model::{ListItem, ListPage, MapView, PreviewCard};
use crate::reconcile::{MarkerReconciler, ReconcileOutcome, plan_markers};
use crate::view_mode::{RouteResolution, Transition, ViewMode, ViewModeController, resolve_route, route_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Live,
    TornDown,
}

/// Owns the map instance and keeps it, the sidebar list and the selection in
/// sync with provider data, filters and the viewport.
///
/// Single-threaded and host-driven: the host forwards surface events, route
/// changes, provider updates and `tick`s, and carries out the `UiEffect`s
/// drained afterwards. Every change recomputes from current state and
/// rebuilds the marker layer.
///
/// After `teardown` every operation is accepted and ignored.
pub struct MapViewController<B: RenderBackend> {
    config: EngineConfig,
    backend: B,
    map: Option<B::Map>,
    lifecycle: Lifecycle,
    modes: ViewModeController,
    world: World,
    filters: BTreeMap<Category, FilterState>,
    search: Debouncer<(ViewMode, String)>,
    viewport: ViewportTracker,
    selection: SelectionState,
    reconciler: MarkerReconciler,
    effects: Vec<UiEffect>,
    bus: EventBus,
    metrics: Metrics,
}

impl<B: RenderBackend> MapViewController<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let search = Debouncer::new(config.search_debounce_ms);
        Self {
            config,
            backend,
            map: None,
            lifecycle: Lifecycle::Created,
            modes: ViewModeController::new(),
            world: World::new(),
            filters: Category::ALL
                .into_iter()
                .map(|c| (c, FilterState::default()))
                .collect(),
            search,
            viewport: ViewportTracker::new(),
            selection: SelectionState::new(),
            reconciler: MarkerReconciler::new(),
            effects: Vec::new(),
            bus: EventBus::new(),
            metrics: Metrics::new(),
        }
    }

    /// Creates the map, derives the initial mode from `route` and draws the
    /// first marker set.
    pub fn init(&mut self, route: &str) -> Result<(), EngineError> {
        if self.lifecycle != Lifecycle::Created {
            return Err(EngineError::AlreadyInitialized);
        }
        let map = self
            .backend
            .create_map(self.config.default_center, self.config.default_zoom)?;
        if let Some(bounds) = map.bounds() {
            self.viewport.update(bounds);
        }
        self.map = Some(map);
        self.lifecycle = Lifecycle::Live;
        tracing::info!(route, "map view initialized");

        let resolution = resolve_route(route, &self.config.route_prefix);
        if let RouteResolution::Redirect { path, .. } = &resolution {
            self.effects.push(UiEffect::ReplaceRoute { path: path.clone() });
        }
        self.switch_mode(resolution.mode());
        Ok(())
    }

    /// Removes every marker and releases the map. Idempotent.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        if let Some(mut map) = self.map.take() {
            let removed = self.reconciler.clear(&mut map).unwrap_or(0);
            self.metrics.add(Counter::MarkersRemoved, removed as u64);
            map.destroy();
        }
        if self.search.cancel() {
            self.metrics.inc(Counter::SearchesDiscarded);
        }
        self.metrics.set_live_markers(0);
        self.lifecycle = Lifecycle::TornDown;
        self.bus.emit("mode", "teardown");
        tracing::info!("map view torn down");
    }

    /// Tab click: switches mode and pushes its route. A no-op for the mode
    /// already shown.
    pub fn navigate_to(&mut self, mode: ViewMode) -> Result<(), EngineError> {
        if !self.require_live()? {
            return Ok(());
        }
        if self.switch_mode(mode) {
            let path = route_for(mode, &self.config.route_prefix);
            self.effects.push(UiEffect::PushRoute { path });
        }
        Ok(())
    }

    /// Location changed outside the engine (back/forward, typed URL).
    pub fn on_route_changed(&mut self, path: &str) -> Result<(), EngineError> {
        if !self.require_live()? {
            return Ok(());
        }
        let resolution = resolve_route(path, &self.config.route_prefix);
        if let RouteResolution::Redirect { path, .. } = &resolution {
            self.effects.push(UiEffect::ReplaceRoute { path: path.clone() });
        }
        self.switch_mode(resolution.mode());
        Ok(())
    }

    /// Stores a provider refresh. Only the active category is redrawn; others
    /// take effect once they become active.
    pub fn apply_provider_update(&mut self, category: Category, update: ProviderUpdate) {
        let summary = self.world.apply(category, update);
        self.metrics.inc(Counter::ProviderUpdatesApplied);
        self.bus.emit(
            "provider",
            format!(
                "{category}: {} items{}",
                summary.kept,
                if self.world.is_loading(category) { " (loading)" } else { "" }
            ),
        );

        let selection_lost = self
            .selection
            .selected_id(category)
            .is_some_and(|id| !self.world.contains(category, id));
        if selection_lost {
            self.selection.clear();
            self.bus.emit("select", format!("{category}: selection dropped by provider"));
        }

        if self.lifecycle == Lifecycle::Live && self.modes.active() == Some(category) {
            self.reconcile();
        } else {
            self.metrics.inc(Counter::ProviderUpdatesDeferred);
        }
    }

    /// Keystroke in the search box. Applied after the quiet period via
    /// `tick`; the host is asked to schedule it.
    pub fn set_search_text(&mut self, text: &str, now: Time) -> Result<(), EngineError> {
        let Some(mode) = self.live_mode()? else {
            return Ok(());
        };
        let at = self.search.schedule((mode, text.to_string()), now);
        self.effects.push(UiEffect::ScheduleTick { at });
        Ok(())
    }

    /// Applies a pending search whose quiet period has elapsed. Returns
    /// `true` if one was applied.
    pub fn tick(&mut self, now: Time) -> bool {
        if self.lifecycle != Lifecycle::Live {
            return false;
        }
        let Some((mode, text)) = self.search.poll(now) else {
            return false;
        };
        if self.modes.active() != Some(mode) {
            self.metrics.inc(Counter::SearchesDiscarded);
            return false;
        }
        self.bus.emit("search", format!("{mode}: {text:?}"));
        self.metrics.inc(Counter::SearchesApplied);
        self.update_filter(mode, |f| f.query = text);
        true
    }

    pub fn pending_search(&self) -> Option<&str> {
        self.search.pending().map(|(_, text)| text.as_str())
    }

    pub fn set_city(&mut self, city: Option<String>) -> Result<(), EngineError> {
        self.edit_filter(|f| f.city = city)
    }

    pub fn set_district(&mut self, district: Option<String>) -> Result<(), EngineError> {
        self.edit_filter(|f| f.district = district)
    }

    pub fn set_category_id(&mut self, category_id: Option<i64>) -> Result<(), EngineError> {
        self.edit_filter(|f| f.category_id = category_id)
    }

    pub fn set_venue_type(&mut self, venue_type: Option<String>) -> Result<(), EngineError> {
        self.edit_filter(|f| f.venue_type = venue_type)
    }

    pub fn toggle_brand(&mut self, brand: &str) -> Result<(), EngineError> {
        self.edit_filter(|f| toggle(&mut f.brands, brand))
    }

    pub fn toggle_tag(&mut self, tag: &str) -> Result<(), EngineError> {
        self.edit_filter(|f| toggle(&mut f.tags, tag))
    }

    pub fn set_on_site_only(&mut self, on: bool) -> Result<(), EngineError> {
        self.edit_filter(|f| f.on_site_only = on)
    }

    pub fn set_fast_charger_only(&mut self, on: bool) -> Result<(), EngineError> {
        self.edit_filter(|f| f.fast_charger_only = on)
    }

    pub fn set_open_24h_only(&mut self, on: bool) -> Result<(), EngineError> {
        self.edit_filter(|f| f.open_24h_only = on)
    }

    /// Raw text from the rating input; anything non-numeric clears it.
    pub fn set_min_rating_input(&mut self, raw: &str) -> Result<(), EngineError> {
        self.edit_filter(|f| f.set_min_rating_input(raw))
    }

    /// Replaces the active mode's filters wholesale. Cancels a pending search
    /// since the new state carries its own query.
    pub fn replace_filter(&mut self, state: FilterState) -> Result<(), EngineError> {
        if self.live_mode()?.is_some() && self.search.cancel() {
            self.metrics.inc(Counter::SearchesDiscarded);
        }
        self.edit_filter(|f| *f = state)
    }

    pub fn clear_filters(&mut self) -> Result<(), EngineError> {
        self.replace_filter(FilterState::default())
    }

    pub fn filter(&self, category: Category) -> Option<&FilterState> {
        self.filters.get(&category)
    }

    /// Pan/zoom finished. Restricts the list and markers; never refetches.
    pub fn on_viewport_changed(&mut self, bounds: GeoBounds) {
        if self.lifecycle != Lifecycle::Live {
            return;
        }
        if self.viewport.update(bounds) {
            self.reconcile();
        }
    }

    /// Marker click: select, bring the row to the top of the list and redraw
    /// with the popup open.
    pub fn on_marker_click(&mut self, binding: MarkerBinding) -> Result<(), EngineError> {
        let Some(mode) = self.live_mode()? else {
            return Ok(());
        };
        if binding.category != mode || !self.world.contains(mode, &binding.entity_id) {
            tracing::debug!(category = %binding.category, id = %binding.entity_id, "stale marker click ignored");
            return Ok(());
        }
        self.select(mode, binding.entity_id);
        self.effects.push(UiEffect::ScrollListToTop);
        self.reconcile();
        Ok(())
    }

    /// Row click: select and center the map on the entity.
    pub fn select_from_list(&mut self, id: EntityId) -> Result<(), EngineError> {
        let Some(mode) = self.live_mode()? else {
            return Ok(());
        };
        let Some(position) = self
            .world
            .items(mode)
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.map_position())
        else {
            tracing::debug!(%mode, %id, "list selection of unknown entity ignored");
            return Ok(());
        };
        self.select(mode, id);
        if let (Some(at), Some(map)) = (position, self.map.as_mut()) {
            if let Err(e) = map.set_view(at, self.config.focus_zoom) {
                tracing::warn!(error = %e, "could not center map on selection");
            }
        }
        self.reconcile();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.bus.emit("select", "cleared");
            if self.lifecycle == Lifecycle::Live {
                self.reconcile();
            }
        }
    }

    pub fn handle_surface_event(&mut self, event: SurfaceEvent) -> Result<(), EngineError> {
        match event {
            SurfaceEvent::MarkerClicked(binding) => self.on_marker_click(binding),
            SurfaceEvent::ViewportChanged(bounds) => {
                self.on_viewport_changed(bounds);
                Ok(())
            }
        }
    }

    pub fn drain_effects(&mut self) -> Vec<UiEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn view(&self) -> Option<MapView<'_>> {
        let mode = self.modes.active()?;
        let filter = self.filters.get(&mode)?;
        let items = self.list_items(mode);
        let selected = items.first().filter(|i| i.selected).map(|i| i.entity);
        Some(MapView {
            mode,
            is_loading: self.world.is_loading(mode),
            counts: self.world.counts(mode),
            filter,
            pending_query: self.pending_search(),
            items,
            selected,
        })
    }

    pub fn list_page(&self, page: usize) -> Option<ListPage<'_>> {
        let mode = self.modes.active()?;
        Some(ListPage::paginate(
            self.list_items(mode),
            page,
            self.config.page_size,
        ))
    }

    /// The selected entity as a bottom-sheet card, if it is in the list.
    pub fn preview_card(&self) -> Option<PreviewCard<'_>> {
        let mode = self.modes.active()?;
        let entity = self
            .display_set(mode)
            .into_iter()
            .next()
            .filter(|e| self.selection.is_selected(mode, &e.id))?;
        Some(PreviewCard {
            category: mode,
            entity,
            content: strategy_for(mode).build_popup(entity),
        })
    }

    pub fn active_mode(&self) -> Option<ViewMode> {
        self.modes.active()
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Live
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn viewport(&self) -> Option<&GeoBounds> {
        self.viewport.bounds()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn surface(&self) -> Option<&B::Map> {
        self.map.as_ref()
    }

    /// Host-side access to the map, e.g. to pump its events.
    pub fn surface_mut(&mut self) -> Option<&mut B::Map> {
        self.map.as_mut()
    }

    /// `Ok(true)` when live, `Ok(false)` after teardown.
    fn require_live(&self) -> Result<bool, EngineError> {
        match self.lifecycle {
            Lifecycle::Created => Err(EngineError::NotInitialized),
            Lifecycle::Live => Ok(true),
            Lifecycle::TornDown => Ok(false),
        }
    }

    fn live_mode(&self) -> Result<Option<ViewMode>, EngineError> {
        Ok(if self.require_live()? {
            self.modes.active()
        } else {
            None
        })
    }

    /// Returns `true` if the mode actually changed.
    fn switch_mode(&mut self, to: ViewMode) -> bool {
        let Transition::Switched { from, to } = self.modes.transition(to) else {
            return false;
        };
        if self.selection.clear() {
            self.bus.emit("select", "cleared by mode switch");
        }
        if self.search.cancel() {
            self.metrics.inc(Counter::SearchesDiscarded);
            self.bus.emit("search", "pending search discarded by mode switch");
        }
        if let Some(map) = self.map.as_mut() {
            let removed = self.reconciler.clear(map).unwrap_or(0);
            self.metrics.add(Counter::MarkersRemoved, removed as u64);
            self.metrics.set_live_markers(0);
        }
        self.metrics.inc(Counter::ModeSwitches);
        match from {
            Some(from) => self.bus.emit("mode", format!("{from} -> {to}")),
            None => self.bus.emit("mode", format!("-> {to}")),
        }
        tracing::info!(from = ?from, %to, "view mode switched");
        self.reconcile();
        true
    }

    fn select(&mut self, mode: ViewMode, id: EntityId) {
        let message = format!("{mode}: {id}");
        if self.selection.select(mode, id) {
            self.bus.emit("select", message);
        }
    }

    fn edit_filter(&mut self, edit: impl FnOnce(&mut FilterState)) -> Result<(), EngineError> {
        let Some(mode) = self.live_mode()? else {
            return Ok(());
        };
        self.update_filter(mode, edit);
        Ok(())
    }

    fn update_filter(&mut self, mode: ViewMode, edit: impl FnOnce(&mut FilterState)) {
        let state = self.filters.entry(mode).or_default();
        let before = state.clone();
        edit(state);
        if *state != before {
            self.reconcile();
        }
    }

    /// Filtered, in-view entities of `mode`; the selected one first.
    fn display_set(&self, mode: ViewMode) -> Vec<&Entity> {
        let Some(state) = self.filters.get(&mode) else {
            return Vec::new();
        };
        let filtered = filter_entities(self.world.items(mode), state, strategy_for(mode));
        let visible = restrict_to_viewport(filtered, self.viewport.bounds());
        order_for_display(visible, self.selection.selected_id(mode))
    }

    fn list_items(&self, mode: ViewMode) -> Vec<ListItem<'_>> {
        self.display_set(mode)
            .into_iter()
            .map(|e| ListItem::new(e, self.selection.is_selected(mode, &e.id)))
            .collect()
    }

    fn reconcile(&mut self) {
        let Some(mode) = self.modes.active() else {
            return;
        };
        if self.map.is_none() {
            return;
        }
        let display = self.display_set(mode);
        let plan = plan_markers(&display, strategy_for(mode), self.selection.selected_id(mode));
        let listed = display.len();

        let Some(map) = self.map.as_mut() else {
            return;
        };
        let outcome = self.reconciler.apply(map, &plan);

        self.metrics.inc(Counter::ReconcileRuns);
        self.metrics.record_eligible(plan.len() as u64);
        self.metrics.add(Counter::MarkersCreated, outcome.created() as u64);
        self.metrics.add(Counter::MarkersRemoved, outcome.removed() as u64);
        self.metrics.set_live_markers(self.reconciler.live_count() as u64);
        match outcome {
            ReconcileOutcome::Applied { created, .. } => {
                tracing::debug!(%mode, listed, markers = created, "reconciled");
                self.bus
                    .emit("reconcile", format!("{mode}: {created} markers, {listed} listed"));
            }
            ReconcileOutcome::Aborted { created, .. } => {
                self.metrics.inc(Counter::ReconcileAborted);
                self.bus.emit(
                    "reconcile",
                    format!("{mode}: aborted after {created} of {} markers", plan.len()),
                );
            }
        }
    }
}

fn toggle(set: &mut std::collections::BTreeSet<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if !set.remove(value) {
        set.insert(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::MapViewController;
    use crate::config::EngineConfig;
    use crate::effects::UiEffect;
    use crate::error::EngineError;
    use foundation::bounds::GeoBounds;
    use foundation::ids::EntityId;
    use foundation::time::Time;
    use layers::symbology::{MARKER_SIZE_PX, MARKER_SIZE_SELECTED_PX};
    use pretty_assertions::assert_eq;
    use runtime::Counter;
    use scene::entity::{Attributes, Category, Entity, ListingAttributes};
    use scene::query::FilterState;
    use scene::world::ProviderUpdate;
    use surface::SurfaceError;
    use surface::recording::{RecordingBackend, RecordingSurface};

    type Controller = MapViewController<RecordingBackend>;

    fn live(route: &str) -> Controller {
        let mut c = MapViewController::new(RecordingBackend::new(), EngineConfig::default());
        c.init(route).unwrap();
        c.drain_effects();
        c
    }

    fn surface(c: &Controller) -> &RecordingSurface {
        c.surface().unwrap()
    }

    /// Feeds queued surface events back into the controller, like the
    /// browser adapter does.
    fn pump(c: &mut Controller) {
        let events = c.surface_mut().unwrap().take_events();
        for ev in events {
            c.handle_surface_event(ev).unwrap();
        }
    }

    fn click(c: &mut Controller, category: Category, id: i64) {
        let (handle, _) = surface(c).marker_for(category, &EntityId::Int(id)).unwrap();
        c.surface_mut().unwrap().click(handle).unwrap();
        pump(c);
    }

    /// `n` entities in a row, east of the city center and inside the
    /// initial viewport.
    fn row(category: Category, n: i64) -> Vec<Entity> {
        (1..=n)
            .map(|i| {
                Entity::of(category, i, format!("{category} {i}"))
                    .at(41.7, 44.80 + (i - 1) as f64 * 0.01)
            })
            .collect()
    }

    fn sizes(s: &RecordingSurface) -> Vec<(String, u32)> {
        s.markers()
            .map(|(_, m)| {
                (
                    m.binding.as_ref().unwrap().entity_id.to_string(),
                    m.visual.size_px,
                )
            })
            .collect()
    }

    #[test]
    fn lifecycle_errors() {
        let mut c = MapViewController::new(RecordingBackend::new(), EngineConfig::default());
        assert_eq!(c.navigate_to(Category::Drives), Err(EngineError::NotInitialized));
        c.init("/map").unwrap();
        assert_eq!(c.init("/map"), Err(EngineError::AlreadyInitialized));

        let mut broken =
            MapViewController::new(RecordingBackend::failing("no container"), EngineConfig::default());
        assert_eq!(
            broken.init("/map"),
            Err(EngineError::Surface(SurfaceError::Backend("no container".into())))
        );
        assert!(!broken.is_live());
    }

    #[test]
    fn initial_route_selects_mode() {
        let mut c = MapViewController::new(RecordingBackend::new(), EngineConfig::default());
        c.init("/map/chargers").unwrap();
        assert_eq!(c.active_mode(), Some(Category::Chargers));
        assert!(c.drain_effects().is_empty());
        assert!(c.viewport().is_some());

        let mut c = MapViewController::new(RecordingBackend::new(), EngineConfig::default());
        c.init("/map/yachts").unwrap();
        assert_eq!(c.active_mode(), Some(Category::Listings));
        assert_eq!(
            c.drain_effects(),
            vec![UiEffect::ReplaceRoute {
                path: "/map/listings".into()
            }]
        );
    }

    #[test]
    fn entity_without_coordinates_is_listed_but_not_drawn() {
        let mut c = live("/map/stations");
        let mut raw = row(Category::Stations, 2);
        raw.push(Entity::of(Category::Stations, 7, "No coords"));
        c.apply_provider_update(Category::Stations, ProviderUpdate::loaded(raw));

        let view = c.view().unwrap();
        assert_eq!(view.ids(), vec!["1", "2", "7"]);
        assert!(!view.items[2].on_map);
        assert_eq!(view.counts.total, 3);
        assert_eq!(view.counts.with_coordinates, 2);
        assert_eq!(surface(&c).bound_ids(), vec!["1", "2"]);
    }

    #[test]
    fn marker_click_selects_reorders_and_opens_popup() {
        let mut c = live("/map");
        let mut raw = row(Category::Listings, 3);
        raw.push(Entity::of(Category::Listings, 42, "Brake Masters").at(41.71, 44.83));
        c.apply_provider_update(Category::Listings, ProviderUpdate::loaded(raw));

        click(&mut c, Category::Listings, 42);

        assert_eq!(c.selection().selected_id(Category::Listings), Some(&EntityId::Int(42)));
        assert_eq!(c.view().unwrap().ids()[0], "42");
        assert_eq!(c.drain_effects(), vec![UiEffect::ScrollListToTop]);

        let s = surface(&c);
        let (handle, marker) = s.marker_for(Category::Listings, &EntityId::Int(42)).unwrap();
        assert!(marker.popup_open);
        assert_eq!(s.open_popups(), vec![handle]);
        for (id, size) in sizes(s) {
            let expected = if id == "42" {
                MARKER_SIZE_SELECTED_PX
            } else {
                MARKER_SIZE_PX
            };
            assert_eq!(size, expected, "marker {id}");
        }

        let card = c.preview_card().unwrap();
        assert_eq!(card.entity.id, EntityId::Int(42));
        assert_eq!(card.content.title, "Brake Masters");
    }

    #[test]
    fn pending_search_is_discarded_by_mode_switch() {
        let mut c = live("/map");
        c.apply_provider_update(
            Category::Listings,
            ProviderUpdate::loaded(vec![
                Entity::of(Category::Listings, 1, "Brake Masters").at(41.7, 44.8),
                Entity::of(Category::Listings, 2, "Oil & Go").at(41.7, 44.81),
            ]),
        );
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 3)));

        c.set_search_text("brake", Time(0.0)).unwrap();
        assert_eq!(c.pending_search(), Some("brake"));
        c.navigate_to(Category::Drives).unwrap();
        assert!(!c.tick(Time(1.0)));

        let view = c.view().unwrap();
        assert_eq!(view.mode, Category::Drives);
        assert_eq!(view.ids(), vec!["1", "2", "3"]);
        assert_eq!(view.pending_query, None);
        assert_eq!(c.filter(Category::Listings).unwrap().query, "");
        assert_eq!(c.metrics().counter(Counter::SearchesDiscarded), 1);
        assert_eq!(surface(&c).marker_count(), 3);
        assert!(c.drain_effects().contains(&UiEffect::PushRoute {
            path: "/map/drives".into()
        }));
    }

    #[test]
    fn switching_modes_leaves_only_new_category_markers() {
        let mut c = live("/map");
        c.apply_provider_update(Category::Listings, ProviderUpdate::loaded(row(Category::Listings, 3)));
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 2)));
        click(&mut c, Category::Listings, 2);
        assert_eq!(
            c.selection().current(),
            Some((Category::Listings, &EntityId::Int(2)))
        );
        assert_eq!(surface(&c).open_popups().len(), 1);

        c.navigate_to(Category::Drives).unwrap();

        let s = surface(&c);
        assert_eq!(s.marker_count(), 2);
        assert!(s.markers().all(|(_, m)| {
            m.binding.as_ref().map(|b| b.category) == Some(Category::Drives)
        }));
        assert!(s.open_popups().is_empty());
        assert_eq!(c.selection().current(), None);
        assert_eq!(sizes(s), vec![("1".into(), MARKER_SIZE_PX), ("2".into(), MARKER_SIZE_PX)]);
    }

    #[test]
    fn panning_removes_exactly_the_markers_that_left_the_view() {
        let mut c = live("/map/chargers");
        c.apply_provider_update(Category::Chargers, ProviderUpdate::loaded(row(Category::Chargers, 6)));
        click(&mut c, Category::Chargers, 5);
        let before = sizes(surface(&c));
        assert_eq!(before.len(), 6);

        // Keeps 44.83, 44.84 and 44.85.
        c.surface_mut()
            .unwrap()
            .pan_to(GeoBounds::from_edges(41.6, 44.825, 41.8, 44.9));
        pump(&mut c);

        let mut after = sizes(surface(&c));
        after.sort();
        let mut kept: Vec<(String, u32)> = before
            .into_iter()
            .filter(|(id, _)| ["4", "5", "6"].contains(&id.as_str()))
            .collect();
        kept.sort();
        assert_eq!(after, kept);
        assert_eq!(c.view().unwrap().ids(), vec!["5", "4", "6"]);
        let (_, selected) = surface(&c)
            .marker_for(Category::Chargers, &EntityId::Int(5))
            .unwrap();
        assert!(selected.popup_open);
    }

    #[test]
    fn unchanged_inputs_reconcile_to_the_same_surface() {
        let mut c = live("/map/drives");
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 4)));
        click(&mut c, Category::Drives, 2);
        let snapshot = sizes(surface(&c));
        let open = surface(&c).open_popups().len();

        c.set_open_24h_only(true).unwrap();
        assert_eq!(surface(&c).marker_count(), 0);
        c.set_open_24h_only(false).unwrap();

        assert_eq!(sizes(surface(&c)), snapshot);
        assert_eq!(surface(&c).open_popups().len(), open);
    }

    #[test]
    fn selection_never_crosses_categories() {
        let mut c = live("/map/chargers");
        c.apply_provider_update(Category::Chargers, ProviderUpdate::loaded(row(Category::Chargers, 3)));
        c.apply_provider_update(Category::Stations, ProviderUpdate::loaded(row(Category::Stations, 3)));
        click(&mut c, Category::Chargers, 1);

        c.navigate_to(Category::Stations).unwrap();
        assert_eq!(c.selection().current(), None);
        assert!(surface(&c).open_popups().is_empty());
        assert!(sizes(surface(&c)).iter().all(|(_, size)| *size == MARKER_SIZE_PX));
        assert!(c.preview_card().is_none());

        // A marker click bound to the previous layer is ignored.
        c.on_marker_click(surface::MarkerBinding::new(Category::Chargers, EntityId::Int(2)))
            .unwrap();
        assert_eq!(c.selection().current(), None);
    }

    #[test]
    fn navigating_to_active_mode_is_a_no_op() {
        let mut c = live("/map/drives");
        let switches = c.metrics().counter(Counter::ModeSwitches);
        c.navigate_to(Category::Drives).unwrap();
        assert!(c.drain_effects().is_empty());
        assert_eq!(c.metrics().counter(Counter::ModeSwitches), switches);
    }

    #[test]
    fn back_navigation_switches_without_pushing() {
        let mut c = live("/map/drives");
        c.on_route_changed("/map/stations").unwrap();
        assert_eq!(c.active_mode(), Some(Category::Stations));
        assert!(c.drain_effects().is_empty());
        c.on_route_changed("/map/garbage").unwrap();
        assert_eq!(c.active_mode(), Some(Category::Listings));
        assert_eq!(
            c.drain_effects(),
            vec![UiEffect::ReplaceRoute {
                path: "/map/listings".into()
            }]
        );
    }

    #[test]
    fn late_data_for_inactive_category_waits() {
        let mut c = live("/map");
        c.apply_provider_update(Category::Chargers, ProviderUpdate::loaded(row(Category::Chargers, 2)));
        assert_eq!(surface(&c).marker_count(), 0);
        assert_eq!(c.metrics().counter(Counter::ProviderUpdatesDeferred), 1);

        c.navigate_to(Category::Chargers).unwrap();
        assert_eq!(surface(&c).marker_count(), 2);
    }

    #[test]
    fn loading_flag_and_failed_fetch() {
        let mut c = live("/map/stations");
        assert!(c.view().unwrap().is_loading);
        c.apply_provider_update(Category::Stations, ProviderUpdate::loading());
        assert!(c.view().unwrap().is_loading);
        c.apply_provider_update(Category::Stations, ProviderUpdate::failed());
        let view = c.view().unwrap();
        assert!(!view.is_loading);
        assert!(view.items.is_empty());
    }

    #[test]
    fn selection_dropped_when_entity_disappears() {
        let mut c = live("/map/drives");
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 3)));
        click(&mut c, Category::Drives, 3);
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 2)));
        assert_eq!(c.selection().current(), None);
        assert!(surface(&c).open_popups().is_empty());
    }

    #[test]
    fn filtered_out_selection_is_kept_but_not_shown() {
        let mut c = live("/map/drives");
        c.apply_provider_update(
            Category::Drives,
            ProviderUpdate::loaded(vec![
                Entity::of(Category::Drives, 1, "Rustavi").at(41.7, 44.8).in_city("Rustavi"),
                Entity::of(Category::Drives, 2, "Lisi").at(41.7, 44.81).in_city("Tbilisi"),
            ]),
        );
        click(&mut c, Category::Drives, 1);
        c.set_city(Some("Tbilisi".into())).unwrap();
        assert_eq!(c.selection().selected_id(Category::Drives), Some(&EntityId::Int(1)));
        assert_eq!(c.view().unwrap().ids(), vec!["2"]);
        assert!(c.view().unwrap().selected.is_none());
        assert!(c.preview_card().is_none());

        c.set_city(None).unwrap();
        assert_eq!(c.view().unwrap().ids(), vec!["1", "2"]);
    }

    #[test]
    fn search_applies_after_quiet_period() {
        let mut c = live("/map/stations");
        c.apply_provider_update(
            Category::Stations,
            ProviderUpdate::loaded(vec![
                Entity::of(Category::Stations, 1, "Gulf Vake").at(41.7, 44.8),
                Entity::of(Category::Stations, 2, "Wissol").at(41.7, 44.81),
            ]),
        );
        c.set_search_text("gu", Time(0.0)).unwrap();
        c.set_search_text("gulf", Time(0.2)).unwrap();
        let ticks: Vec<UiEffect> = c.drain_effects();
        assert_eq!(ticks.len(), 2);

        assert!(!c.tick(Time(0.6)));
        assert_eq!(c.view().unwrap().ids(), vec!["1", "2"]);
        assert!(c.tick(Time(0.8)));
        assert_eq!(c.filter(Category::Stations).unwrap().query, "gulf");
        assert_eq!(c.view().unwrap().ids(), vec!["1"]);
        assert_eq!(surface(&c).marker_count(), 1);
        assert!(!c.tick(Time(2.0)));
    }

    #[test]
    fn filters_apply_immediately_and_coerce_bad_input() {
        let mut c = live("/map");
        c.apply_provider_update(
            Category::Listings,
            ProviderUpdate::loaded(vec![
                Entity::new(
                    1,
                    "Mobile mechanic",
                    Attributes::Listings(ListingAttributes {
                        on_site: true,
                        ..Default::default()
                    }),
                )
                .at(41.7, 44.8)
                .with_rating(4.8)
                .with_tags(["brakes", "tyres"]),
                Entity::of(Category::Listings, 2, "Garage").at(41.7, 44.81).with_rating(3.9),
            ]),
        );
        c.set_on_site_only(true).unwrap();
        assert_eq!(c.view().unwrap().ids(), vec!["1"]);
        c.set_on_site_only(false).unwrap();

        c.set_min_rating_input("4.5").unwrap();
        assert_eq!(c.view().unwrap().ids(), vec!["1"]);
        c.set_min_rating_input("four").unwrap();
        assert_eq!(c.filter(Category::Listings).unwrap().min_rating, None);
        assert_eq!(c.view().unwrap().ids(), vec!["1", "2"]);

        c.toggle_tag("brakes").unwrap();
        c.toggle_tag("tyres").unwrap();
        assert_eq!(c.view().unwrap().ids(), vec!["1"]);
        c.clear_filters().unwrap();
        assert!(c.filter(Category::Listings).unwrap().is_identity());
        assert_eq!(c.view().unwrap().ids(), vec!["1", "2"]);
    }

    #[test]
    fn filters_are_remembered_per_mode() {
        let mut c = live("/map/chargers");
        c.set_fast_charger_only(true).unwrap();
        c.navigate_to(Category::Stations).unwrap();
        assert!(c.filter(Category::Stations).unwrap().is_identity());
        c.navigate_to(Category::Chargers).unwrap();
        assert!(c.filter(Category::Chargers).unwrap().fast_charger_only);

        c.replace_filter(FilterState::new().with_query("tesla")).unwrap();
        assert_eq!(c.filter(Category::Chargers).unwrap().query, "tesla");
    }

    #[test]
    fn list_selection_centers_map_at_focus_zoom() {
        let mut c = live("/map/drives");
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 3)));
        c.select_from_list(EntityId::Int(2)).unwrap();

        let target = c.world().items(Category::Drives)[1].coordinates.unwrap();
        let s = surface(&c);
        assert_eq!(s.zoom(), 15.0);
        assert_eq!(s.center(), target);
        pump(&mut c);
        let view = c.view().unwrap();
        assert_eq!(view.ids()[0], "2");
        assert!(c.viewport().unwrap().east() - c.viewport().unwrap().west() < 0.1);
        assert!(c.drain_effects().is_empty());

        c.select_from_list(EntityId::Int(99)).unwrap();
        assert_eq!(c.selection().selected_id(Category::Drives), Some(&EntityId::Int(2)));

        c.clear_selection();
        assert!(surface(&c).open_popups().is_empty());
    }

    #[test]
    fn list_pages_follow_display_order() {
        let config = EngineConfig {
            page_size: 2,
            ..EngineConfig::default()
        };
        let mut c = MapViewController::new(RecordingBackend::new(), config);
        c.init("/map/stations").unwrap();
        c.apply_provider_update(Category::Stations, ProviderUpdate::loaded(row(Category::Stations, 5)));
        click(&mut c, Category::Stations, 4);

        let first = c.list_page(1).unwrap();
        assert_eq!(first.page_count, 3);
        let ids: Vec<String> = first.items.iter().map(|i| i.entity.id.to_string()).collect();
        assert_eq!(ids, vec!["4", "1"]);
        assert!(first.items[0].selected);
        let last = c.list_page(3).unwrap();
        assert_eq!(last.items.len(), 1);
    }

    #[test]
    fn surface_detached_mid_reconcile_then_teardown() {
        let mut c = live("/map/chargers");
        c.surface_mut().unwrap().detach_after_adds(2);
        c.apply_provider_update(Category::Chargers, ProviderUpdate::loaded(row(Category::Chargers, 5)));
        assert_eq!(c.metrics().counter(Counter::ReconcileAborted), 1);
        assert!(c.events().of_kind("reconcile").any(|e| e.message.contains("aborted")));

        c.teardown();
        assert!(c.surface().is_none());
        assert!(!c.is_live());
        assert_eq!(c.metrics().live_markers(), 0);

        // Everything after teardown is accepted and ignored.
        c.navigate_to(Category::Drives).unwrap();
        c.set_search_text("x", Time(0.0)).unwrap();
        assert!(!c.tick(Time(5.0)));
        c.on_viewport_changed(GeoBounds::from_edges(0.0, 0.0, 1.0, 1.0));
        assert!(c.drain_effects().is_empty());
        assert_eq!(c.active_mode(), Some(Category::Chargers));
        c.teardown();
    }

    #[test]
    fn teardown_clears_markers_and_pending_search() {
        let mut c = live("/map/drives");
        c.apply_provider_update(Category::Drives, ProviderUpdate::loaded(row(Category::Drives, 3)));
        c.set_search_text("d", Time(0.0)).unwrap();
        let created = c.metrics().counter(Counter::MarkersCreated);
        c.teardown();
        assert_eq!(c.pending_search(), None);
        assert_eq!(c.metrics().counter(Counter::MarkersRemoved), created);
        assert!(c.events().of_kind("mode").any(|e| e.message == "teardown"));
    }
}
