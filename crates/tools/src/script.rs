use std::fs;
use std::path::{Path, PathBuf};

use engine::view_mode::{DEFAULT_MODE, route_for};
use engine::{EngineConfig, EngineError, MapViewController, UiEffect};
use foundation::bounds::GeoBounds;
use foundation::ids::EntityId;
use foundation::time::Time;
use scene::entity::{Category, Entity};
use scene::query::FilterState;
use scene::world::{ProviderUpdate, parse_provider_rows};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surface::recording::RecordingBackend;

#[derive(Debug)]
pub enum ReplayError {
    Io { path: PathBuf, message: String },
    Parse { what: String, message: String },
    Engine(EngineError),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io { path, message } => write!(f, "read {}: {message}", path.display()),
            ReplayError::Parse { what, message } => write!(f, "parse {what}: {message}"),
            ReplayError::Engine(e) => write!(f, "engine: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<EngineError> for ReplayError {
    fn from(e: EngineError) -> Self {
        ReplayError::Engine(e)
    }
}

/// A recorded user session: the route the page opened on and what happened
/// afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Tab or header link.
    Navigate { mode: Category },
    /// Browser back/forward.
    Route { path: String },
    /// User pan/zoom ending on `[south, west, north, east]`.
    Pan { bounds: [f64; 4] },
    Search { text: String, at_ms: u64 },
    Tick { at_ms: u64 },
    /// Click on the marker standing for `id`.
    Click { category: Category, id: EntityId },
    /// Click on a sidebar row.
    Select { id: EntityId },
    ClearSelection,
    Filter { state: FilterState },
    Provider {
        category: Category,
        /// `null` for a failed fetch.
        items: Option<Vec<Value>>,
        #[serde(default)]
        is_loading: bool,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::Route { .. } => "route",
            Step::Pan { .. } => "pan",
            Step::Search { .. } => "search",
            Step::Tick { .. } => "tick",
            Step::Click { .. } => "click",
            Step::Select { .. } => "select",
            Step::ClearSelection => "clear_selection",
            Step::Filter { .. } => "filter",
            Step::Provider { .. } => "provider",
        }
    }
}

/// State after one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub mode: Option<Category>,
    pub is_loading: bool,
    pub list: Vec<String>,
    pub selected: Option<String>,
    pub markers: Vec<String>,
    pub open_popup: Option<String>,
    pub effects: Vec<UiEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub initial: StepReport,
    pub steps: Vec<StepReport>,
    pub counters: Vec<(&'static str, u64)>,
}

/// Reads `<category>.json` for every category present in `dir`.
pub fn load_dataset(dir: &Path) -> Result<Vec<(Category, Vec<Entity>)>, ReplayError> {
    let mut out = Vec::new();
    for category in Category::ALL {
        let path = dir.join(format!("{}.json", category.as_str()));
        if !path.exists() {
            continue;
        }
        let text = read(&path)?;
        let rows: Vec<Value> = serde_json::from_str(&text).map_err(|e| ReplayError::Parse {
            what: path.display().to_string(),
            message: e.to_string(),
        })?;
        let items = parse_provider_rows(category, rows);
        tracing::info!(%category, count = items.len(), "dataset loaded");
        out.push((category, items));
    }
    Ok(out)
}

pub fn read(path: &Path) -> Result<String, ReplayError> {
    fs::read_to_string(path).map_err(|e| ReplayError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn parse_session(json: &str) -> Result<Session, ReplayError> {
    serde_json::from_str(json).map_err(|e| ReplayError::Parse {
        what: "session".to_string(),
        message: e.to_string(),
    })
}

type Controller = MapViewController<RecordingBackend>;

/// Runs a session headless against a recording surface.
pub fn replay(
    config: EngineConfig,
    dataset: Vec<(Category, Vec<Entity>)>,
    session: &Session,
) -> Result<ReplayReport, ReplayError> {
    let route = session
        .route
        .clone()
        .unwrap_or_else(|| route_for(DEFAULT_MODE, &config.route_prefix));
    let mut c = MapViewController::new(RecordingBackend::new(), config);
    c.init(&route)?;
    for (category, items) in dataset {
        c.apply_provider_update(category, ProviderUpdate::loaded(items));
    }
    pump(&mut c)?;
    let initial = report(&mut c, 0, "init");

    let mut steps = Vec::with_capacity(session.steps.len());
    for (i, step) in session.steps.iter().enumerate() {
        run_step(&mut c, step)?;
        pump(&mut c)?;
        steps.push(report(&mut c, i + 1, step.op()));
    }

    let counters = c.metrics().snapshot().counters;
    c.teardown();
    Ok(ReplayReport {
        initial,
        steps,
        counters,
    })
}

fn run_step(c: &mut Controller, step: &Step) -> Result<(), ReplayError> {
    match step {
        Step::Navigate { mode } => c.navigate_to(*mode)?,
        Step::Route { path } => c.on_route_changed(path)?,
        Step::Pan { bounds } => {
            let [s, w, n, e] = *bounds;
            if let Some(surface) = c.surface_mut() {
                surface.pan_to(GeoBounds::from_edges(s, w, n, e));
            }
        }
        Step::Search { text, at_ms } => {
            c.set_search_text(text, Time::from_millis(*at_ms as f64))?;
        }
        Step::Tick { at_ms } => {
            c.tick(Time::from_millis(*at_ms as f64));
        }
        Step::Click { category, id } => {
            let clicked = c.surface_mut().and_then(|s| {
                let (handle, _) = s.marker_for(*category, id)?;
                s.click(handle)
            });
            if clicked.is_none() {
                tracing::warn!(%category, %id, "no marker to click");
            }
        }
        Step::Select { id } => c.select_from_list(id.clone())?,
        Step::ClearSelection => c.clear_selection(),
        Step::Filter { state } => c.replace_filter(state.clone())?,
        Step::Provider {
            category,
            items,
            is_loading,
        } => {
            let items = items.clone().map(|rows| parse_provider_rows(*category, rows));
            c.apply_provider_update(
                *category,
                ProviderUpdate {
                    items,
                    is_loading: *is_loading,
                },
            );
        }
    }
    Ok(())
}

/// Hands queued surface events to the controller until none are left.
fn pump(c: &mut Controller) -> Result<(), ReplayError> {
    loop {
        let events = match c.surface_mut() {
            Some(s) => s.take_events(),
            None => return Ok(()),
        };
        if events.is_empty() {
            return Ok(());
        }
        for event in events {
            c.handle_surface_event(event)?;
        }
    }
}

fn report(c: &mut Controller, step: usize, op: &'static str) -> StepReport {
    let effects = c.drain_effects();
    let (mode, is_loading, list, selected) = match c.view() {
        Some(v) => (
            Some(v.mode),
            v.is_loading,
            v.ids(),
            v.selected.map(|e| e.id.to_string()),
        ),
        None => (None, false, Vec::new(), None),
    };
    let (markers, open_popup) = match c.surface() {
        Some(s) => {
            let open = s
                .open_popups()
                .first()
                .and_then(|h| s.marker(*h))
                .and_then(|m| m.binding.as_ref())
                .map(|b| b.entity_id.to_string());
            (s.bound_ids(), open)
        }
        None => (Vec::new(), None),
    };
    StepReport {
        step,
        op,
        mode,
        is_loading,
        list,
        selected,
        markers,
        open_popup,
        effects,
    }
}
