use scene::entity::Category;

/// Which category the map shows. Owned by the route.
pub type ViewMode = Category;

/// Category shown when the route names none or an unknown one.
pub const DEFAULT_MODE: ViewMode = Category::Listings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResolution {
    Active(ViewMode),
    /// Unknown segment: show `mode` and replace the URL with `path`.
    Redirect { mode: ViewMode, path: String },
}

impl RouteResolution {
    pub fn mode(&self) -> ViewMode {
        match self {
            RouteResolution::Active(mode) => *mode,
            RouteResolution::Redirect { mode, .. } => *mode,
        }
    }
}

/// Resolves a location path like `/map/chargers?x=1` into a view mode.
///
/// A missing segment selects the default mode without a redirect; anything
/// that is not a category name redirects to it.
pub fn resolve_route(path: &str, prefix: &str) -> RouteResolution {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let rest = strip_prefix(path, prefix);
    match rest.split('/').find(|s| !s.is_empty()) {
        None => RouteResolution::Active(DEFAULT_MODE),
        Some(segment) => match Category::parse(segment) {
            Some(mode) => RouteResolution::Active(mode),
            None => RouteResolution::Redirect {
                mode: DEFAULT_MODE,
                path: route_for(DEFAULT_MODE, prefix),
            },
        },
    }
}

pub fn route_for(mode: ViewMode, prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{prefix}/{}", mode.as_str())
}

/// `path` with `prefix` removed if it starts with it on a segment boundary.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Switched {
        from: Option<ViewMode>,
        to: ViewMode,
    },
}

/// Tracks the active view mode. Switching to the mode already shown is a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct ViewModeController {
    active: Option<ViewMode>,
}

impl ViewModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<ViewMode> {
        self.active
    }

    pub fn transition(&mut self, target: ViewMode) -> Transition {
        if self.active == Some(target) {
            return Transition::Unchanged;
        }
        let from = self.active.replace(target);
        Transition::Switched { from, to: target }
    }
}
