use crate::surface::MarkerHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The map was destroyed or its container left the page.
    Detached,
    UnknownMarker(MarkerHandle),
    Backend(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Detached => write!(f, "map surface is detached"),
            SurfaceError::UnknownMarker(h) => write!(f, "unknown marker {}", h.0),
            SurfaceError::Backend(msg) => write!(f, "map backend error: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}
