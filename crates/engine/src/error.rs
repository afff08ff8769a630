use surface::SurfaceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An operation needed the map before `init` ran.
    NotInitialized,
    AlreadyInitialized,
    Surface(SurfaceError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotInitialized => write!(f, "map view not initialized"),
            EngineError::AlreadyInitialized => write!(f, "map view already initialized"),
            EngineError::Surface(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Surface(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SurfaceError> for EngineError {
    fn from(e: SurfaceError) -> Self {
        EngineError::Surface(e)
    }
}
