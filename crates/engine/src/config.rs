use foundation::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// Tbilisi, where the marketplace operates.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint::new(41.7151, 44.8271);

/// Highest zoom level the tile providers serve.
const MAX_ZOOM: f64 = 22.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Engine tunables. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before typed search text is applied.
    pub search_debounce_ms: u64,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    /// Zoom used when centering on an entity picked from the list.
    pub focus_zoom: f64,
    /// Sidebar rows per page.
    pub page_size: usize,
    /// Path the category segment is appended to, e.g. `/map/chargers`.
    pub route_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 500,
            default_center: DEFAULT_CENTER,
            default_zoom: 12.0,
            focus_zoom: 15.0,
            page_size: 20,
            route_prefix: "/map".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_center.is_valid() {
            return Err(invalid("default_center", "not a valid lat/lon"));
        }
        check_zoom("default_zoom", self.default_zoom)?;
        check_zoom("focus_zoom", self.focus_zoom)?;
        if self.page_size == 0 {
            return Err(invalid("page_size", "must be at least 1"));
        }
        if self.search_debounce_ms > 10_000 {
            return Err(invalid("search_debounce_ms", "must be at most 10000"));
        }
        let prefix = self.route_prefix.as_str();
        if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
            return Err(invalid(
                "route_prefix",
                "must start with `/` and have no trailing `/`",
            ));
        }
        Ok(())
    }
}

fn check_zoom(field: &'static str, zoom: f64) -> Result<(), ConfigError> {
    if zoom.is_finite() && (0.0..=MAX_ZOOM).contains(&zoom) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within 0..={MAX_ZOOM}")))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_CENTER, EngineConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_yields_defaults() {
        let c = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(c, EngineConfig::default());
        assert_eq!(c.search_debounce_ms, 500);
        assert_eq!(c.default_center, DEFAULT_CENTER);
        assert_eq!(c.page_size, 20);
        assert_eq!(c.route_prefix, "/map");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let c = EngineConfig::from_json_str(
            r#"{"page_size": 5, "default_center": {"lat": 41.64, "lng": 41.63}}"#,
        )
        .unwrap();
        assert_eq!(c.page_size, 5);
        assert_eq!(c.default_center.lon, 41.63);
        assert_eq!(c.focus_zoom, 15.0);
    }

    #[test]
    fn rejects_bad_values() {
        let err = EngineConfig::from_json_str(r#"{"page_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "page_size", .. }));
        let err = EngineConfig::from_json_str(r#"{"focus_zoom": 40}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "focus_zoom", .. }));
        let err = EngineConfig::from_json_str(r#"{"route_prefix": "map/"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "route_prefix", .. }));
        assert!(matches!(
            EngineConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn root_prefix_is_allowed() {
        let c = EngineConfig {
            route_prefix: "/".into(),
            ..EngineConfig::default()
        };
        assert_eq!(c.validate(), Ok(()));
    }
}
