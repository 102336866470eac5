//! Start-up configuration.
//!
//! Read from the TOML file named by `WISDOM_CONFIG`, or defaults when it is
//! unset. `WISDOM_LOCATION` replaces the start location (a deep link).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::map::layout::PhiGeometry;
use crate::map::Point;

pub const CONFIG_ENV: &str = "WISDOM_CONFIG";
pub const LOCATION_ENV: &str = "WISDOM_LOCATION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid start location '{0}'")]
    Location(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WisdomConfig {
    /// Published CSV of the content index
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Published CSV of reference tooltips
    #[serde(default = "default_tooltip_url")]
    pub tooltip_url: String,

    /// Published CSV of phi glyph parts (fallback glyph when absent)
    #[serde(default)]
    pub shape_url: Option<String>,

    #[serde(default = "default_start_location")]
    pub start_location: String,

    /// Below this width notes open in the overlay
    #[serde(default = "default_narrow_viewport")]
    pub narrow_viewport_px: f32,

    #[serde(default = "default_reference_debounce")]
    pub reference_debounce_ms: u64,

    #[serde(default)]
    pub geometry: PhiGeometry,

    /// Title → [x, y], wins over every other placement
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, [f64; 2]>,
}

fn default_index_url() -> String {
    "https://docs.google.com/spreadsheets/d/e/2PACX-wisdom-index/pub?output=csv".to_string()
}

fn default_tooltip_url() -> String {
    "https://docs.google.com/spreadsheets/d/e/2PACX-wisdom-references/pub?output=csv".to_string()
}

fn default_start_location() -> String {
    "wisdom://browser/".to_string()
}

fn default_narrow_viewport() -> f32 {
    768.0
}

fn default_reference_debounce() -> u64 {
    150
}

fn default_overrides() -> BTreeMap<String, [f64; 2]> {
    let g = PhiGeometry::default();
    [
        ("Wisdom", g.branch_point),
        ("Reality", g.reality.tip),
        ("Reason", g.reason.tip),
        ("Right", g.right.tip),
    ]
    .into_iter()
    .map(|(title, p)| (title.to_string(), [p.x, p.y]))
    .collect()
}

impl Default for WisdomConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            tooltip_url: default_tooltip_url(),
            shape_url: None,
            start_location: default_start_location(),
            narrow_viewport_px: default_narrow_viewport(),
            reference_debounce_ms: default_reference_debounce(),
            geometry: PhiGeometry::default(),
            overrides: default_overrides(),
        }
    }
}

impl WisdomConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Config from `WISDOM_CONFIG` (or defaults), then `WISDOM_LOCATION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading config from {}", path);
                Self::load(path.trim())?
            }
            _ => Self::default(),
        };
        if let Ok(location) = std::env::var(LOCATION_ENV) {
            if !location.trim().is_empty() {
                config.start_location = location.trim().to_string();
            }
        }
        Ok(config)
    }

    /// Start location as a URL. A bare query (`?type=book&content=…`) is
    /// resolved against the default location.
    pub fn start_url(&self) -> Result<Url, ConfigError> {
        let invalid = || ConfigError::Location(self.start_location.clone());
        match Url::parse(&self.start_location) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&default_start_location())
                .and_then(|base| base.join(&self.start_location))
                .map_err(|_| invalid()),
            Err(_) => Err(invalid()),
        }
    }

    pub fn reference_debounce(&self) -> Duration {
        Duration::from_millis(self.reference_debounce_ms)
    }

    pub fn override_points(&self) -> IndexMap<String, Point> {
        self.overrides
            .iter()
            .map(|(title, [x, y])| (title.clone(), Point::new(*x, *y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = WisdomConfig::from_toml("").unwrap();
        assert_eq!(config.narrow_viewport_px, 768.0);
        assert_eq!(config.geometry, PhiGeometry::default());
        assert_eq!(config.override_points().get("Reality"), Some(&Point::new(200.0, -280.0)));
    }

    #[test]
    fn partial_geometry_keeps_other_defaults() {
        let config = WisdomConfig::from_toml(
            r#"
            index_url = "https://example.test/index.csv"
            shape_url = "https://example.test/shape.csv"
            reference_debounce_ms = 40

            [geometry]
            root_spacing = 90
            branch_point = { x = 0, y = -120 }

            [overrides]
            Logos = [10.0, -20.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.geometry.root_spacing, 90.0);
        assert_eq!(config.geometry.branch_point, Point::new(0.0, -120.0));
        assert_eq!(config.geometry.loop_radius, PhiGeometry::default().loop_radius);
        assert_eq!(config.reference_debounce(), Duration::from_millis(40));
        assert_eq!(config.overrides.len(), 1);
        assert_eq!(config.shape_url.as_deref(), Some("https://example.test/shape.csv"));
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(matches!(
            WisdomConfig::from_toml("narrow_viewport_px = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            WisdomConfig::load("/nonexistent/wisdom.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn start_location_accepts_bare_query() {
        let config = WisdomConfig {
            start_location: "?type=book&content=Republic".into(),
            ..WisdomConfig::default()
        };
        let url = config.start_url().unwrap();
        assert_eq!(url.query(), Some("type=book&content=Republic"));
    }
}
