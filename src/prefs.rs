//! Reader preferences kept in a key-value store.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const FONT_KEY: &str = "font";
pub const THEME_KEY: &str = "theme";

/// Persistent string store (eframe storage in the app).
pub trait PreferenceStore {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&mut self, key: &str, value: String);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderFont {
    #[default]
    Sans,
    Serif,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl ReaderFont {
    pub const ALL: [ReaderFont; 3] = [ReaderFont::Sans, ReaderFont::Serif, ReaderFont::Mono];

    pub fn as_str(self) -> &'static str {
        match self {
            ReaderFont::Sans => "sans",
            ReaderFont::Serif => "serif",
            ReaderFont::Mono => "mono",
        }
    }
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for ReaderFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReaderFont {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "sans" => Ok(ReaderFont::Sans),
            "serif" => Ok(ReaderFont::Serif),
            "mono" => Ok(ReaderFont::Mono),
            _ => Err(()),
        }
    }
}

impl FromStr for Theme {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub font: ReaderFont,
    pub theme: Theme,
}

impl Preferences {
    /// Unknown or missing values fall back to defaults.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let font = store
            .get_string(FONT_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let theme = store
            .get_string(THEME_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self { font, theme }
    }

    pub fn save(&self, store: &mut dyn PreferenceStore) {
        store.set_string(FONT_KEY, self.font.as_str().to_string());
        store.set_string(THEME_KEY, self.theme.as_str().to_string());
    }
}
