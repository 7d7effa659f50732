//! Registry of form themes known to the gateway.
//!
//! The built-in `sequoia` theme is always present; `THEMES_FILE` may add
//! themes or override it with a JSON array of theme objects.

use std::collections::HashMap;

use donation_flow::ThemeConfig;
use tracing::{info, warn};

use crate::errors::Result;

pub const DEFAULT_THEME_ID: &str = "sequoia";

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    themes: HashMap<String, ThemeConfig>,
}

/// Outcome of looking up a form's theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeResolution<'a> {
    Theme(&'a ThemeConfig),
    /// The form has no theme at all.
    Legacy,
    /// The form names a theme nobody registered.
    Unresolved,
}

impl<'a> ThemeResolution<'a> {
    pub fn theme(self) -> Option<&'a ThemeConfig> {
        match self {
            Self::Theme(theme) => Some(theme),
            Self::Legacy | Self::Unresolved => None,
        }
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThemeRegistry {
    pub fn builtin() -> Self {
        let mut themes = HashMap::new();
        themes.insert(
            DEFAULT_THEME_ID.to_string(),
            ThemeConfig::new(DEFAULT_THEME_ID, "Sequoia"),
        );
        Self { themes }
    }

    /// Built-in themes, extended from `path` when one is configured.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut registry = Self::builtin();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)?;
            let count = registry.merge_json(&raw)?;
            info!("Loaded {count} theme(s) from {path}");
        }
        Ok(registry)
    }

    /// Merge a JSON array of themes; later entries replace earlier ones with
    /// the same id.
    pub fn merge_json(&mut self, raw: &str) -> Result<usize> {
        let themes: Vec<ThemeConfig> = serde_json::from_str(raw)?;
        let count = themes.len();
        for theme in themes {
            self.insert(theme);
        }
        Ok(count)
    }

    pub fn insert(&mut self, theme: ThemeConfig) {
        self.themes.insert(theme.id.clone(), theme);
    }

    pub fn get(&self, id: &str) -> Option<&ThemeConfig> {
        self.themes.get(id)
    }

    pub fn resolve(&self, theme_id: Option<&str>) -> ThemeResolution<'_> {
        let Some(id) = theme_id else {
            return ThemeResolution::Legacy;
        };
        match self.get(id) {
            Some(theme) => ThemeResolution::Theme(theme),
            None => {
                warn!("Form references unknown theme {id:?}; falling back to window redirects");
                ThemeResolution::Unresolved
            }
        }
    }
}
