//! Theme preference: one provider-owned value, persisted on every write.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the theme is stored in the preferences file.
pub const THEME_KEY: &str = "weatherapp-theme";

/// Dashboard color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Parse a stored value. Anything other than "dark"/"light" is ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key/value preferences file (JSON object of strings).
///
/// Only the theme key is owned by this crate; other keys are preserved.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let json = fs::read_to_string(&self.path).context("Failed to read preferences file")?;
        serde_json::from_str(&json).context("Failed to parse preferences file")
    }

    /// Read the stored theme, if any.
    ///
    /// A missing, unreadable, or unrecognized value yields `None`.
    pub fn load(&self) -> Option<Theme> {
        match self.read_all() {
            Ok(prefs) => prefs.get(THEME_KEY).and_then(|v| Theme::parse(v)),
            Err(e) => {
                tracing::warn!("Ignoring stored theme: {:#}", e);
                None
            }
        }
    }

    pub fn save(&self, theme: Theme) -> Result<()> {
        let mut prefs = self.read_all().unwrap_or_default();
        prefs.insert(THEME_KEY.to_string(), theme.as_str().to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create preferences directory")?;
        }

        let json = serde_json::to_string_pretty(&prefs).context("Failed to serialize preferences")?;
        fs::write(&self.path, json).context("Failed to write preferences file")?;

        tracing::debug!("Stored theme {} at {:?}", theme, self.path);
        Ok(())
    }
}

/// Owner of the current theme. Share it as `Arc<ThemeProvider>` with whatever
/// needs to read or change the theme.
#[derive(Debug)]
pub struct ThemeProvider {
    store: ThemeStore,
    current: RwLock<Theme>,
}

impl ThemeProvider {
    /// Resolve the startup theme: stored value, then the OS preference, then dark.
    pub fn load(store: ThemeStore, system_preference: Option<Theme>) -> Self {
        let theme = store.load().or(system_preference).unwrap_or_default();
        tracing::info!("Theme resolved to {}", theme);

        Self {
            store,
            current: RwLock::new(theme),
        }
    }

    pub fn theme(&self) -> Theme {
        *self.current.read()
    }

    /// Set the theme and persist it.
    ///
    /// The in-memory value changes even if persisting fails.
    pub fn set(&self, theme: Theme) -> Result<()> {
        *self.current.write() = theme;
        self.store.save(theme)
    }

    /// Flip between dark and light, returning the new theme.
    pub fn toggle(&self) -> Result<Theme> {
        let next = {
            let mut current = self.current.write();
            *current = current.toggle();
            *current
        };
        self.store.save(next)?;
        Ok(next)
    }
}
