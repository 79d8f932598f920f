use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modules callables may come from unless configured otherwise.
pub const DEFAULT_ALLOWED_MODULES: &[&str] = &["builtins",
                                               "FreeCAD",
                                               "FreeCADGui",
                                               "App",
                                               "Gui",
                                               "Base",
                                               "__FreeCADConsole__",
                                               "Units",
                                               "Selection",
                                               "Part",
                                               "PartDesign",
                                               "Sketcher",
                                               "Spreadsheet",
                                               "collections",
                                               "math",
                                               "re",
                                               "_sre",
                                               "freecad.fc_cadquery"];

/// Default number of loop iterations between cancellation polls.
pub const DEFAULT_LOOP_CHECK: usize = 100;
/// Default call-frame limit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Failures while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read configuration '{path}': {source}")]
    Io {
        /// The file path.
        path:   String,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The TOML was malformed or had wrong field types.
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Engine settings.
///
/// Every field has a default, so an empty document is a valid
/// configuration.
///
/// # Example
/// ```
/// use cadexpr::config::EngineConfig;
///
/// let config = EngineConfig::from_toml(r#"
///     loop_check = 10
///     [modules]
///     os = false
/// "#).unwrap();
/// assert_eq!(config.loop_check, 10);
/// assert_eq!(config.max_depth, 64);
/// assert_eq!(config.modules.get("os"), Some(&false));
/// assert_eq!(config.modules.get("math"), Some(&true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Loop iterations between cancellation polls; `0` disables polling.
    pub loop_check: usize,
    /// Maximum call-frame depth.
    pub max_depth:  usize,
    /// Emit the dependency-tracking warnings.
    pub warnings:   bool,
    /// Module allow (`true`) and deny (`false`) entries, merged over the
    /// default allow list.
    pub modules:    IndexMap<String, bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { loop_check: DEFAULT_LOOP_CHECK,
               max_depth:  DEFAULT_MAX_DEPTH,
               warnings:   true,
               modules:    default_modules(), }
    }
}

fn default_modules() -> IndexMap<String, bool> {
    DEFAULT_ALLOWED_MODULES.iter()
                           .map(|m| ((*m).to_string(), true))
                           .collect()
}

impl EngineConfig {
    /// Parses a TOML document; listed modules are merged over the defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        let mut modules = default_modules();
        modules.extend(config.modules);
        config.modules = modules;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(),
                                                                               source })?;
        Self::from_toml(&text)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
