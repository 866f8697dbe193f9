//! File-based config discovery and `extends` resolution.
//!
//! Handles finding the lecp config for a project and flattening its `extends`
//! chain into a single [`UserConfig`].

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Toml};
use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::defaults::{CONFIG_FILES, PACKAGE_JSON_FIELD};
use crate::error::{ConfigError, Result};
use crate::user::UserConfig;

/// A config loaded from disk together with every file that contributed to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: UserConfig,
    /// Root config first, then each `extends` ancestor in order.
    pub files: IndexSet<PathBuf>,
}

/// File-based configuration discovery
///
/// Searches the project root for a config in conventional locations and loads
/// it, following `extends` links.
///
/// # Example
///
/// ```no_run
/// use lecp_config::ConfigDiscovery;
///
/// let loaded = ConfigDiscovery::new(".").load().unwrap();
/// println!("{} config file(s)", loaded.files.len());
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. `lecp.config.toml`
    /// 2. `lecp.config.json`
    /// 3. `package.json` (`lecp` field)
    pub fn find(&self) -> Option<PathBuf> {
        for name in CONFIG_FILES {
            let path = self.root.join(name);
            if path.is_file() {
                return Some(path);
            }
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.is_file() && read_package_field(&pkg_path).is_ok_and(|v| v.is_some()) {
            return Some(pkg_path);
        }

        None
    }

    /// Load the discovered config and its `extends` chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if no config file is found.
    pub fn load(&self) -> Result<LoadedConfig> {
        let path = self
            .find()
            .ok_or_else(|| ConfigError::NotFound(self.root.clone()))?;
        load_config(&path)
    }
}

/// Load `path` and every config it extends.
///
/// A file that already appears in the chain is a cycle: it is reported and
/// the chain loaded so far is kept. A missing target is an error.
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let mut files = IndexSet::new();
    let merged = load_chain(&path_clean::clean(path), &mut files)?;
    let config: UserConfig =
        serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            message: e.to_string(),
        })?;
    debug!(files = files.len(), "loaded config chain");
    Ok(LoadedConfig { config, files })
}

fn load_chain(path: &Path, files: &mut IndexSet<PathBuf>) -> Result<Map<String, Value>> {
    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }
    files.insert(path.to_path_buf());

    let mut own = read_config_file(path)?;
    let Some(extends) = own.remove("extends") else {
        return Ok(own);
    };
    let Some(extends) = extends.as_str() else {
        return Err(ConfigError::InvalidValue {
            field: "extends".to_string(),
            message: format!("expected a path string in {}", path.display()),
        });
    };

    let dir = path.parent().unwrap_or(Path::new("."));
    let parent_path = path_clean::clean(dir.join(extends));

    if files.contains(&parent_path) {
        warn!(
            "config {} has a circular extends on {}",
            path.display(),
            parent_path.display()
        );
        return Ok(own);
    }

    let mut merged = load_chain(&parent_path, files)?;
    for (key, value) in own {
        merged.insert(key, value);
    }
    Ok(merged)
}

fn read_config_file(path: &Path) -> Result<Map<String, Value>> {
    let is_package_json = path.file_name().is_some_and(|name| name == "package.json");
    let value = if is_package_json {
        read_package_field(path)?.ok_or_else(|| ConfigError::InvalidValue {
            field: PACKAGE_JSON_FIELD.to_string(),
            message: format!("{} has no \"{}\" field", path.display(), PACKAGE_JSON_FIELD),
        })?
    } else {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Figment::from(Toml::file(path)).extract::<Value>()?,
            Some("json") => Figment::from(Json::file(path)).extract::<Value>()?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::InvalidValue {
            field: "config".to_string(),
            message: format!("{} must contain an object", path.display()),
        }),
    }
}

fn read_package_field(path: &Path) -> Result<Option<Value>> {
    let figment = Figment::from(Json::file(path));
    if !figment.contains(PACKAGE_JSON_FIELD) {
        return Ok(None);
    }
    let value: Value = figment.extract_inner(PACKAGE_JSON_FIELD)?;
    Ok((!value.is_null()).then_some(value))
}
