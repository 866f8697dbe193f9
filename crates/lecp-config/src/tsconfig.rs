//! Reader for the project's `tsconfig.json`.
//!
//! Only the handful of compiler options the pipeline acts on are typed. The
//! full `compilerOptions` object is kept as raw JSON so the declaration
//! engine can forward it to the type checker untouched.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::user::{AliasValue, JsxRuntime};

pub const TSCONFIG_FILE: &str = "tsconfig.json";

/// Effective compiler options after following the `extends` chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsConfig {
    /// The `tsconfig.json` that was found.
    pub path: PathBuf,
    /// Merged `compilerOptions`, child keys over parent keys.
    pub compiler_options: Map<String, Value>,
    /// Directory that `paths` entries are relative to.
    pub paths_base: PathBuf,
}

impl TsConfig {
    /// Search `cwd` and its ancestors for `tsconfig.json`.
    pub fn find(cwd: &Path) -> Option<PathBuf> {
        cwd.ancestors()
            .map(|dir| dir.join(TSCONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Locate and load the project tsconfig. Absent tsconfig is not an error.
    pub fn discover(cwd: &Path) -> Result<Option<Self>> {
        match Self::find(cwd) {
            Some(path) => Self::load(&path).map(Some),
            None => {
                debug!("no tsconfig.json found above {}", cwd.display());
                Ok(None)
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut chain = Vec::new();
        let (compiler_options, paths_base) = load_chain(path, &mut chain)?;
        Ok(Self {
            path: path.to_path_buf(),
            compiler_options,
            paths_base,
        })
    }

    fn bool_option(&self, key: &str) -> bool {
        self.compiler_options
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn isolated_declarations(&self) -> bool {
        self.bool_option("isolatedDeclarations")
    }

    pub fn declaration_map(&self) -> bool {
        self.bool_option("declarationMap")
    }

    pub fn no_emit_on_error(&self) -> bool {
        self.bool_option("noEmitOnError")
    }

    /// JSX runtime implied by the `jsx` compiler option.
    pub fn jsx_runtime(&self) -> Option<JsxRuntime> {
        let jsx = self.compiler_options.get("jsx")?.as_str()?;
        match jsx.to_ascii_lowercase().as_str() {
            "react" => Some(JsxRuntime::Classic),
            "react-jsx" | "react-jsxdev" => Some(JsxRuntime::Automatic),
            "preserve" | "react-native" => Some(JsxRuntime::Preserve),
            _ => None,
        }
    }

    /// Alias table derived from `paths`, re-expressed relative to `cwd`.
    ///
    /// `"@/*": ["./src/*"]` becomes `"@": ["./src"]`.
    pub fn alias(&self, cwd: &Path) -> IndexMap<String, AliasValue> {
        let mut alias = IndexMap::new();
        let Some(Value::Object(paths)) = self.compiler_options.get("paths") else {
            return alias;
        };

        for (pattern, targets) in paths {
            let key = strip_wildcard(pattern);
            if key.is_empty() {
                continue;
            }
            let Some(targets) = targets.as_array() else {
                continue;
            };
            let resolved: Vec<String> = targets
                .iter()
                .filter_map(Value::as_str)
                .map(|target| {
                    let absolute = path_clean::clean(self.paths_base.join(strip_wildcard(target)));
                    relative_specifier(cwd, &absolute)
                })
                .collect();
            if !resolved.is_empty() {
                alias.insert(key.to_string(), AliasValue::Many(resolved));
            }
        }

        alias
    }
}

fn strip_wildcard(pattern: &str) -> &str {
    pattern
        .strip_suffix("/*")
        .or_else(|| pattern.strip_suffix('*'))
        .unwrap_or(pattern)
}

/// `./`-prefixed path of `target` relative to `base`, using `/` separators.
pub fn relative_specifier(base: &Path, target: &Path) -> String {
    let relative = pathdiff::diff_paths(target, base).unwrap_or_else(|| target.to_path_buf());
    let text = relative.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        ".".to_string()
    } else if text.starts_with("../") || text == ".." {
        text
    } else {
        format!("./{text}")
    }
}

fn read_json5(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|_| ConfigError::ConfigNotFound(path.into()))?;
    let value: Value = json5::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        }),
    }
}

/// Resolve an `extends` value the way the type checker does: relative paths
/// against the current file, bare specifiers through `node_modules`.
fn resolve_extends(from: &Path, specifier: &str) -> Option<PathBuf> {
    let dir = from.parent().unwrap_or(Path::new("."));
    let candidates: Vec<PathBuf> = if specifier.starts_with('.') || Path::new(specifier).is_absolute() {
        let base = path_clean::clean(dir.join(specifier));
        vec![base.clone(), base.with_extension("json")]
    } else {
        dir.ancestors()
            .flat_map(|ancestor| {
                let base = ancestor.join("node_modules").join(specifier);
                [
                    base.clone(),
                    base.with_extension("json"),
                    base.join(TSCONFIG_FILE),
                ]
            })
            .collect()
    };
    candidates.into_iter().find(|candidate| candidate.is_file())
}

fn load_chain(path: &Path, chain: &mut Vec<PathBuf>) -> Result<(Map<String, Value>, PathBuf)> {
    let clean = path_clean::clean(path);
    if chain.contains(&clean) {
        warn!("circular extends in {}", clean.display());
        return Ok((Map::new(), clean.parent().map(Path::to_path_buf).unwrap_or_default()));
    }
    chain.push(clean.clone());

    let raw = read_json5(&clean)?;
    let dir = clean.parent().map(Path::to_path_buf).unwrap_or_default();

    let (mut options, mut paths_base) = match raw.get("extends").and_then(Value::as_str) {
        Some(specifier) => match resolve_extends(&clean, specifier) {
            Some(parent) => load_chain(&parent, chain)?,
            None => {
                warn!("tsconfig extends target `{}` not found", specifier);
                (Map::new(), dir.clone())
            }
        },
        None => (Map::new(), dir.clone()),
    };

    if let Some(Value::Object(own)) = raw.get("compilerOptions") {
        if own.contains_key("paths") || own.contains_key("baseUrl") {
            paths_base = own
                .get("baseUrl")
                .and_then(Value::as_str)
                .map(|base| path_clean::clean(dir.join(base)))
                .unwrap_or_else(|| dir.clone());
        }
        for (key, value) in own {
            options.insert(key.clone(), value.clone());
        }
    }

    Ok((options, paths_base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reads_jsonc_with_comments() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tsconfig.json",
            r#"{
                // comment
                "compilerOptions": {
                    "jsx": "react-jsx",
                    "isolatedDeclarations": true,
                },
            }"#,
        );

        let config = TsConfig::discover(dir.path()).unwrap().unwrap();
        assert!(config.isolated_declarations());
        assert_eq!(config.jsx_runtime(), Some(JsxRuntime::Automatic));
    }

    #[test]
    fn paths_become_cwd_relative_aliases() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tsconfig.json",
            r#"{ "compilerOptions": { "paths": { "@/*": ["./src/*"], "utils": ["./src/utils/index.ts"] } } }"#,
        );

        let config = TsConfig::discover(dir.path()).unwrap().unwrap();
        let alias = config.alias(dir.path());
        assert_eq!(alias["@"], AliasValue::Many(vec!["./src".to_string()]));
        assert_eq!(
            alias["utils"],
            AliasValue::Many(vec!["./src/utils/index.ts".to_string()])
        );
    }

    #[test]
    fn extends_merges_child_over_parent() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "configs/base.json",
            r#"{ "compilerOptions": { "jsx": "react", "declarationMap": true, "baseUrl": "..", "paths": { "~/*": ["lib/*"] } } }"#,
        );
        write(
            dir.path(),
            "tsconfig.json",
            r#"{ "extends": "./configs/base.json", "compilerOptions": { "jsx": "react-jsx" } }"#,
        );

        let config = TsConfig::discover(dir.path()).unwrap().unwrap();
        assert_eq!(config.jsx_runtime(), Some(JsxRuntime::Automatic));
        assert!(config.declaration_map());
        let alias = config.alias(dir.path());
        assert_eq!(alias["~"], AliasValue::Many(vec!["./lib".to_string()]));
    }

    #[test]
    fn missing_tsconfig_is_none() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        // Ancestors of a temp dir normally carry no tsconfig.json.
        if TsConfig::find(&nested).is_none() {
            assert!(TsConfig::discover(&nested).unwrap().is_none());
        }
    }

    #[test]
    fn relative_specifier_prefixes_dot() {
        assert_eq!(
            relative_specifier(Path::new("/p"), Path::new("/p/src")),
            "./src"
        );
        assert_eq!(
            relative_specifier(Path::new("/p/app"), Path::new("/p/src")),
            "../src"
        );
        assert_eq!(relative_specifier(Path::new("/p"), Path::new("/p")), ".");
    }
}
