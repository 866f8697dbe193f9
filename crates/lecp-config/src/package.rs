//! `package.json` metadata the build depends on.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// How Node interprets `.js` files in this package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Module,
    #[default]
    Commonjs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default, rename = "type")]
    pub package_type: PackageType,

    #[serde(default)]
    pub dependencies: IndexMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: IndexMap<String, String>,
}

impl PackageJson {
    /// Read `package.json` from `cwd`.
    pub fn read(cwd: &Path) -> Result<Self> {
        let path = cwd.join("package.json");
        if !path.exists() {
            return Err(ConfigError::PackageJson(cwd.to_path_buf()));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            message: e.to_string(),
        })
    }

    pub fn is_module(&self) -> bool {
        self.package_type == PackageType::Module
    }

    /// Name usable as a file-system or CSS identifier prefix: `@scope/pkg` → `scope__pkg`.
    pub fn flat_name(&self) -> String {
        self.name.replacen('@', "", 1).replacen('/', "__", 1)
    }

    /// UMD global name: `react-dom` → `ReactDom`, `@scope/my-pkg` → `ScopeMyPkg`.
    pub fn global_name(&self) -> String {
        camelize(&self.name)
    }
}

pub fn camelize(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_type_and_name() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "@demo/pkg", "type": "module", "peerDependencies": { "react": "^18" } }"#,
        )
        .unwrap();

        let pkg = PackageJson::read(dir.path()).unwrap();
        assert!(pkg.is_module());
        assert_eq!(pkg.flat_name(), "demo__pkg");
        assert_eq!(pkg.peer_dependencies["react"], "^18");
    }

    #[test]
    fn defaults_to_commonjs() {
        let pkg: PackageJson = serde_json::from_str(r#"{ "name": "x" }"#).unwrap();
        assert_eq!(pkg.package_type, PackageType::Commonjs);
    }

    #[test]
    fn missing_package_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            PackageJson::read(dir.path()),
            Err(ConfigError::PackageJson(_))
        ));
    }

    #[test]
    fn camelizes_names() {
        assert_eq!(camelize("react-dom"), "ReactDom");
        assert_eq!(camelize("@scope/my-pkg"), "ScopeMyPkg");
    }
}
