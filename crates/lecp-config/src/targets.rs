//! Compatibility targets: ES-version shorthand expansion.
//!
//! Users may write `targets = { es2020 = true }` instead of listing engines.
//! Each shorthand expands to the minimum engine versions that fully support
//! that edition. Engines the user listed explicitly are never overwritten.

use indexmap::IndexMap;
use tracing::warn;

use crate::user::TargetValue;

/// Resolved engine → minimum version table.
pub type Targets = IndexMap<String, String>;

/// Engines an ES shorthand expands to. Node is left out: a shorthand
/// describes a browser build, and a `node` key decides the output extension.
pub const ENGINES: &[&str] = &["chrome", "firefox", "safari", "ios"];

/// chrome, firefox, safari, ios
const ES_TABLE: &[(&str, [&str; 4])] = &[
    ("es2015", ["51", "54", "10", "10"]),
    ("es2016", ["52", "52", "10.1", "10.3"]),
    ("es2017", ["58", "53", "11", "11"]),
    ("es2018", ["64", "58", "11.1", "11.3"]),
    ("es2019", ["66", "58", "11.1", "11.3"]),
    ("es2020", ["80", "80", "14.1", "14.5"]),
    ("es2021", ["85", "80", "14.1", "14.5"]),
    ("es2022", ["94", "93", "16.4", "16.4"]),
    ("es2023", ["110", "115", "16.4", "16.4"]),
    ("es2024", ["117", "119", "17.4", "17.4"]),
    ("esnext", ["117", "119", "17.4", "17.4"]),
];

/// Whether a target key is an ES-edition shorthand rather than an engine name.
pub fn is_es_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower == "esnext"
        || (lower.starts_with("es")
            && lower.len() > 2
            && lower[2..].chars().all(|c| c.is_ascii_digit()))
}

/// Engine versions for a shorthand, `None` when the edition is unknown.
pub fn es_versions(key: &str) -> Option<&'static [&'static str; 4]> {
    let lower = key.to_ascii_lowercase();
    ES_TABLE
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, versions)| versions)
}

/// Expand ES shorthands into engine versions.
///
/// Explicit engine entries always win over expanded ones. When several
/// shorthands are listed the first one provides each engine. Unknown
/// shorthands are dropped with a warning.
pub fn expand_targets(raw: &IndexMap<String, TargetValue>) -> Targets {
    let mut targets = Targets::new();

    for (key, value) in raw {
        if is_es_key(key) {
            continue;
        }
        if let Some(version) = value.version() {
            targets.insert(key.clone(), version);
        }
    }

    for key in raw.keys().filter(|key| is_es_key(key)) {
        let Some(versions) = es_versions(key) else {
            warn!("unknown ES target `{}` ignored", key);
            continue;
        };
        for (engine, version) in ENGINES.iter().zip(versions.iter()) {
            targets
                .entry((*engine).to_string())
                .or_insert_with(|| (*version).to_string());
        }
    }

    targets
}

/// Split a dotted version into `(major, minor, patch)`.
pub fn major_minor_patch(version: &str) -> (u32, u32, u32) {
    let mut parts = version
        .split('.')
        .map(|part| part.trim().parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}
