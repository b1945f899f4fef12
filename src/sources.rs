//! Built-in source definitions embedded in the binary
//!
//! Lets users pass `--source openalex-works` instead of a YAML path.

use crate::error::{Error, Result, ResultExt};
use crate::source::SourceConfig;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Built-in source YAML definitions
pub static BUILTIN_SOURCES: LazyLock<BTreeMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        let mut m = BTreeMap::new();

        // Scholarly works
        m.insert(
            "openalex-works",
            include_str!("../sources/openalex-works.yaml"),
        );
        m.insert("openalex", include_str!("../sources/openalex-works.yaml"));

        // Research DSL
        m.insert(
            "dsl-publications",
            include_str!("../sources/dsl-publications.yaml"),
        );

        m
    });

/// Get a built-in source definition by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_SOURCES.get(name).copied()
}

/// Check if a name is a built-in source
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_SOURCES.contains_key(name)
}

/// List built-in source names (primary names only)
pub fn list_builtin() -> Vec<&'static str> {
    vec!["openalex-works", "dsl-publications"]
}

/// Load a source by built-in name or YAML path
pub fn load_source(name_or_path: &str) -> Result<SourceConfig> {
    if let Some(yaml) = get_builtin(name_or_path) {
        return SourceConfig::from_yaml(yaml);
    }

    let path = Path::new(name_or_path);
    if path.exists() {
        return SourceConfig::from_file(path)
            .with_context(|| format!("Invalid source definition {}", path.display()));
    }

    Err(Error::UnknownSource {
        name: name_or_path.to_string(),
    })
}
