//! Error code catalog and lookup.
//!
//! Maps DPML error codes (like `UNCLOSED_TAG`) to their metadata.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name (e.g. "parse", "schema", "reference")
    pub subsystem: String,

    /// Short title for the error
    pub title: String,

    /// Default message used when a diagnostic has no problem statement
    pub message_template: String,

    /// When this error was introduced (version)
    pub since_version: String,
}

/// Global error catalog, embedded at compile time from `error_catalog.json`.
///
/// # Panics
///
/// Panics on first access if the embedded JSON is invalid.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("embedded error catalog must be valid JSON")
});

/// Look up error code information.
///
/// ```
/// use dpml_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info("UNCLOSED_TAG").unwrap();
/// assert_eq!(info.title, "Unclosed Tag");
/// ```
pub fn get_error_info(code: &str) -> Option<&'static ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get the subsystem name for an error code.
pub fn get_subsystem(code: &str) -> Option<&'static str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        assert!(!ERROR_CATALOG.is_empty());
    }

    #[test]
    fn test_taxonomy_is_complete() {
        for code in [
            "SYNTAX",
            "INVALID_XML",
            "UNCLOSED_TAG",
            "INVALID_ATTRIBUTE",
            "MISSING_REQUIRED_ATTRIBUTE",
            "INVALID_NESTING",
            "REFERENCE_NOT_FOUND",
            "INVALID_REFERENCE",
            "CIRCULAR_REFERENCE",
            "DUPLICATE_ID",
            "TRANSFORM_ERROR",
            "CONFIG_ERROR",
            "UNKNOWN_ERROR",
        ] {
            assert!(get_error_info(code).is_some(), "missing catalog entry {code}");
        }
    }

    #[test]
    fn test_get_subsystem() {
        assert_eq!(get_subsystem("UNCLOSED_TAG"), Some("parse"));
        assert_eq!(get_subsystem("DUPLICATE_ID"), Some("schema"));
        assert_eq!(get_subsystem("NOT_A_CODE"), None);
    }
}
