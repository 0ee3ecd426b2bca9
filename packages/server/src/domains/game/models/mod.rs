pub mod player;
pub mod plot;

pub use player::*;
pub use plot::*;

use std::collections::HashMap;

/// Typed reads over a Hot State hash. Missing or unparseable fields fall back
/// to the type's default so a partially written record still maps.
pub(crate) struct HashFields<'a>(pub &'a HashMap<String, String>);

impl HashFields<'_> {
    pub fn int(&self, field: &str) -> i64 {
        self.0
            .get(field)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as i64)
            .unwrap_or_default()
    }

    pub fn int_or(&self, field: &str, default: i64) -> i64 {
        match self.0.get(field) {
            Some(v) => v.parse::<f64>().map(|v| v as i64).unwrap_or(default),
            None => default,
        }
    }

    pub fn flag(&self, field: &str) -> bool {
        matches!(self.0.get(field).map(String::as_str), Some("true") | Some("1"))
    }

    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).filter(|v| !v.is_empty()).cloned()
    }
}
