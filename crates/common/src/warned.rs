//! Best-effort results that carry non-fatal warnings alongside a value.

use serde::Serialize;

/// A value produced by a best-effort operation plus the warnings collected
/// while producing it (unreachable sources, malformed entries, missing agents).
#[derive(Debug, Clone, Serialize)]
pub struct Warned<T> {
    pub value: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> Warned<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Warned<U> {
        Warned {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn into_parts(self) -> (T, Vec<String>) {
        (self.value, self.warnings)
    }
}

impl<T: Default> Default for Warned<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
