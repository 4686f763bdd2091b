//! Configuration for the const-class branch transformation.

use crate::{Error, Result};

/// Configuration for [`ConstClassBranchesPass`](super::ConstClassBranchesPass).
///
/// Without a `lookup_method` that resolves against the program the pass does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstClassBranchesConfig {
    /// Count keys naming classes outside the program towards the case bounds (default: false).
    pub consider_external_classes: bool,

    /// Minimum number of relevant cases for a chain to be rewritten (default: 5).
    pub min_cases: usize,

    /// Maximum number of relevant cases for a chain to be rewritten (default: 2000).
    pub max_cases: usize,

    /// Runtime lookup routine, `Lcls;.name:(Ljava/lang/Object;Ljava/lang/String;I)I`.
    pub lookup_method: Option<String>,

    /// Maximum number of chains rewritten per container (default: 10).
    ///
    /// Every rewrite adds one method reference to its container, so this also sizes the
    /// reference reservation made before the pass runs.
    pub transforms_per_container: usize,
}

impl Default for ConstClassBranchesConfig {
    fn default() -> Self {
        Self {
            consider_external_classes: false,
            min_cases: 5,
            max_cases: 2000,
            lookup_method: None,
            transforms_per_container: 10,
        }
    }
}

impl ConstClassBranchesConfig {
    /// Sets whether external classes count as relevant cases.
    #[must_use]
    pub fn with_consider_external_classes(mut self, enabled: bool) -> Self {
        self.consider_external_classes = enabled;
        self
    }

    /// Sets the inclusive case count bounds.
    #[must_use]
    pub fn with_case_bounds(mut self, min_cases: usize, max_cases: usize) -> Self {
        self.min_cases = min_cases;
        self.max_cases = max_cases;
        self
    }

    /// Sets the runtime lookup routine.
    #[must_use]
    pub fn with_lookup_method(mut self, method: impl Into<String>) -> Self {
        self.lookup_method = Some(method.into());
        self
    }

    /// Sets the per-container rewrite cap.
    #[must_use]
    pub fn with_transforms_per_container(mut self, cap: usize) -> Self {
        self.transforms_per_container = cap;
        self
    }

    /// Returns the configured lookup routine, treating an empty string as absent.
    #[must_use]
    pub fn lookup_method(&self) -> Option<&str> {
        self.lookup_method
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
    }

    /// Checks the case bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `min_cases` is zero, exceeds `max_cases`, or `max_cases`
    /// does not fit the 16-bit ordinal range of the lookup tables.
    pub fn validate(&self) -> Result<()> {
        if self.min_cases == 0 {
            return Err(Error::Config("min_cases must be at least 1".to_string()));
        }
        if self.min_cases > self.max_cases {
            return Err(Error::Config(format!(
                "min_cases ({}) exceeds max_cases ({})",
                self.min_cases, self.max_cases
            )));
        }
        if self.max_cases > i16::MAX as usize {
            return Err(Error::Config(format!(
                "max_cases ({}) exceeds the ordinal range ({})",
                self.max_cases,
                i16::MAX
            )));
        }
        Ok(())
    }
}
