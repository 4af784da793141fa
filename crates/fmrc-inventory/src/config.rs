//! Configuration for collection construction.

use serde::{Deserialize, Serialize};

/// What to do with a variable present in the data but absent from a loaded
/// definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownVariablePolicy {
    /// Drop the variable; the definition is authoritative on membership.
    #[default]
    Skip,
    /// Keep the variable with raw counts only, no expected values.
    Track,
}

impl UnknownVariablePolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "track" => Self::Track,
            _ => Self::Skip,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Track => "track",
        }
    }
}

impl std::fmt::Display for UnknownVariablePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for [`crate::CollectionBuilder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Policy for variables the definition does not list.
    #[serde(default)]
    pub unknown_variables: UnknownVariablePolicy,

    /// Create zero-inventory entries for definition variables no run produced.
    #[serde(default = "default_true")]
    pub include_definition_only_variables: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            unknown_variables: UnknownVariablePolicy::Skip,
            include_definition_only_variables: true,
        }
    }
}

impl InventoryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FMRC_UNKNOWN_VARIABLES") {
            config.unknown_variables = UnknownVariablePolicy::from_str(&val);
        }

        if let Ok(val) = std::env::var("FMRC_INCLUDE_DEFINITION_ONLY") {
            config.include_definition_only_variables = val.to_lowercase() == "true" || val == "1";
        }

        config
    }
}
