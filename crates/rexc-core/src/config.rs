//! Compiler configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest DECIMAL precision the execution engine stores.
pub const DEFAULT_MAX_DECIMAL_PRECISION: u32 = 38;
/// Largest DECIMAL scale the execution engine stores.
pub const DEFAULT_MAX_DECIMAL_SCALE: u32 = 12;
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum nesting of expression nodes (local ref hops included) the
    /// converter descends before giving up with an invariant error.
    pub max_expression_depth: usize,

    /// DECIMAL types with a larger declared precision fail type resolution.
    pub max_decimal_precision: u32,

    /// DECIMAL types with a larger declared scale fail type resolution.
    pub max_decimal_scale: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
            max_decimal_precision: DEFAULT_MAX_DECIMAL_PRECISION,
            max_decimal_scale: DEFAULT_MAX_DECIMAL_SCALE,
        }
    }
}

impl PlannerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `REXC_MAX_EXPRESSION_DEPTH`: converter recursion limit
    /// - `REXC_MAX_DECIMAL_PRECISION`: largest accepted DECIMAL precision
    /// - `REXC_MAX_DECIMAL_SCALE`: largest accepted DECIMAL scale
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("REXC_MAX_EXPRESSION_DEPTH") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_expression_depth = v;
            }
        }

        if let Ok(s) = std::env::var("REXC_MAX_DECIMAL_PRECISION") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.max_decimal_precision = v;
            }
        }

        if let Ok(s) = std::env::var("REXC_MAX_DECIMAL_SCALE") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.max_decimal_scale = v;
            }
        }

        cfg
    }

    pub fn with_max_expression_depth(mut self, depth: usize) -> Self {
        self.max_expression_depth = depth;
        self
    }

    /// Reject settings no statement could compile under.
    pub fn validate(&self) -> Result<()> {
        if self.max_expression_depth == 0 {
            return Err(Error::Config(
                "max_expression_depth must be at least 1".into(),
            ));
        }
        if self.max_decimal_precision == 0 {
            return Err(Error::Config(
                "max_decimal_precision must be at least 1".into(),
            ));
        }
        if self.max_decimal_scale > self.max_decimal_precision {
            return Err(Error::Config(format!(
                "max_decimal_scale ({}) exceeds max_decimal_precision ({})",
                self.max_decimal_scale, self.max_decimal_precision
            )));
        }
        Ok(())
    }
}
