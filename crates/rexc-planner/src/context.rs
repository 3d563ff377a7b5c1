//! Per-statement compilation state.
//!
//! One `CompileContext` per statement. It owns the dynamic-parameter counter,
//! so two statements compiled on different threads never share indices.

use rexc_core::config::PlannerConfig;
use rexc_core::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CompileContext {
    config: PlannerConfig,
    next_parameter: usize,
}

impl CompileContext {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            next_parameter: 0,
        }
    }

    /// Build a context after checking the config.
    pub fn try_new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Hand out the next parameter index.
    pub fn next_parameter_index(&mut self) -> usize {
        let idx = self.next_parameter;
        self.next_parameter += 1;
        idx
    }

    /// Number of parameters assigned so far.
    pub fn parameter_count(&self) -> usize {
        self.next_parameter
    }

    /// Start numbering parameters from zero again, for the next statement.
    pub fn reset(&mut self) {
        self.next_parameter = 0;
    }

    /// Fail once `depth` goes past the configured maximum.
    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_expression_depth {
            return Err(Error::Invariant(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.config.max_expression_depth
            )));
        }
        Ok(())
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_restart_after_reset() {
        let mut ctx = CompileContext::default();
        assert_eq!(ctx.next_parameter_index(), 0);
        assert_eq!(ctx.next_parameter_index(), 1);
        assert_eq!(ctx.parameter_count(), 2);
        ctx.reset();
        assert_eq!(ctx.next_parameter_index(), 0);
    }

    #[test]
    fn depth_limit_is_inclusive() {
        let ctx = CompileContext::new(PlannerConfig::default().with_max_expression_depth(3));
        assert!(ctx.check_depth(3).is_ok());
        assert!(matches!(ctx.check_depth(4), Err(Error::Invariant(_))));
    }

    #[test]
    fn try_new_rejects_bad_config() {
        let cfg = PlannerConfig::default().with_max_expression_depth(0);
        assert!(CompileContext::try_new(cfg).is_err());
    }
}
