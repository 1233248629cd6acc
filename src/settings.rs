use crate::error::{NutsError, Result};
use crate::step_size::{
    StepSizeHeuristic, DEFAULT_INITIAL_STEP_SIZE, DEFAULT_MAX_ITERATIONS, DEFAULT_TARGET_ACCEPT,
};

/// Configuration of a NUTS run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Number of iterations after burn-in.
    pub iterations: usize,
    /// Number of initial iterations that are discarded.
    pub burn_in: usize,
    /// Keep every `thinning`-th post burn-in sample.
    pub thinning: usize,
    /// Starting point of the step size search.
    pub initial_step_size: f64,
    /// Maximum number of doublings or halvings in the step size search.
    pub max_step_size_iterations: usize,
    /// Stop doubling the trajectory at this depth. `None` lets it grow until
    /// it makes a U-turn.
    pub max_tree_depth: Option<usize>,
    /// Refine the step size by dual averaging during burn-in. Without it the
    /// heuristic's step size is used for the whole run.
    pub adapt_step_size: bool,
    /// Mean acceptance probability the adaptation aims for.
    pub target_accept: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iterations: 1000,
            burn_in: 100,
            thinning: 1,
            initial_step_size: DEFAULT_INITIAL_STEP_SIZE,
            max_step_size_iterations: DEFAULT_MAX_ITERATIONS,
            max_tree_depth: Some(10),
            adapt_step_size: true,
            target_accept: DEFAULT_TARGET_ACCEPT,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.thinning == 0 {
            return Err(NutsError::InvalidParameter(
                "thinning must be at least 1".to_string(),
            ));
        }
        if !(self.initial_step_size.is_finite() && self.initial_step_size > 0.) {
            return Err(NutsError::InvalidParameter(format!(
                "initial step size must be positive and finite, got {}",
                self.initial_step_size
            )));
        }
        if !(self.target_accept > 0. && self.target_accept < 1.) {
            return Err(NutsError::InvalidParameter(format!(
                "target acceptance probability must lie in (0, 1), got {}",
                self.target_accept
            )));
        }
        Ok(())
    }

    pub fn step_size_heuristic(&self) -> StepSizeHeuristic {
        StepSizeHeuristic::new(self.initial_step_size, self.max_step_size_iterations)
    }

    /// Number of samples a run with these settings returns.
    pub fn num_kept(&self) -> usize {
        self.iterations.div_ceil(self.thinning.max(1))
    }
}
