use crate::energy::EnergyFunction;
use crate::error::{NutsError, Result};
use crate::leapfrog::LeapfrogIntegrator;
use crate::momentum::{neg_hamiltonian, Momentum, StandardNormalMomentum};
use log::trace;
use ndarray::Array1;
use rand::Rng;
use std::f64::consts::LN_2;

pub const DEFAULT_INITIAL_STEP_SIZE: f64 = 1. / 1024.;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TARGET_ACCEPT: f64 = 0.64;

const KAPPA: f64 = 0.75;
const GAMMA: f64 = 0.05;
const T0: f64 = 10.;

/// Search for a step size at which a single leapfrog step from the initial
/// state is accepted with probability close to one half.
///
/// The step size is doubled while the acceptance ratio of the trial step
/// stays above 1/2 and halved while it stays below. The number of
/// doublings or halvings is capped at `max_iterations`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSizeHeuristic {
    pub initial_step_size: f64,
    pub max_iterations: usize,
}

impl Default for StepSizeHeuristic {
    fn default() -> Self {
        Self {
            initial_step_size: DEFAULT_INITIAL_STEP_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl StepSizeHeuristic {
    pub fn new(initial_step_size: f64, max_iterations: usize) -> Self {
        Self {
            initial_step_size,
            max_iterations,
        }
    }

    pub fn select<E, R>(&self, energy: &E, initial_position: &Array1<f64>, rng: &mut R) -> Result<f64>
    where
        E: EnergyFunction + ?Sized,
        R: Rng + ?Sized,
    {
        if !(self.initial_step_size.is_finite() && self.initial_step_size > 0.) {
            return Err(NutsError::InvalidParameter(format!(
                "initial step size must be positive and finite, got {}",
                self.initial_step_size
            )));
        }
        let kinetic = StandardNormalMomentum::new(energy.dim());
        let integrator = LeapfrogIntegrator::new(energy);
        let initial_momentum = kinetic.sample(rng);
        integrator.check_state(initial_position, &initial_momentum)?;
        let initial_log_p = neg_hamiltonian(energy, &kinetic, initial_position, &initial_momentum);

        // log of the joint density ratio after one step, NaN counts as rejection
        let log_ratio = |step_size: f64| {
            let mut position = initial_position.clone();
            let mut momentum = initial_momentum.clone();
            integrator.step(&mut position, &mut momentum, step_size);
            let delta = neg_hamiltonian(energy, &kinetic, &position, &momentum) - initial_log_p;
            if delta.is_nan() {
                f64::NEG_INFINITY
            } else {
                delta
            }
        };

        let mut step_size = self.initial_step_size;
        let mut delta = log_ratio(step_size);
        let a: f64 = if delta > 0.5_f64.ln() { 1. } else { -1. };
        let mut n_trials = 0;
        while a * delta > -a * LN_2 {
            if n_trials == self.max_iterations {
                return Err(NutsError::StepSizeSearchExhausted {
                    iterations: n_trials,
                    step_size,
                });
            }
            step_size *= 2_f64.powf(a);
            delta = log_ratio(step_size);
            n_trials += 1;
            trace!("step size trial {n_trials}: step size {step_size:e}, log ratio {delta:.4}");
        }
        Ok(step_size)
    }
}

/// Dual averaging of the log step size towards a target mean acceptance
/// probability, run during burn-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualAverage {
    target_accept: f64,
    shrinkage_target: f64,
    av_h: f64,
    log_step_size: f64,
    log_av_step_size: f64,
    count: usize,
}

impl DualAverage {
    pub fn new(initial_step_size: f64, target_accept: f64) -> Self {
        Self {
            target_accept,
            shrinkage_target: (10. * initial_step_size).ln(),
            av_h: 0.,
            log_step_size: initial_step_size.ln(),
            log_av_step_size: 0.,
            count: 0,
        }
    }

    /// Feeds the mean acceptance probability of one iteration.
    pub fn update(&mut self, accept_prob: f64) {
        let accept_prob = if accept_prob.is_finite() { accept_prob } else { 0. };
        self.count += 1;
        let m = self.count as f64;
        let eta = 1. / (m + T0);
        self.av_h = (1. - eta) * self.av_h + eta * (self.target_accept - accept_prob);
        self.log_step_size = self.shrinkage_target - (m.sqrt() / GAMMA) * self.av_h;
        let m_pow_neg_kappa = m.powf(-KAPPA);
        self.log_av_step_size =
            m_pow_neg_kappa * self.log_step_size + (1. - m_pow_neg_kappa) * self.log_av_step_size;
    }

    /// Step size for the next burn-in iteration.
    pub fn current_step_size(&self) -> f64 {
        self.log_step_size.exp()
    }

    /// Step size to keep fixed once burn-in is over.
    pub fn final_step_size(&self) -> f64 {
        if self.count == 0 {
            return self.current_step_size();
        }
        self.log_av_step_size.exp()
    }
}
