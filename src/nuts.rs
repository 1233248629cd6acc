use crate::energy::EnergyFunction;
use crate::error::{check_dim, NutsError, Result};
use crate::leapfrog::LeapfrogIntegrator;
use crate::momentum::{neg_hamiltonian, Momentum, StandardNormalMomentum};
use crate::settings::Settings;
use crate::step_size::DualAverage;
use crate::tree_builder::{no_u_turn, Direction, PhaseState, Slice, Subtree, Tree};
use log::{debug, info, warn};
use ndarray::Array1;
use rand::Rng;
use std::fmt;

/// Summary of the last run of a [`NUTS`] sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    /// Step size found by the heuristic before the first iteration.
    pub initial_step_size: f64,
    /// Step size used after burn-in.
    pub step_size: f64,
    pub iterations: usize,
    pub mean_tree_depth: f64,
    pub mean_accept_prob: f64,
    pub max_tree_depth_hits: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iterations, step size {:.4e} (initial {:.4e}), mean tree depth {:.2}, \
             mean acceptance {:.3}, {} max depth hits",
            self.iterations,
            self.step_size,
            self.initial_step_size,
            self.mean_tree_depth,
            self.mean_accept_prob,
            self.max_tree_depth_hits
        )
    }
}

/// Outcome of a single NUTS iteration.
#[derive(Debug, Clone, PartialEq)]
struct Draw {
    position: Array1<f64>,
    depth: usize,
    accept_prob: f64,
    hit_max_depth: bool,
}

/// The No-U-Turn sampler.
///
/// The step size is chosen once by the heuristic before the first iteration
/// and, unless disabled in the settings, refined by dual averaging during
/// burn-in. It stays fixed afterwards.
pub struct NUTS<E> {
    integrator: LeapfrogIntegrator<E>,
    kinetic: StandardNormalMomentum,
    settings: Settings,
    step_size: Option<f64>,
    stats: Option<RunStats>,
}

impl<E: EnergyFunction> NUTS<E> {
    pub fn new(energy: E, settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            kinetic: StandardNormalMomentum::new(energy.dim()),
            integrator: LeapfrogIntegrator::new(energy),
            settings,
            step_size: None,
            stats: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Step size used after burn-in by the most recent run.
    pub fn step_size(&self) -> Option<f64> {
        self.step_size
    }

    pub fn stats(&self) -> Option<&RunStats> {
        self.stats.as_ref()
    }

    /// Runs the chain with the iteration counts and thinning from the settings.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        initial_position: &Array1<f64>,
        rng: &mut R,
    ) -> Result<Vec<Array1<f64>>> {
        let Settings {
            iterations,
            burn_in,
            thinning,
            ..
        } = self.settings;
        self.run_thinned(initial_position, iterations, burn_in, thinning, rng)
    }

    /// Runs `burn_in + iterations` iterations and returns the last `iterations`
    /// positions of the chain.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        initial_position: &Array1<f64>,
        iterations: usize,
        burn_in: usize,
        rng: &mut R,
    ) -> Result<Vec<Array1<f64>>> {
        self.run_thinned(initial_position, iterations, burn_in, 1, rng)
    }

    fn run_thinned<R: Rng + ?Sized>(
        &mut self,
        initial_position: &Array1<f64>,
        iterations: usize,
        burn_in: usize,
        thinning: usize,
        rng: &mut R,
    ) -> Result<Vec<Array1<f64>>> {
        if thinning == 0 {
            return Err(NutsError::InvalidParameter(
                "thinning must be at least 1".to_string(),
            ));
        }
        let energy = self.integrator.energy();
        check_dim("initial position", energy.dim(), initial_position.len())?;
        check_dim("gradient", energy.dim(), energy.gradient(initial_position).len())?;
        let log_density = energy.eval(initial_position);
        if !log_density.is_finite() {
            return Err(NutsError::NonFiniteStart { log_density });
        }

        let initial_step_size = self
            .settings
            .step_size_heuristic()
            .select(energy, initial_position, rng)?;
        info!("selected step size {initial_step_size:.4e}");
        let mut adaptation = (self.settings.adapt_step_size && burn_in > 0)
            .then(|| DualAverage::new(initial_step_size, self.settings.target_accept));

        let mut samples: Vec<Array1<f64>> = Vec::with_capacity(iterations.div_ceil(thinning));
        let mut position = initial_position.clone();
        let mut step_size = initial_step_size;
        let mut depth_sum = 0;
        let mut max_depth_hits = 0;
        let mut accept_sum = 0.;
        for i in 0..(burn_in + iterations) {
            let draw = self.draw(&position, step_size, rng);
            debug!(
                "iteration {i}: tree depth {}, acceptance {:.3}",
                draw.depth, draw.accept_prob
            );
            depth_sum += draw.depth;
            max_depth_hits += usize::from(draw.hit_max_depth);
            position = draw.position;
            if i < burn_in {
                if let Some(adaptation) = adaptation.as_mut() {
                    adaptation.update(draw.accept_prob);
                    step_size = if i + 1 == burn_in {
                        adaptation.final_step_size()
                    } else {
                        adaptation.current_step_size()
                    };
                }
            } else {
                accept_sum += draw.accept_prob;
                if (i - burn_in) % thinning == 0 {
                    samples.push(position.clone());
                }
            }
        }
        if max_depth_hits > 0 {
            warn!(
                "maximum tree depth reached in {max_depth_hits} of {} iterations",
                burn_in + iterations
            );
        }
        if adaptation.is_some() {
            info!("adapted step size {step_size:.4e}");
        }
        self.step_size = Some(step_size);

        let stats = RunStats {
            initial_step_size,
            step_size,
            iterations: burn_in + iterations,
            mean_tree_depth: depth_sum as f64 / (burn_in + iterations).max(1) as f64,
            mean_accept_prob: accept_sum / iterations.max(1) as f64,
            max_tree_depth_hits: max_depth_hits,
        };
        info!("NUTS sampling complete: {stats}");
        self.stats = Some(stats);
        Ok(samples)
    }

    /// One NUTS iteration from `position`.
    fn draw<R: Rng + ?Sized>(&self, position: &Array1<f64>, step_size: f64, rng: &mut R) -> Draw {
        let momentum = self.kinetic.sample(rng);
        let log_p = neg_hamiltonian(self.integrator.energy(), &self.kinetic, position, &momentum);
        let tree = Tree::new(&self.integrator, step_size, Slice::draw(log_p, rng), log_p);

        let mut back = PhaseState::new(position.clone(), momentum);
        let mut forward = back.clone();
        let mut next_sample = position.clone();
        let mut n = 1;
        let mut depth = 0;
        let mut valid = true;
        let mut sum_accept_prob = 0.;
        let mut n_leaves = 0;
        while valid {
            if self.settings.max_tree_depth.is_some_and(|max| depth >= max) {
                debug!("maximum tree depth {depth} reached, stopping trajectory");
                return Draw {
                    position: next_sample,
                    depth,
                    accept_prob: sum_accept_prob / n_leaves.max(1) as f64,
                    hit_max_depth: true,
                };
            }
            let direction: Direction = rng.gen();
            let Subtree {
                back: sub_back,
                forward: sub_forward,
                candidate,
                weight,
                valid: sub_valid,
                sum_accept_prob: sub_accept_prob,
                n_leaves: sub_leaves,
                ..
            } = match direction {
                Direction::Backward => tree.build(&back, direction, depth, rng),
                Direction::Forward => tree.build(&forward, direction, depth, rng),
            };
            match direction {
                Direction::Backward => back = sub_back,
                Direction::Forward => forward = sub_forward,
            }
            if sub_valid && rng.gen::<f64>() < (weight as f64 / n as f64).min(1.) {
                next_sample = candidate;
            }
            n += weight;
            sum_accept_prob += sub_accept_prob;
            n_leaves += sub_leaves;
            valid = sub_valid && no_u_turn(&back, &forward);
            depth += 1;
        }
        Draw {
            position: next_sample,
            depth,
            accept_prob: sum_accept_prob / n_leaves.max(1) as f64,
            hit_max_depth: false,
        }
    }
}

/// Draws `iterations` samples from `energy` after discarding `burn_in`
/// iterations, with default settings otherwise.
///
/// The heuristic's step size is refined by dual averaging during burn-in and
/// fixed afterwards. With `burn_in == 0` the heuristic's step size is used
/// throughout; build a [`NUTS`] with `adapt_step_size: false` to skip the
/// adaptation altogether.
pub fn run<E, R>(
    initial_position: &Array1<f64>,
    energy: E,
    iterations: usize,
    burn_in: usize,
    rng: &mut R,
) -> Result<Vec<Array1<f64>>>
where
    E: EnergyFunction,
    R: Rng + ?Sized,
{
    NUTS::new(energy, Settings::default())?.run(initial_position, iterations, burn_in, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::{EnergyClosure, Gaussian, MultivariateGaussian};
    use ndarray::arr1;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_chain_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let samples = run(&arr1(&[0.]), Gaussian::standard(), 50, 10, &mut rng).unwrap();
        assert_eq!(samples.len(), 50);
        assert!(samples.iter().all(|s| s.len() == 1 && s[0].is_finite()));
    }

    #[test]
    fn test_thinning() {
        let settings = Settings {
            iterations: 20,
            burn_in: 5,
            thinning: 3,
            ..Settings::default()
        };
        let mut nuts = NUTS::new(MultivariateGaussian::standard(2), settings).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let samples = nuts.sample(&arr1(&[0.1, 0.1]), &mut rng).unwrap();
        assert_eq!(samples.len(), 7);
        let stats = nuts.stats().unwrap();
        assert_eq!(stats.iterations, 25);
        assert_eq!(Some(stats.step_size), nuts.step_size());
    }

    #[test]
    fn test_step_size_fixed_without_adaptation() {
        let settings = Settings {
            iterations: 20,
            burn_in: 10,
            adapt_step_size: false,
            ..Settings::default()
        };
        let mut nuts = NUTS::new(Gaussian::standard(), settings).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(29);
        nuts.sample(&arr1(&[0.5]), &mut rng).unwrap();
        let stats = nuts.stats().unwrap();
        assert_eq!(stats.step_size, stats.initial_step_size);
        assert!(stats.mean_accept_prob > 0. && stats.mean_accept_prob <= 1.);
    }

    #[test]
    fn test_adaptation_changes_step_size() {
        let settings = Settings {
            iterations: 10,
            burn_in: 50,
            ..Settings::default()
        };
        let mut nuts = NUTS::new(MultivariateGaussian::standard(2), settings).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(30);
        nuts.sample(&arr1(&[0.5, -0.5]), &mut rng).unwrap();
        let stats = nuts.stats().unwrap();
        assert_ne!(stats.step_size, stats.initial_step_size);
        assert!(stats.step_size.is_finite() && stats.step_size > 0.);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let energy = MultivariateGaussian::standard(2);
        let a = run(&arr1(&[1., 1.]), &energy, 30, 5, &mut ChaCha8Rng::seed_from_u64(23)).unwrap();
        let b = run(&arr1(&[1., 1.]), &energy, 30, 5, &mut ChaCha8Rng::seed_from_u64(23)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_chain_moves() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let samples = run(&arr1(&[0.]), Gaussian::standard(), 100, 0, &mut rng).unwrap();
        let distinct = samples.windows(2).filter(|w| w[0] != w[1]).count();
        assert!(distinct > 50, "only {distinct} moves");
    }

    #[test]
    fn test_dimension_mismatch_fails_before_sampling() {
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        let err = run(&arr1(&[0., 0., 0.]), MultivariateGaussian::standard(2), 10, 0, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            NutsError::DimensionMismatch {
                what: "initial position",
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_gradient_of_wrong_length_fails_before_sampling() {
        let energy = EnergyClosure::new(
            2,
            |x: &Array1<f64>| -0.5 * x.dot(x),
            |x: &Array1<f64>| arr1(&[-x[0], -x[1], 0.]),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let err = run(&arr1(&[0.5, 0.5]), energy, 10, 5, &mut rng).unwrap_err();
        assert_eq!(
            err,
            NutsError::DimensionMismatch {
                what: "gradient",
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_non_finite_start_is_rejected() {
        let energy = EnergyClosure::new(
            1,
            |x: &Array1<f64>| if x[0] < 0. { f64::NEG_INFINITY } else { -x[0] },
            |_: &Array1<f64>| arr1(&[-1.]),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let err = run(&arr1(&[-1.]), energy, 10, 0, &mut rng).unwrap_err();
        assert!(matches!(err, NutsError::NonFiniteStart { .. }));
    }

    #[test]
    fn test_max_tree_depth_is_respected() {
        let settings = Settings {
            iterations: 30,
            burn_in: 0,
            max_tree_depth: Some(1),
            ..Settings::default()
        };
        let mut nuts = NUTS::new(Gaussian::new(0., 100.).unwrap(), settings).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(27);
        nuts.sample(&arr1(&[0.]), &mut rng).unwrap();
        let stats = nuts.stats().unwrap();
        assert!(stats.mean_tree_depth <= 1.);
    }

    #[test]
    fn test_max_tree_depth_hits_are_counted() {
        let settings = Settings {
            iterations: 10,
            burn_in: 0,
            max_tree_depth: Some(0),
            ..Settings::default()
        };
        let mut nuts = NUTS::new(Gaussian::standard(), settings).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let samples = nuts.sample(&arr1(&[0.7]), &mut rng).unwrap();
        assert!(samples.iter().all(|s| s[0] == 0.7));
        let stats = nuts.stats().unwrap();
        assert_eq!(stats.max_tree_depth_hits, 10);
        assert_eq!(stats.mean_tree_depth, 0.);
    }

    #[test]
    fn test_divergent_region_does_not_corrupt_chain() {
        // half-normal: log density undefined for negative positions
        let energy = EnergyClosure::new(
            1,
            |x: &Array1<f64>| if x[0] < 0. { f64::NAN } else { -0.5 * x[0] * x[0] },
            |x: &Array1<f64>| arr1(&[-x[0]]),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(28);
        let samples = run(&arr1(&[1.]), energy, 300, 50, &mut rng).unwrap();
        assert!(samples.iter().all(|s| s[0] >= 0.));
    }
}
