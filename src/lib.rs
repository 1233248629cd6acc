//! Sampling from unnormalised densities with the No-U-Turn Sampler.
//!
//! A target is described by an [`EnergyFunction`]: its log density up to a
//! constant and the gradient thereof. [`NUTS`] picks a starting step size with
//! the [`StepSizeHeuristic`], tunes it during burn-in and then grows leapfrog
//! trajectories by repeated doubling until they make a U-turn.
//!
//! ```no_run
//! use ndarray::arr1;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rs_nuts::{run, Gaussian};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let samples = run(&arr1(&[0.]), Gaussian::standard(), 2000, 200, &mut rng).unwrap();
//! assert_eq!(samples.len(), 2000);
//! ```

pub mod energy;
pub mod error;
pub mod leapfrog;
pub mod momentum;
pub mod nuts;
pub mod settings;
pub mod step_size;
pub mod tree_builder;

pub use energy::{numerical_gradient, EnergyClosure, EnergyFunction, Gaussian, MultivariateGaussian};
pub use error::{NutsError, Result};
pub use leapfrog::LeapfrogIntegrator;
pub use nuts::{run, RunStats, NUTS};
pub use settings::Settings;
pub use step_size::{DualAverage, StepSizeHeuristic};
