use crate::energy::EnergyFunction;
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Sampling of momenta and computation of log densities.
pub trait Momentum {
    /// Compute the logarithm of the momentum density function, up to a constant
    fn log_density(&self, momentum: &Array1<f64>) -> f64;
    /// Draw a fresh momentum
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64>;
}

/// Independent standard normal momenta, i.e. an identity mass matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardNormalMomentum {
    dim: usize,
}

impl StandardNormalMomentum {
    pub fn new(dim: usize) -> Self {
        StandardNormalMomentum { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Momentum for StandardNormalMomentum {
    fn log_density(&self, momentum: &Array1<f64>) -> f64 {
        -0.5 * momentum.dot(momentum)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64> {
        Array1::from_shape_simple_fn(self.dim, || StandardNormal.sample(rng))
    }
}

/// Joint log density of a phase-space point, -H = (-U) + (-K).
pub fn neg_hamiltonian<E, M>(energy: &E, kinetic: &M, position: &Array1<f64>, momentum: &Array1<f64>) -> f64
where
    E: EnergyFunction + ?Sized,
    M: Momentum + ?Sized,
{
    energy.eval(position) + kinetic.log_density(momentum)
}
