use crate::error::{check_dim, NutsError, Result};
use ndarray::{Array1, Array2};

/// Distributions that can be targeted with the samplers in this crate.
///
/// `eval` is the log density up to an additive constant, i.e. the negated
/// potential energy. `gradient` must be its exact derivative.
pub trait EnergyFunction {
    /// Dimension of the positions this function accepts.
    fn dim(&self) -> usize;
    // Compute the unnormalised log density at a given position
    fn eval(&self, position: &Array1<f64>) -> f64;
    // Compute the gradient of the unnormalised log density at a given position
    fn gradient(&self, position: &Array1<f64>) -> Array1<f64>;
}

impl<E: EnergyFunction + ?Sized> EnergyFunction for &E {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn eval(&self, position: &Array1<f64>) -> f64 {
        (**self).eval(position)
    }

    fn gradient(&self, position: &Array1<f64>) -> Array1<f64> {
        (**self).gradient(position)
    }
}

/// Univariate normal over a one-dimensional position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    mean: f64,
    precision: f64,
}

impl Gaussian {
    pub fn new(mean: f64, sigma: f64) -> Result<Self> {
        if !(sigma.is_finite() && sigma > 0.) {
            return Err(NutsError::InvalidParameter(format!(
                "gaussian sigma must be positive and finite, got {sigma}"
            )));
        }
        Ok(Gaussian {
            mean,
            precision: 1. / (sigma * sigma),
        })
    }

    pub fn standard() -> Self {
        Gaussian {
            mean: 0.,
            precision: 1.,
        }
    }
}

impl EnergyFunction for Gaussian {
    fn dim(&self) -> usize {
        1
    }

    fn eval(&self, position: &Array1<f64>) -> f64 {
        let d = position[0] - self.mean;
        -0.5 * d * d * self.precision
    }

    fn gradient(&self, position: &Array1<f64>) -> Array1<f64> {
        Array1::from_elem(1, -(position[0] - self.mean) * self.precision)
    }
}

/// Multivariate normal parametrised by its mean and inverse covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateGaussian {
    mean: Array1<f64>,
    inv_covariance: Array2<f64>,
    // L + L^T, so that the gradient stays exact for non-symmetric input
    sym_inv_covariance: Array2<f64>,
}

impl MultivariateGaussian {
    pub fn new(mean: Array1<f64>, inv_covariance: Array2<f64>) -> Result<Self> {
        let (rows, cols) = inv_covariance.dim();
        check_dim("inverse covariance rows", mean.len(), rows)?;
        check_dim("inverse covariance columns", mean.len(), cols)?;
        if mean.iter().chain(inv_covariance.iter()).any(|v| !v.is_finite()) {
            return Err(NutsError::InvalidParameter(
                "multivariate gaussian parameters must be finite".to_string(),
            ));
        }
        let sym_inv_covariance = &inv_covariance + &inv_covariance.t();
        Ok(MultivariateGaussian {
            mean,
            inv_covariance,
            sym_inv_covariance,
        })
    }

    /// Independent standard normals in `dim` dimensions.
    pub fn standard(dim: usize) -> Self {
        let inv_covariance = Array2::eye(dim);
        MultivariateGaussian {
            mean: Array1::zeros(dim),
            sym_inv_covariance: &inv_covariance * 2.,
            inv_covariance,
        }
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn inv_covariance(&self) -> &Array2<f64> {
        &self.inv_covariance
    }
}

impl EnergyFunction for MultivariateGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn eval(&self, position: &Array1<f64>) -> f64 {
        let d = position - &self.mean;
        -0.5 * d.dot(&self.inv_covariance.dot(&d))
    }

    fn gradient(&self, position: &Array1<f64>) -> Array1<f64> {
        let d = position - &self.mean;
        self.sym_inv_covariance.dot(&d) * -0.5
    }
}

/// Energy backed by a pair of closures, e.g. functions compiled by an
/// external differentiation backend with their hyperparameters bound.
pub struct EnergyClosure<F, G>
where
    F: Fn(&Array1<f64>) -> f64,
    G: Fn(&Array1<f64>) -> Array1<f64>,
{
    dim: usize,
    eval: F,
    gradient: G,
}

impl<F, G> EnergyClosure<F, G>
where
    F: Fn(&Array1<f64>) -> f64,
    G: Fn(&Array1<f64>) -> Array1<f64>,
{
    pub fn new(dim: usize, eval: F, gradient: G) -> Self {
        EnergyClosure {
            dim,
            eval,
            gradient,
        }
    }
}

impl<F, G> EnergyFunction for EnergyClosure<F, G>
where
    F: Fn(&Array1<f64>) -> f64,
    G: Fn(&Array1<f64>) -> Array1<f64>,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, position: &Array1<f64>) -> f64 {
        (self.eval)(position)
    }

    fn gradient(&self, position: &Array1<f64>) -> Array1<f64> {
        (self.gradient)(position)
    }
}

/// Central finite-difference estimate of `energy.gradient(position)`.
pub fn numerical_gradient<E: EnergyFunction + ?Sized>(
    energy: &E,
    position: &Array1<f64>,
    delta: f64,
) -> Array1<f64> {
    let mut shifted = position.clone();
    Array1::from_shape_fn(position.len(), |i| {
        let x = position[i];
        shifted[i] = x + delta;
        let upper = energy.eval(&shifted);
        shifted[i] = x - delta;
        let lower = energy.eval(&shifted);
        shifted[i] = x;
        (upper - lower) / (2. * delta)
    })
}
