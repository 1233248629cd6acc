use crate::energy::EnergyFunction;
use crate::error::{check_dim, Result};
use ndarray::Array1;

/// Symplectic integrator of the Hamiltonian dynamics defined by an energy
/// function and a standard normal kinetic energy.
#[derive(Debug, Clone)]
pub struct LeapfrogIntegrator<E> {
    energy: E,
}

impl<E: EnergyFunction> LeapfrogIntegrator<E> {
    pub fn new(energy: E) -> Self {
        Self { energy }
    }

    pub fn energy(&self) -> &E {
        &self.energy
    }

    /// Integrates `steps` leapfrog steps of size `step_size` starting from
    /// `(position, momentum)`. A negative step size integrates backwards.
    pub fn run(
        &self,
        position: &Array1<f64>,
        momentum: &Array1<f64>,
        steps: usize,
        step_size: f64,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        self.check_state(position, momentum)?;
        let mut new_position = position.clone();
        let mut new_momentum = momentum.clone();
        for _ in 0..steps {
            self.step(&mut new_position, &mut new_momentum, step_size);
        }
        Ok((new_position, new_momentum))
    }

    /// Fails unless position, momentum, the energy and its gradient at
    /// `position` all share one dimension.
    pub fn check_state(&self, position: &Array1<f64>, momentum: &Array1<f64>) -> Result<()> {
        check_dim("position", self.energy.dim(), position.len())?;
        check_dim("momentum", position.len(), momentum.len())?;
        check_dim("gradient", position.len(), self.energy.gradient(position).len())
    }

    /// Single step without dimension checks; callers validate once upfront.
    pub(crate) fn step(&self, position: &mut Array1<f64>, momentum: &mut Array1<f64>, step_size: f64) {
        momentum.scaled_add(step_size / 2., &self.energy.gradient(position));
        position.scaled_add(step_size, &*momentum);
        momentum.scaled_add(step_size / 2., &self.energy.gradient(position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::{EnergyClosure, Gaussian, MultivariateGaussian};
    use crate::error::NutsError;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};
    use proptest::prelude::*;

    fn correlated_gaussian() -> MultivariateGaussian {
        MultivariateGaussian::new(arr1(&[1., -1.]), arr2(&[[1.5, 0.4], [0.4, 0.8]])).unwrap()
    }

    proptest! {
        #[test]
        fn leapfrog_is_reversible(
            x0 in -3f64..3f64,
            x1 in -3f64..3f64,
            r0 in -3f64..3f64,
            r1 in -3f64..3f64,
            steps in 1usize..30,
            step_size in 0.01f64..0.5,
        ) {
            let integrator = LeapfrogIntegrator::new(correlated_gaussian());
            let position = arr1(&[x0, x1]);
            let momentum = arr1(&[r0, r1]);
            let (p, r) = integrator.run(&position, &momentum, steps, step_size).unwrap();
            let (p_back, r_back) = integrator.run(&p, &r, steps, -step_size).unwrap();
            for i in 0..2 {
                prop_assert!((p_back[i] - position[i]).abs() < 1e-8);
                prop_assert!((r_back[i] - momentum[i]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_single_step_matches_hand_computation() {
        let integrator = LeapfrogIntegrator::new(Gaussian::standard());
        let (p, r) = integrator.run(&arr1(&[1.]), &arr1(&[0.5]), 1, 0.1).unwrap();
        // r_half = 0.5 - 0.05 * 1 = 0.45; p = 1 + 0.1 * 0.45 = 1.045; r = 0.45 - 0.05 * 1.045
        assert_abs_diff_eq!(p[0], 1.045, epsilon = 1e-12);
        assert_abs_diff_eq!(r[0], 0.39775, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_steps_is_identity() {
        let integrator = LeapfrogIntegrator::new(correlated_gaussian());
        let (p, r) = integrator.run(&arr1(&[0.3, 0.2]), &arr1(&[-1., 1.]), 0, 0.3).unwrap();
        assert_eq!(p, arr1(&[0.3, 0.2]));
        assert_eq!(r, arr1(&[-1., 1.]));
    }

    #[test]
    fn test_approximately_conserves_hamiltonian() {
        let integrator = LeapfrogIntegrator::new(correlated_gaussian());
        let position = arr1(&[0.5, 0.5]);
        let momentum = arr1(&[1., -0.5]);
        let h = |p: &Array1<f64>, r: &Array1<f64>| {
            integrator.energy().eval(p) - 0.5 * r.dot(r)
        };
        let (p, r) = integrator.run(&position, &momentum, 100, 0.01).unwrap();
        assert_abs_diff_eq!(h(&p, &r), h(&position, &momentum), epsilon = 1e-3);
    }

    #[test]
    fn test_dimension_mismatch_fails_fast() {
        let integrator = LeapfrogIntegrator::new(correlated_gaussian());
        let err = integrator
            .run(&arr1(&[0., 0.]), &arr1(&[1., 2., 3.]), 1, 0.1)
            .unwrap_err();
        assert_eq!(
            err,
            NutsError::DimensionMismatch {
                what: "momentum",
                expected: 2,
                found: 3
            }
        );
        assert!(integrator
            .run(&arr1(&[0.]), &arr1(&[1.]), 1, 0.1)
            .is_err());
    }

    #[test]
    fn test_gradient_of_wrong_length_is_rejected() {
        let short = EnergyClosure::new(
            2,
            |x: &Array1<f64>| -0.5 * x.dot(x),
            |x: &Array1<f64>| arr1(&[-x[0]]),
        );
        let err = LeapfrogIntegrator::new(short)
            .run(&arr1(&[1., 2.]), &arr1(&[0., 0.]), 1, 0.1)
            .unwrap_err();
        assert_eq!(
            err,
            NutsError::DimensionMismatch {
                what: "gradient",
                expected: 2,
                found: 1
            }
        );

        let long = EnergyClosure::new(
            2,
            |x: &Array1<f64>| -0.5 * x.dot(x),
            |x: &Array1<f64>| arr1(&[-x[0], -x[1], 0.]),
        );
        let err = LeapfrogIntegrator::new(long)
            .run(&arr1(&[1., 2.]), &arr1(&[0., 0.]), 1, 0.1)
            .unwrap_err();
        assert!(matches!(
            err,
            NutsError::DimensionMismatch { what: "gradient", found: 3, .. }
        ));
    }
}
