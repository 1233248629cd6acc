use crate::energy::EnergyFunction;
use crate::leapfrog::LeapfrogIntegrator;
use crate::momentum::{neg_hamiltonian, StandardNormalMomentum};
use log::debug;
use ndarray::Array1;
use rand::distributions::{Distribution, Standard};
use rand::Rng;

/// Leaves whose joint log density falls this far below the slice are divergent.
pub const DELTA_MAX: f64 = 1000.;

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    pub position: Array1<f64>,
    pub momentum: Array1<f64>,
}

impl PhaseState {
    pub fn new(position: Array1<f64>, momentum: Array1<f64>) -> Self {
        Self { position, momentum }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.,
            Direction::Backward => -1.,
        }
    }
}

impl Distribution<Direction> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        if rng.gen::<bool>() {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// Slice variable, drawn once per iteration and shared by every leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    log_threshold: f64,
}

impl Slice {
    /// Draws a threshold uniformly between zero and `exp(log_p)`.
    pub fn draw<R: Rng + ?Sized>(log_p: f64, rng: &mut R) -> Self {
        let u: f64 = rng.gen();
        Self::from_log_threshold(log_p + u.ln())
    }

    pub fn from_log_threshold(log_threshold: f64) -> Self {
        Self { log_threshold }
    }

    pub fn log_threshold(&self) -> f64 {
        self.log_threshold
    }

    /// True if the threshold, as a probability, is not positive.
    pub fn is_degenerate(&self) -> bool {
        !(self.log_threshold.exp() > 0.)
    }
}

/// A balanced subtree of the doubling trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    pub back: PhaseState,
    pub forward: PhaseState,
    pub candidate: Array1<f64>,
    /// number of leaves inside the slice
    pub weight: usize,
    pub valid: bool,
    /// sum over leaves of the acceptance probability relative to the
    /// initial state, for step size adaptation
    pub sum_accept_prob: f64,
    pub n_leaves: usize,
    depth: usize,
}

impl Subtree {
    fn leaf(state: PhaseState, weight: usize, valid: bool, accept_prob: f64) -> Self {
        Self {
            back: state.clone(),
            candidate: state.position.clone(),
            forward: state,
            weight,
            valid,
            sum_accept_prob: accept_prob,
            n_leaves: 1,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// False once the trajectory between `back` and `forward` starts to turn
/// back on itself.
pub fn no_u_turn(back: &PhaseState, forward: &PhaseState) -> bool {
    let span = &forward.position - &back.position;
    span.dot(&back.momentum) > 0. && span.dot(&forward.momentum) > 0.
}

/// Whether the candidate of a subtree of weight `n2` replaces that of an
/// adjacent subtree of weight `n1`, with probability `n2 / (n1 + n2)`.
pub fn replace_candidate<R: Rng + ?Sized>(n1: usize, n2: usize, rng: &mut R) -> bool {
    n2 > 0 && rng.gen::<f64>() < n2 as f64 / (n1 + n2) as f64
}

/// Joins `second`, built further out in `direction`, onto `first`.
fn merge<R: Rng + ?Sized>(first: Subtree, second: Subtree, direction: Direction, rng: &mut R) -> Subtree {
    let candidate = if replace_candidate(first.weight, second.weight, rng) {
        second.candidate
    } else {
        first.candidate
    };
    let (back, forward) = match direction {
        Direction::Forward => (first.back, second.forward),
        Direction::Backward => (second.back, first.forward),
    };
    let valid = second.valid && no_u_turn(&back, &forward);
    Subtree {
        back,
        forward,
        candidate,
        weight: first.weight + second.weight,
        valid,
        sum_accept_prob: first.sum_accept_prob + second.sum_accept_prob,
        n_leaves: first.n_leaves + second.n_leaves,
        depth: first.depth + 1,
    }
}

/// Builds the balanced subtrees that NUTS appends to its trajectory, for a
/// fixed step size and slice.
pub struct Tree<'a, E> {
    integrator: &'a LeapfrogIntegrator<E>,
    kinetic: StandardNormalMomentum,
    step_size: f64,
    slice: Slice,
    // joint log density of the state the trajectory started from
    initial_log_p: f64,
}

impl<'a, E: EnergyFunction> Tree<'a, E> {
    pub fn new(
        integrator: &'a LeapfrogIntegrator<E>,
        step_size: f64,
        slice: Slice,
        initial_log_p: f64,
    ) -> Self {
        Self {
            kinetic: StandardNormalMomentum::new(integrator.energy().dim()),
            integrator,
            step_size,
            slice,
            initial_log_p,
        }
    }

    /// Builds a subtree of `2^depth` leaves starting one leapfrog step
    /// beyond `edge` in `direction`.
    ///
    /// Equivalent to the recursive doubling procedure: the second half of
    /// any subtree is only built if its first half is valid, and an invalid
    /// first half is returned in place of its parent. Completed first halves
    /// wait on an explicit stack, so memory grows with `depth` only.
    pub fn build<R: Rng + ?Sized>(
        &self,
        edge: &PhaseState,
        direction: Direction,
        depth: usize,
        rng: &mut R,
    ) -> Subtree {
        let step_size = direction.sign() * self.step_size;
        let mut stack: Vec<Subtree> = Vec::with_capacity(depth);
        let mut edge = edge.clone();
        loop {
            self.integrator
                .step(&mut edge.position, &mut edge.momentum, step_size);
            let mut node = self.leaf(edge.clone());
            loop {
                match stack.pop() {
                    Some(first) if first.depth == node.depth => {
                        node = merge(first, node, direction, rng);
                    }
                    top => {
                        if let Some(first) = top {
                            stack.push(first);
                        }
                        if node.valid || node.depth == depth {
                            break;
                        }
                        // a failed first half stands in for its parent
                        node.depth += 1;
                    }
                }
            }
            if node.depth == depth {
                return node;
            }
            stack.push(node);
        }
    }

    fn leaf(&self, state: PhaseState) -> Subtree {
        let log_p = neg_hamiltonian(
            self.integrator.energy(),
            &self.kinetic,
            &state.position,
            &state.momentum,
        );
        if !log_p.is_finite() {
            debug!("non-finite joint log density {log_p} at leaf, treating as divergent");
            return Subtree::leaf(state, 0, false, 0.);
        }
        let accept_prob = (log_p - self.initial_log_p).min(0.).exp();
        if self.slice.is_degenerate() {
            return Subtree::leaf(state, 1, true, accept_prob);
        }
        let weight = usize::from(self.slice.log_threshold < log_p);
        let valid = log_p > self.slice.log_threshold - DELTA_MAX;
        if !valid {
            debug!("divergent leaf: joint log density {log_p:.2} far below slice");
        }
        Subtree::leaf(state, weight, valid, accept_prob)
    }
}
