//! Exact least-squares potentials for finite state and action spaces.
//!
//! Rewards and coverage weights are `(s, a, s')` tables. The potential fit
//! builds the weighted normal equations of
//!
//! ```text
//! min_f  sum_{s,a,s'} w(s,a,s') * (R(s,a,s') - gamma * f(s') + f(s))^2 + lambda * |f|^2
//! ```
//!
//! and solves them by Cholesky factorization. The ridge keeps the system
//! solvable: a few steps of iterative refinement against the unregularized
//! equations remove its bias on visited states, while unvisited states only
//! see the ridge term and end up with a zero potential.

use crate::error::{CanonError, Result};
use crate::model::{evaluate_batch, RewardModel};
use crate::space::Transition;
use ndarray::{Array1, Array2, Array3};
use tracing::debug;

/// Relative pivot below which the normal equations count as singular.
const PIVOT_FLOOR: f64 = 1e-14;

/// Refinement steps against the unregularized normal equations.
const REFINEMENT_STEPS: usize = 3;

/// Broadcasts a state reward `R[s]` to `R[s, a, s']`.
pub fn state_to_3d(state_rewards: &Array1<f64>, n_actions: usize) -> Array3<f64> {
    let n = state_rewards.len();
    Array3::from_shape_fn((n, n_actions, n), |(s, _, _)| state_rewards[s])
}

/// Flattens a row-major grid reward `R[i, j]` to states and broadcasts it.
pub fn grid_to_3d(grid: &Array2<f64>, n_actions: usize) -> Array3<f64> {
    let flat: Array1<f64> = grid.iter().copied().collect();
    state_to_3d(&flat, n_actions)
}

/// `R(s, a, s') + gamma * f(s') - f(s)`.
pub fn shape(reward: &Array3<f64>, potential: &Array1<f64>, discount: f64) -> Result<Array3<f64>> {
    check_potential(reward, potential)?;
    Ok(Array3::from_shape_fn(reward.dim(), |(s, a, next)| {
        reward[[s, a, next]] + discount * potential[next] - potential[s]
    }))
}

/// Inverse of [`shape`].
pub fn deshape(reward: &Array3<f64>, potential: &Array1<f64>, discount: f64) -> Result<Array3<f64>> {
    shape(reward, &potential.mapv(|v| -v), discount)
}

fn check_potential(reward: &Array3<f64>, potential: &Array1<f64>) -> Result<()> {
    let (n_states, _, n_next) = reward.dim();
    if n_states != n_next || potential.len() != n_states {
        return Err(CanonError::ShapeMismatch(format!(
            "potential of {} states does not fit reward table {:?}",
            potential.len(),
            reward.dim()
        )));
    }
    Ok(())
}

fn check_same_dims(reward: &Array3<f64>, other: &Array3<f64>, what: &str) -> Result<()> {
    if reward.dim() == other.dim() {
        Ok(())
    } else {
        Err(CanonError::ShapeMismatch(format!(
            "{what} {:?} does not match reward table {:?}",
            other.dim(),
            reward.dim()
        )))
    }
}

/// Evaluates `model` on every `(s, a, s')` triple of its discrete spaces.
pub fn reward_table(model: &dyn RewardModel) -> Result<Array3<f64>> {
    let (n_states, n_actions) = model.spec().tabular_dims().ok_or_else(|| {
        CanonError::ShapeMismatch("a reward table needs discrete spaces".into())
    })?;
    let mut batch = Vec::with_capacity(n_states * n_actions * n_states);
    for s in 0..n_states {
        for a in 0..n_actions {
            for next in 0..n_states {
                batch.push(Transition::discrete(s, a, next));
            }
        }
    }
    let values = evaluate_batch(model, &batch)?;
    Array3::from_shape_vec((n_states, n_actions, n_states), values)
        .map_err(|e| CanonError::ShapeMismatch(e.to_string()))
}

/// Accumulates weighted normal equations `A^T W A x = A^T W y`, one sparse
/// design row at a time.
struct NormalEquations {
    lhs: Array2<f64>,
    rhs: Array1<f64>,
}

impl NormalEquations {
    fn new(n: usize) -> Self {
        Self {
            lhs: Array2::zeros((n, n)),
            rhs: Array1::zeros(n),
        }
    }

    fn add_row(&mut self, row: &[(usize, f64)], weight: f64, target: f64) {
        for &(i, vi) in row {
            self.rhs[i] += weight * vi * target;
            for &(j, vj) in row {
                self.lhs[[i, j]] += weight * vi * vj;
            }
        }
    }

    /// Solves `(A + lambda * I_ridge) x = b`, then refines `x` towards the
    /// minimum-norm solution of `A x = b` reusing the same factorization.
    fn solve(self, ridge: &[usize], regularization: f64) -> Result<Array1<f64>> {
        let mut regularized = self.lhs.clone();
        for &i in ridge {
            regularized[[i, i]] += regularization;
        }
        let factor = cholesky(regularized)?;
        let mut x = substitute(&factor, self.rhs.clone());
        if regularization > 0.0 {
            for _ in 0..REFINEMENT_STEPS {
                let residual = &self.rhs - &self.lhs.dot(&x);
                x = x + substitute(&factor, residual);
            }
        }
        Ok(x)
    }
}

/// Lower-triangular `L` with `L L^T = a`.
fn cholesky(mut a: Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= a[[j, k]] * a[[j, k]];
        }
        if d.is_nan() || d <= PIVOT_FLOOR * scale {
            return Err(CanonError::Config(format!(
                "potential normal equations are singular at state {j}; use a positive regularization"
            )));
        }
        let d = d.sqrt();
        a[[j, j]] = d;
        for i in j + 1..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= a[[i, k]] * a[[j, k]];
            }
            a[[i, j]] = s / d;
        }
    }
    Ok(a)
}

/// Forward then backward substitution through a Cholesky factor.
fn substitute(l: &Array2<f64>, b: Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = b;
    for i in 0..n {
        let mut s = x[i];
        for k in 0..i {
            s -= l[[i, k]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    for i in (0..n).rev() {
        let mut s = x[i];
        for k in i + 1..n {
            s -= l[[k, i]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}

#[cfg(test)]
fn cholesky_solve(a: Array2<f64>, b: Array1<f64>) -> Result<Array1<f64>> {
    Ok(substitute(&cholesky(a)?, b))
}

/// Normalized visitation weights with the triples they apply to.
fn visited(transitions: &Array3<f64>) -> Result<Vec<((usize, usize, usize), f64)>> {
    if transitions.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(CanonError::Config(
            "transition weights must be finite and non-negative".into(),
        ));
    }
    let total: f64 = transitions.sum();
    if total <= 0.0 {
        return Err(CanonError::Config("transition table has no mass".into()));
    }
    Ok(transitions
        .indexed_iter()
        .filter(|(_, w)| **w > 0.0)
        .map(|(idx, w)| (idx, w / total))
        .collect())
}

/// Potential row `gamma * e_{s'} - e_s`.
fn shaping_row(s: usize, next: usize, discount: f64) -> [(usize, f64); 2] {
    [(next, discount), (s, -1.0)]
}

/// Least-squares potential of `reward` under the coverage `transitions`.
///
/// Subtracting the shaping of the returned potential gives the canonical
/// representative of the reward's shaping class on that coverage.
pub fn fit_potential_tabular(
    reward: &Array3<f64>,
    transitions: &Array3<f64>,
    discount: f64,
    regularization: f64,
) -> Result<Array1<f64>> {
    check_same_dims(reward, transitions, "transition table")?;
    let (n_states, _, n_next) = reward.dim();
    if n_states != n_next {
        return Err(CanonError::ShapeMismatch(format!(
            "reward table {:?} is not square in states",
            reward.dim()
        )));
    }
    let rows = visited(transitions)?;
    let mut system = NormalEquations::new(n_states);
    for ((s, a, next), w) in &rows {
        system.add_row(&shaping_row(*s, *next, discount), *w, reward[[*s, *a, *next]]);
    }
    let ridge: Vec<usize> = (0..n_states).collect();
    let potential = system.solve(&ridge, regularization)?;
    debug!(n_states, visited = rows.len(), "solved tabular potential");
    Ok(potential)
}

/// Weighted mean squared difference of two reward tables. Uniform weights
/// when `weights` is `None`.
pub fn direct_sq_divergence(
    a: &Array3<f64>,
    b: &Array3<f64>,
    weights: Option<&Array3<f64>>,
) -> Result<f64> {
    check_same_dims(a, b, "reward table")?;
    match weights {
        Some(w) => {
            check_same_dims(a, w, "weight table")?;
            Ok(visited(w)?
                .into_iter()
                .map(|(idx, w)| w * (a[idx] - b[idx]).powi(2))
                .sum())
        }
        None => {
            let n = a.len().max(1) as f64;
            Ok(a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / n)
        }
    }
}

/// Member of the shaping-and-affine class of a source reward that lies
/// closest to a target reward.
#[derive(Debug, Clone)]
pub struct ClosestReward {
    /// `scale * source + shaping(potential) + shift`.
    pub reward: Array3<f64>,
    pub potential: Array1<f64>,
    pub scale: f64,
    pub shift: f64,
}

/// Jointly fits a potential, a non-negative scale and a shift so that the
/// transformed `source` matches `target` in weighted least squares.
pub fn closest_reward(
    source: &Array3<f64>,
    target: &Array3<f64>,
    transitions: &Array3<f64>,
    discount: f64,
    regularization: f64,
) -> Result<ClosestReward> {
    check_same_dims(source, target, "target reward")?;
    check_same_dims(source, transitions, "transition table")?;
    let n_states = source.dim().0;
    let rows = visited(transitions)?;

    let fit = |with_scale: bool| -> Result<Array1<f64>> {
        let scale_col = n_states;
        let shift_col = if with_scale { n_states + 1 } else { n_states };
        let mut system = NormalEquations::new(shift_col + 1);
        for ((s, a, next), w) in &rows {
            let [p0, p1] = shaping_row(*s, *next, discount);
            let mut row = vec![p0, p1, (shift_col, 1.0)];
            if with_scale {
                row.push((scale_col, source[[*s, *a, *next]]));
            }
            system.add_row(&row, *w, target[[*s, *a, *next]]);
        }
        let ridge: Vec<usize> = (0..=shift_col).collect();
        system.solve(&ridge, regularization)
    };

    let mut solution = fit(true)?;
    let mut scale = solution[n_states];
    let mut shift = solution[n_states + 1];
    if scale < 0.0 {
        solution = fit(false)?;
        scale = 0.0;
        shift = solution[n_states];
    }
    let potential = solution.slice(ndarray::s![..n_states]).to_owned();
    let scaled = source.mapv(|r| scale * r + shift);
    let reward = shape(&scaled, &potential, discount)?;
    Ok(ClosestReward {
        reward,
        potential,
        scale,
        shift,
    })
}
