//! Levenberg–Marquardt nonlinear least squares.
//!
//! Given:
//! - samples `(x_i, y_i)`
//! - a model `f(x, p)` evaluated over the whole `x` slice
//! - a starting point `p0`
//!
//! we minimize `Σ (y_i - f(x_i, p))²` by damped Gauss–Newton steps. The Jacobian
//! is taken by forward differences, so any `LineShapeProvider` works without
//! analytic derivatives.
//!
//! Convergence is declared when the relative cost reduction drops below `ftol`,
//! the step becomes negligible relative to `p` (`xtol`), or the damping grows so
//! large that no step can improve the cost (a stationary point). Running out of
//! iterations or hitting a non-finite cost is a `FitDivergence`.

use nalgebra::{DMatrix, DVector};

use crate::error::PipelineError;
use crate::math::solve_damped;

#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub iterations: usize,
}

const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-12;

/// Fit `model` to `(x, y)` starting from `p0`.
pub fn levenberg_marquardt<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmFit, PipelineError>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let n = x.len();
    let k = p0.len();
    if y.len() != n {
        return Err(PipelineError::InvalidInput(format!(
            "x/y length mismatch: {n} vs {}",
            y.len()
        )));
    }
    if n < k {
        return Err(divergence(0, format!("{n} samples cannot constrain {k} parameters")));
    }

    let mut p = p0.to_vec();
    let mut r = residuals(&model, x, y, &p);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(divergence(0, "non-finite cost at the initial guess".to_string()));
    }

    let mut lambda = opts.initial_lambda;

    for iter in 1..=opts.max_iterations {
        let jac = jacobian(&model, x, &p);
        // Marquardt scaling: damp each parameter by its curvature.
        let scale: Vec<f64> = (0..k).map(|j| jac.column(j).norm_squared().max(1e-12)).collect();

        loop {
            let Some(step) = solve_damped(&jac, &r, &scale, lambda) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(divergence(iter, "damped system could not be solved".to_string()));
                }
                continue;
            };

            let trial: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            let r_trial = residuals(&model, x, y, &trial);
            let cost_trial = r_trial.norm_squared();

            if cost_trial.is_finite() && cost_trial < cost {
                let reduction = cost - cost_trial;
                let step_norm = step.norm();
                let p_norm = DVector::from_column_slice(&p).norm();

                p = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                let converged = cost == 0.0
                    || reduction <= opts.ftol * (cost + reduction)
                    || step_norm <= opts.xtol * (p_norm + opts.xtol);
                if converged {
                    return Ok(LmFit {
                        params: p,
                        cost,
                        iterations: iter,
                    });
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No direction improves the cost any more.
                return Ok(LmFit {
                    params: p,
                    cost,
                    iterations: iter,
                });
            }
        }
    }

    Err(divergence(
        opts.max_iterations,
        format!("cost still decreasing (last cost {cost:.6e})"),
    ))
}

fn divergence(iterations: usize, reason: String) -> PipelineError {
    PipelineError::FitDivergence { iterations, reason }
}

fn residuals<F>(model: &F, x: &[f64], y: &[f64], p: &[f64]) -> DVector<f64>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let fx = model(x, p);
    DVector::from_iterator(y.len(), y.iter().zip(fx).map(|(yi, fi)| yi - fi))
}

fn jacobian<F>(model: &F, x: &[f64], p: &[f64]) -> DMatrix<f64>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let n = x.len();
    let base = model(x, p);
    let mut jac = DMatrix::<f64>::zeros(n, p.len());
    let mut shifted = p.to_vec();
    for j in 0..p.len() {
        let h = 1e-7 * p[j].abs().max(1e-4);
        shifted[j] = p[j] + h;
        let fx = model(x, &shifted);
        for i in 0..n {
            jac[(i, j)] = (fx[i] - base[i]) / h;
        }
        shifted[j] = p[j];
    }
    jac
}
