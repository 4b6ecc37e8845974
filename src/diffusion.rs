//! Amortized diffusion trajectories and decorrelated module matrices.
//!
//! A diffusion trajectory describes how one module of coexpressed genes moves
//! through pseudotime: a random walk with momentum, a per-trajectory damping
//! factor, and innovation noise that shrinks with the trajectory length so
//! long branches stay smooth.
//!
//! A branch is described by K such trajectories stacked into a T×K matrix.
//! Columns are kept pairwise decorrelated by rejection: a freshly drawn
//! column that correlates too strongly with any earlier column is discarded
//! and redrawn, under an explicit budget (see [`ModuleSimConfig`]).

use crate::stats::pearson;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the initial velocity draw.
const INITIAL_VELOCITY_SD: f64 = 0.2;

/// Momentum retained per step before damping.
const MOMENTUM: f64 = 0.95;

/// Sample one diffusion trajectory of length `steps`.
///
/// The walk starts at `W[0] ~ Uniform(0,1)` with velocity
/// `V[0] ~ Normal(0, 0.2)` and evolves as
///
/// ```text
/// W[t+1] = W[t] + V[t]
/// V[t+1] = 0.95·V[t] + ε − η·V[t],   ε ~ Normal(0, 1/steps),  η ~ Uniform(0,1)
/// ```
///
/// where the damping factor η is drawn once per trajectory. Values are not
/// clamped: a trajectory may drift below zero.
pub fn diffusion(steps: usize, rng: &mut impl Rng) -> Result<Array1<f64>> {
    if steps == 0 {
        return Err(Error::Domain("trajectory length must be >= 1"));
    }

    let start_velocity = Normal::new(0.0, INITIAL_VELOCITY_SD)
        .map_err(|_| Error::Domain("invalid initial velocity scale"))?;
    let innovation = Normal::new(0.0, 1.0 / steps as f64)
        .map_err(|_| Error::Domain("invalid innovation scale"))?;

    let mut w = Array1::<f64>::zeros(steps);
    w[0] = rng.random::<f64>();
    let mut v: f64 = start_velocity.sample(rng);
    let damping: f64 = rng.random::<f64>();

    for t in 0..steps - 1 {
        w[t + 1] = w[t] + v;
        let eps: f64 = innovation.sample(rng);
        v = MOMENTUM * v + eps - damping * v;
    }
    Ok(w)
}

/// Budget knobs for the decorrelated module-matrix builder.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSimConfig {
    /// Maximum tolerated |Pearson correlation| between any two columns.
    pub cutoff: f64,
    /// Consecutive rejected draws for one column before the attempt is
    /// abandoned.
    pub max_rejections: usize,
    /// Full-matrix restarts before giving up for good.
    pub max_restarts: usize,
}

impl Default for ModuleSimConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.2,
            max_rejections: 100,
            max_restarts: 20,
        }
    }
}

impl ModuleSimConfig {
    fn validate(&self) -> Result<()> {
        if !(self.cutoff > 0.0) || !self.cutoff.is_finite() {
            return Err(Error::Domain("correlation cutoff must be positive and finite"));
        }
        if self.max_rejections == 0 || self.max_restarts == 0 {
            return Err(Error::Domain("retry budgets must be >= 1"));
        }
        Ok(())
    }
}

/// One attempt at building a T×K matrix of pairwise-decorrelated diffusion
/// trajectories (rows = pseudotime steps, columns = modules).
///
/// Column `k` is redrawn until its |Pearson correlation| against every
/// earlier column stays within `cfg.cutoff`; column 0 is always accepted.
/// Returns [`Error::RetryExhausted`] once `cfg.max_rejections` consecutive
/// draws for the same column have been rejected — callers that can afford a
/// fresh start should use [`simulate_modules`] instead.
pub fn simulate_modules_once(
    steps: usize,
    k: usize,
    cfg: &ModuleSimConfig,
    rng: &mut impl Rng,
) -> Result<Array2<f64>> {
    if steps < 2 {
        return Err(Error::Domain("branch length must be >= 2"));
    }
    if k == 0 {
        return Err(Error::Domain("module count must be >= 1"));
    }
    cfg.validate()?;

    let mut w = Array2::<f64>::zeros((steps, k));
    let mut filled = 0usize;
    let mut rejections = 0usize;

    while filled < k {
        let candidate = diffusion(steps, rng)?;

        let mut accept = true;
        for earlier in 0..filled {
            let r = pearson(&candidate.view(), &w.column(earlier))?;
            if r.abs() > cfg.cutoff {
                accept = false;
                break;
            }
        }

        if accept {
            w.column_mut(filled).assign(&candidate);
            filled += 1;
            rejections = 0;
        } else {
            rejections += 1;
            if rejections > cfg.max_rejections {
                return Err(Error::RetryExhausted(
                    "could not draw a decorrelated module trajectory",
                ));
            }
        }
    }
    Ok(w)
}

/// Build a T×K decorrelated module matrix, restarting from scratch when an
/// attempt exhausts its rejection budget.
///
/// Rejection gets harder as `k` grows and `cfg.cutoff` shrinks; when
/// `cfg.max_restarts` attempts all fail the configuration itself is at fault
/// and the error says so.
pub fn simulate_modules(
    steps: usize,
    k: usize,
    cfg: &ModuleSimConfig,
    rng: &mut impl Rng,
) -> Result<Array2<f64>> {
    for restart in 0..cfg.max_restarts {
        match simulate_modules_once(steps, k, cfg, rng) {
            Ok(w) => return Ok(w),
            Err(Error::RetryExhausted(_)) => {
                log::trace!(
                    "module matrix attempt {}/{} exhausted its rejection budget",
                    restart + 1,
                    cfg.max_restarts
                );
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::Config(format!(
        "correlation cutoff {} is too strict for {} modules over {} steps",
        cfg.cutoff, k, steps
    )))
}
