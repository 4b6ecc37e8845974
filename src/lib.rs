//! # lineagesim
//!
//! Synthetic single-cell RNA-seq counts along a branching differentiation
//! process, for benchmarking trajectory-inference and clustering methods.
//!
//! This crate is intentionally small:
//!
//! - it simulates **per-branch mean-expression trajectories** (smooth,
//!   modular, continuous across branch points) over a caller-supplied tree,
//! - it converts those means into **overdispersed integer counts** through an
//!   extended (real-valued `r`) negative binomial,
//! - it does not plot, fit, or touch the filesystem (that belongs to callers).
//!
//! ## Public invariants (must not change)
//!
//! - **Determinism knobs are explicit**: every stochastic function takes
//!   `&mut impl Rng`; the parallel samplers take a `u64` seed and document
//!   their stream layout.
//! - **No hidden clamping**: diffusion trajectories and composed means may go
//!   negative. The two boundary policies that do exist are documented where
//!   they apply (the end-of-branch row fallback and the zero count for
//!   non-positive means, both in [`sampling`]).
//! - **Rejection loops are bounded**: the module builder's correlation-retry
//!   loop has an explicit budget and surfaces exhaustion as an error instead
//!   of looping forever.
//!
//! ## Module map
//!
//! - `diffusion`: amortized random-walk trajectories + decorrelated module
//!   trajectory matrices (W)
//! - `membership`: gene-to-module assignment + Beta-weighted membership
//!   matrices (H)
//! - `topology`: the differentiation tree — branch spans, timezones, branch
//!   candidates per timezone
//! - `branching`: per-branch mean expression M = W·H with continuity across
//!   branch points
//! - `negbin`: extended negative binomial (mean–variance relation, pmf,
//!   inverse-CDF sampler)
//! - `sampling`: cell-time/branch assignment and count-matrix orchestration
//! - `stats`: Pearson correlation used by the rejection test

pub mod branching;
pub mod diffusion;
pub mod membership;
pub mod negbin;
pub mod sampling;
pub mod stats;
pub mod topology;

/// lineagesim error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("retry budget exhausted: {0}")]
    RetryExhausted(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
