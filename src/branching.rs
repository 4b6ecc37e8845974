//! Per-branch mean expression and continuity across branch points.
//!
//! Every branch of the tree is simulated as an independent linear
//! differentiation: a T×K module matrix W (how K modules move through the
//! branch) times a K×G membership matrix H (which genes each module drives)
//! gives the T×G mean-expression matrix M. Independence leaves a jump at
//! every branch point, so afterwards each child matrix is shifted by a
//! constant per-gene offset until its first row matches its parent's last
//! row. Shifts are applied parent-before-grandchild so the continuity holds
//! globally on chained edges, not just per edge.

use crate::diffusion::{simulate_modules, ModuleSimConfig};
use crate::membership::{assign_gene_modules, membership_matrix};
use crate::topology::Topology;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};
use rand::Rng;

/// Knobs for one lineage draw.
#[derive(Debug, Clone, Copy)]
pub struct LineageConfig {
    /// Budgets for the decorrelated module matrices.
    pub modules: ModuleSimConfig,
    /// Shape parameters of the Beta distribution behind membership weights.
    pub membership_shape: (f64, f64),
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            modules: ModuleSimConfig::default(),
            membership_shape: (2.0, 2.0),
        }
    }
}

/// One simulated lineage: per-branch mean expression plus the matrices it
/// was composed from, kept for inspection.
#[derive(Debug, Clone)]
pub struct Lineage {
    /// Per-branch T×G mean-expression matrices (continuity-adjusted).
    pub means: Vec<Array2<f64>>,
    /// Per-branch T×K module trajectory matrices.
    pub modules: Vec<Array2<f64>>,
    /// Per-branch K×G membership matrices.
    pub memberships: Vec<Array2<f64>>,
}

/// Shift `child` by a constant per-gene offset so its first row equals the
/// parent's last row exactly.
pub fn align_to_parent(child: &ArrayView2<f64>, parent: &ArrayView2<f64>) -> Result<Array2<f64>> {
    if child.ncols() != parent.ncols() {
        return Err(Error::Shape("parent and child must cover the same genes"));
    }
    if child.nrows() == 0 || parent.nrows() == 0 {
        return Err(Error::Domain("mean matrices must have at least one row"));
    }
    let offset = &child.row(0).to_owned() - &parent.row(parent.nrows() - 1);
    let mut shifted = child.to_owned();
    shifted -= &offset;
    Ok(shifted)
}

/// Simulate mean-expression matrices for every branch of `tree`.
///
/// Per branch: a module matrix W (see [`crate::diffusion`]), a membership
/// matrix H (see [`crate::membership`]), and M = W·H. After all branches are
/// composed, continuity shifts run along [`Topology::ordered_edges`].
pub fn simulate_lineage(
    genes: usize,
    tree: &Topology,
    cfg: &LineageConfig,
    rng: &mut impl Rng,
) -> Result<Lineage> {
    if genes == 0 {
        return Err(Error::Domain("gene count must be >= 1"));
    }

    let branches = tree.branches();
    let mut means = Vec::with_capacity(branches);
    let mut modules = Vec::with_capacity(branches);
    let mut memberships = Vec::with_capacity(branches);

    for i in 0..branches {
        let steps = tree.time()[i];
        let k = tree.modules()[i];
        let w = simulate_modules(steps, k, &cfg.modules, rng)?;
        let groups = assign_gene_modules(k, genes, rng)?;
        let h = membership_matrix(
            genes,
            &groups,
            cfg.membership_shape.0,
            cfg.membership_shape.1,
            rng,
        )?;
        let m = w.dot(&h);
        log::debug!("branch {i}: composed {steps}x{genes} mean matrix from {k} modules");
        means.push(m);
        modules.push(w);
        memberships.push(h);
    }

    for &(parent, child) in tree.ordered_edges() {
        let shifted = align_to_parent(&means[child].view(), &means[parent].view())?;
        means[child] = shifted;
    }

    Ok(Lineage {
        means,
        modules,
        memberships,
    })
}

/// Sanity-check the dynamic range of a composed lineage.
///
/// Passes when every branch's widest per-gene range stays below `abs_max`
/// and the narrowest branch is at least `rel_dif` as wide as the widest one.
/// Callers can redraw a lineage that fails — wildly uneven branches separate
/// poorly after dimensionality reduction.
pub fn mean_ranges_ok(means: &[Array2<f64>], abs_max: f64, rel_dif: f64) -> bool {
    if means.is_empty() {
        return false;
    }
    let mut widest_per_branch = Vec::with_capacity(means.len());
    for m in means {
        let mut widest = 0.0f64;
        for col in m.columns() {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &v in col {
                lo = lo.min(v);
                hi = hi.max(v);
            }
            widest = widest.max(hi - lo);
        }
        widest_per_branch.push(widest);
    }
    let largest = widest_per_branch.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let smallest = widest_per_branch.iter().cloned().fold(f64::INFINITY, f64::min);
    widest_per_branch.iter().all(|&w| w < abs_max) && smallest / largest > rel_dif
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn alignment_makes_the_seam_exact() {
        let parent = array![[1.0, 2.0], [3.0, 4.0]];
        let child = array![[10.0, -5.0], [11.0, -4.0], [12.0, -3.0]];
        let shifted = align_to_parent(&child.view(), &parent.view()).unwrap();

        assert_eq!(shifted.row(0), parent.row(1));
        // The shift is constant: within-branch structure is untouched.
        let step = &shifted.row(1).to_owned() - &shifted.row(0);
        assert_eq!(step, array![1.0, 1.0]);
    }

    #[test]
    fn alignment_rejects_gene_count_mismatch() {
        let parent = array![[1.0, 2.0]];
        let child = array![[1.0, 2.0, 3.0]];
        assert!(align_to_parent(&child.view(), &parent.view()).is_err());
    }

    #[test]
    fn range_check_flags_uneven_branches() {
        let flat = array![[0.0, 0.0], [0.1, 0.1]];
        let steep = array![[0.0, 0.0], [5.0, 5.0]];
        let ok = array![[0.0, 0.0], [4.0, 4.0]];

        assert!(mean_ranges_ok(&[steep.clone(), ok], 800.0, 0.3));
        // 0.1 vs 5.0 dynamic range fails the relative criterion.
        assert!(!mean_ranges_ok(&[steep.clone(), flat], 800.0, 0.3));
        // Absolute ceiling.
        assert!(!mean_ranges_ok(&[steep], 1.0, 0.3));
        assert!(!mean_ranges_ok(&[], 800.0, 0.3));
    }
}
