//! The differentiation tree and everything derived from it.
//!
//! A tree is a set of branches (linear differentiation segments) connected by
//! parent→child edges. Each branch has a pseudotime length and a module
//! count. From these the constructor derives:
//!
//! - **branch spans**: the absolute pseudotime interval each branch occupies
//!   (a root starts at 0, a child starts where its parent ends),
//! - **timezones**: the partition of absolute pseudotime into intervals
//!   between consecutive branch-point boundaries,
//! - **candidate branches per timezone**: the branches a cell observed in
//!   that timezone may belong to,
//! - an **edge order** that always visits a parent before its grandchildren,
//!   which the continuity adjustment in [`crate::branching`] relies on.
//!
//! All validation happens in [`Topology::new`]; afterwards the value is
//! read-only and lookups cannot fail except for pseudotimes outside the tree.
//!
//! Interval convention: spans and timezones are inclusive `(start, end)`
//! pairs, and [`Topology::locate`] scans timezones in order — so a pseudotime
//! sitting exactly on a branch-point boundary belongs to the *earlier*
//! timezone (and, downstream, to the parent branch's final row).

use crate::{Error, Result};
use rand::Rng;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Topology {
    time: Vec<usize>,
    modules: Vec<usize>,
    edges: Vec<(usize, usize)>,
    ordered_edges: Vec<(usize, usize)>,
    spans: Vec<(usize, usize)>,
    zones: Vec<(usize, usize)>,
    zone_branches: Vec<Vec<usize>>,
}

impl Topology {
    /// Build and validate a tree.
    ///
    /// - `time[i]`: pseudotime length of branch `i` (must be >= 2),
    /// - `modules[i]`: expression-module count of branch `i` (must be >= 1),
    /// - `edges`: `(parent, child)` branch-index pairs, in any order.
    pub fn new(
        time: Vec<usize>,
        modules: Vec<usize>,
        edges: Vec<(usize, usize)>,
    ) -> Result<Self> {
        let branches = time.len();
        if branches == 0 {
            return Err(Error::Config("a tree needs at least one branch".into()));
        }
        if modules.len() != branches {
            return Err(Error::Config(format!(
                "{} module counts do not cover {} branches",
                modules.len(),
                branches
            )));
        }
        if let Some(i) = time.iter().position(|&t| t < 2) {
            return Err(Error::Config(format!(
                "branch {i} has pseudotime length {} (need >= 2)",
                time[i]
            )));
        }
        if let Some(i) = modules.iter().position(|&k| k == 0) {
            return Err(Error::Config(format!("branch {i} has zero modules")));
        }

        let mut parent_of: Vec<Option<usize>> = vec![None; branches];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); branches];
        for &(parent, child) in &edges {
            if parent >= branches || child >= branches {
                return Err(Error::Config(format!(
                    "edge ({parent}, {child}) references a branch outside 0..{branches}"
                )));
            }
            if parent == child {
                return Err(Error::Config(format!("branch {parent} cannot parent itself")));
            }
            if parent_of[child].is_some() {
                return Err(Error::Config(format!("branch {child} has two parents")));
            }
            parent_of[child] = Some(parent);
            children[parent].push(child);
        }

        // Walk from the roots; anything left unvisited sits on a cycle.
        let mut spans = vec![(0usize, 0usize); branches];
        let mut ordered_edges = Vec::with_capacity(edges.len());
        let mut queue: VecDeque<usize> = (0..branches).filter(|&b| parent_of[b].is_none()).collect();
        let mut visited = 0usize;
        while let Some(b) = queue.pop_front() {
            let start = match parent_of[b] {
                Some(p) => spans[p].1,
                None => 0,
            };
            spans[b] = (start, start + time[b]);
            visited += 1;
            for &c in &children[b] {
                ordered_edges.push((b, c));
                queue.push_back(c);
            }
        }
        if visited != branches {
            return Err(Error::Config(
                "topology contains a cycle: some branches are unreachable from a root".into(),
            ));
        }

        // Timezone boundaries are the branch ends (plus the origin).
        let mut boundaries: Vec<usize> = spans.iter().map(|&(_, end)| end).collect();
        boundaries.push(0);
        boundaries.sort_unstable();
        boundaries.dedup();

        let zones: Vec<(usize, usize)> = boundaries.windows(2).map(|w| (w[0], w[1])).collect();
        let zone_branches: Vec<Vec<usize>> = zones
            .iter()
            .map(|&(zs, ze)| {
                (0..branches)
                    .filter(|&b| spans[b].0 <= zs && ze <= spans[b].1)
                    .collect::<Vec<usize>>()
            })
            .collect();
        if let Some(z) = zone_branches.iter().position(|zb| zb.is_empty()) {
            return Err(Error::Config(format!(
                "timezone {:?} is not covered by any branch",
                zones[z]
            )));
        }

        Ok(Self {
            time,
            modules,
            edges,
            ordered_edges,
            spans,
            zones,
            zone_branches,
        })
    }

    /// Number of branches.
    pub fn branches(&self) -> usize {
        self.time.len()
    }

    /// Per-branch pseudotime lengths.
    pub fn time(&self) -> &[usize] {
        &self.time
    }

    /// Per-branch module counts.
    pub fn modules(&self) -> &[usize] {
        &self.modules
    }

    /// The edges as supplied by the caller.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// The edges reordered so every parent precedes its grandchildren.
    pub fn ordered_edges(&self) -> &[(usize, usize)] {
        &self.ordered_edges
    }

    /// Absolute `(start, end)` pseudotime span per branch.
    pub fn spans(&self) -> &[(usize, usize)] {
        &self.spans
    }

    /// The timezone partition of absolute pseudotime.
    pub fn timezones(&self) -> &[(usize, usize)] {
        &self.zones
    }

    /// Candidate branches per timezone, index-aligned with
    /// [`Self::timezones`].
    pub fn zone_branches(&self) -> &[Vec<usize>] {
        &self.zone_branches
    }

    /// Total pseudotime covered by the tree.
    pub fn total_time(&self) -> usize {
        self.spans.iter().map(|&(_, end)| end).max().unwrap_or(0)
    }

    /// Timezone containing pseudotime `t`, or `None` outside the tree.
    /// Boundary pseudotimes resolve to the earlier timezone.
    pub fn locate(&self, t: usize) -> Option<usize> {
        self.zones.iter().position(|&(s, e)| s <= t && t <= e)
    }

    /// Pick a branch for pseudotime `t`, uniformly among the candidates of
    /// its timezone. A pseudotime no timezone contains is a configuration
    /// error — the tree simply does not extend there.
    pub fn pick_branch(&self, t: usize, rng: &mut impl Rng) -> Result<usize> {
        let z = self.locate(t).ok_or_else(|| {
            Error::Config(format!(
                "pseudotime {t} lies outside every timezone (total time {})",
                self.total_time()
            ))
        })?;
        let candidates = &self.zone_branches[z];
        Ok(candidates[rng.random_range(0..candidates.len())])
    }
}
