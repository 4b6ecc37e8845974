//! Gene-to-module assignment and Beta-weighted membership matrices.
//!
//! Which genes a module influences is decided by a randomized double
//! partition: all gene indices are partitioned into K near-equal random
//! groups twice, independently, and the two partitions are unioned per
//! module. On average every gene ends up in two modules; landing in the same
//! module twice is tolerated (its weight accumulates).

use crate::{Error, Result};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Beta, Distribution};

/// Partition a permuted index list into `k` groups, each index placed into a
/// uniformly random group. Group sizes are near-equal in expectation only.
fn random_partition(k: usize, order: &[usize], rng: &mut impl Rng) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); k];
    for &g in order {
        groups[rng.random_range(0..k)].push(g);
    }
    groups
}

/// Assign `genes` gene indices to `k` modules via two independent randomized
/// equipartitions, unioned per module.
///
/// Every gene index appears exactly twice across the returned lists (possibly
/// twice in the same list).
pub fn assign_gene_modules(
    k: usize,
    genes: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Vec<usize>>> {
    if k == 0 {
        return Err(Error::Domain("module count must be >= 1"));
    }
    if genes == 0 {
        return Err(Error::Domain("gene count must be >= 1"));
    }

    let mut order: Vec<usize> = (0..genes).collect();
    order.shuffle(rng);
    let first = random_partition(k, &order, rng);

    // A fresh permutation for the second round keeps the two partitions from
    // tracking each other.
    order.shuffle(rng);
    let second = random_partition(k, &order, rng);

    Ok(first
        .into_iter()
        .zip(second)
        .map(|(mut a, b)| {
            a.extend(b);
            a
        })
        .collect())
}

/// Build the K×G membership matrix H for a gene-to-module assignment.
///
/// For every gene `g` listed under module `m`, one `Beta(shape_a, shape_b)`
/// draw is added to `H[m][g]`; everything else stays zero. A gene listed
/// twice under the same module accumulates two draws.
pub fn membership_matrix(
    genes: usize,
    groups: &[Vec<usize>],
    shape_a: f64,
    shape_b: f64,
    rng: &mut impl Rng,
) -> Result<Array2<f64>> {
    if groups.is_empty() {
        return Err(Error::Domain("module count must be >= 1"));
    }
    if genes == 0 {
        return Err(Error::Domain("gene count must be >= 1"));
    }
    let weight = Beta::new(shape_a, shape_b)
        .map_err(|_| Error::Domain("Beta shape parameters must be positive and finite"))?;

    let mut h = Array2::<f64>::zeros((groups.len(), genes));
    for (m, members) in groups.iter().enumerate() {
        for &g in members {
            if g >= genes {
                return Err(Error::Shape("gene index out of range for membership matrix"));
            }
            h[[m, g]] += weight.sample(rng);
        }
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn membership_is_nonzero_exactly_where_listed() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let k = 4;
        let genes = 50;
        let groups = assign_gene_modules(k, genes, &mut rng).unwrap();
        let h = membership_matrix(genes, &groups, 2.0, 2.0, &mut rng).unwrap();

        assert_eq!(h.shape(), &[k, genes]);
        assert!(h.iter().all(|&v| v >= 0.0));

        for (m, members) in groups.iter().enumerate() {
            for g in 0..genes {
                let listed = members.contains(&g);
                let nonzero = h[[m, g]] > 0.0;
                assert_eq!(
                    listed, nonzero,
                    "module {m}, gene {g}: listed={listed} but H={}",
                    h[[m, g]]
                );
            }
        }
    }

    #[test]
    fn invalid_beta_shapes_are_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let groups = assign_gene_modules(2, 10, &mut rng).unwrap();
        assert!(membership_matrix(10, &groups, 0.0, 2.0, &mut rng).is_err());
        assert!(membership_matrix(10, &groups, 2.0, -1.0, &mut rng).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_every_gene_is_listed_exactly_twice(
            k in 1usize..12,
            genes in 1usize..200,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let groups = assign_gene_modules(k, genes, &mut rng).unwrap();
            prop_assert_eq!(groups.len(), k);

            let mut seen = vec![0usize; genes];
            for members in &groups {
                for &g in members {
                    prop_assert!(g < genes, "gene index {g} out of range");
                    seen[g] += 1;
                }
            }
            prop_assert!(seen.iter().all(|&c| c == 2), "double partition must list every gene twice");
        }
    }
}
