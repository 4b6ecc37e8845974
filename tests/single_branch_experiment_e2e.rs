use lineagesim::branching::{simulate_lineage, LineageConfig};
use lineagesim::negbin::NoiseModel;
use lineagesim::sampling::{
    sample_absolute_experiment, sample_window_experiment, AbsoluteSampling, WindowSampling,
};
use lineagesim::topology::Topology;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn single_gene_single_branch_time_window_experiment() {
    // One gene, one branch of 50 pseudotime steps, 3 modules; everything
    // sampled around t=25 with zero spread so the labels are exact.
    let tree = Topology::new(vec![50], vec![3], vec![]).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let lineage = simulate_lineage(1, &tree, &LineageConfig::default(), &mut rng).unwrap();

    let mut cfg = WindowSampling::new(100, vec![25]);
    cfg.synchrony = 0.0;
    let exp = sample_window_experiment(
        &tree,
        &lineage.means,
        &cfg,
        &NoiseModel::default(),
        &mut rng,
    )
    .unwrap();

    let cells = exp.counts.nrows();
    assert_eq!(exp.counts.ncols(), 1);
    assert_eq!(exp.pseudotime.len(), cells);
    assert_eq!(exp.branch.len(), cells);
    // Counts per time point jitter around the target with sd sqrt(10).
    assert!(
        (cells as i64 - 100).abs() < 30,
        "cell count {cells} too far from the target"
    );
    assert!(exp.pseudotime.iter().all(|&t| t == 25));
    assert!(exp.branch.iter().all(|&b| b == 0));
}

#[test]
fn absolute_grid_labels_every_cell_with_its_sample_time() {
    let tree = Topology::new(vec![10, 10], vec![2, 2], vec![(0, 1)]).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let lineage = simulate_lineage(5, &tree, &LineageConfig::default(), &mut rng).unwrap();

    let cfg = AbsoluteSampling {
        repeats: 3,
        sample_times: (0..20).collect(),
    };
    let exp = sample_absolute_experiment(
        &tree,
        &lineage.means,
        &cfg,
        &NoiseModel::default(),
        &mut rng,
    )
    .unwrap();

    assert_eq!(exp.counts.shape(), &[60, 5]);
    let spans = tree.spans();
    for (cell, (&t, &b)) in exp.pseudotime.iter().zip(exp.branch.iter()).enumerate() {
        assert_eq!(t, cfg.sample_times[cell / cfg.repeats]);
        // The assigned branch must actually cover the pseudotime (the
        // boundary row overrun is allowed by one step).
        assert!(
            spans[b].0 <= t && t <= spans[b].1,
            "cell {cell}: branch {b} does not cover t={t}"
        );
    }
}

#[test]
fn window_sampling_spreads_cells_across_branches() {
    let tree = Topology::new(
        vec![10, 10, 10],
        vec![2, 2, 2],
        vec![(0, 1), (0, 2)],
    )
    .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(55);
    let lineage = simulate_lineage(8, &tree, &LineageConfig::default(), &mut rng).unwrap();

    let cfg = WindowSampling::new(300, vec![5, 15]);
    let exp = sample_window_experiment(
        &tree,
        &lineage.means,
        &cfg,
        &NoiseModel::default(),
        &mut rng,
    )
    .unwrap();

    assert!(exp.counts.nrows() > 0);
    assert!(exp.pseudotime.iter().all(|&t| t < tree.total_time()));
    // Cells sampled around t=15 split uniformly between the sibling
    // branches; with ~150 draws both must show up.
    let late_branches: Vec<usize> = exp
        .pseudotime
        .iter()
        .zip(exp.branch.iter())
        .filter(|&(&t, _)| t > 10)
        .map(|(_, &b)| b)
        .collect();
    assert!(late_branches.contains(&1));
    assert!(late_branches.contains(&2));
    assert!(late_branches.iter().all(|&b| b != 0));
}
