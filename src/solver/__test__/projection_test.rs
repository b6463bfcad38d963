use crate::accel::{AccelGrid, Adjacency, AdjacencyParams};
use crate::basis::builder::{build_basis_set, BasisSet};
use crate::basis::domain::BoxDomain;
use crate::coeffs::{DecompressedBB, OnTheFlyBB};
use crate::config::BasisConfig;
use crate::solver::{apply, solve, Relaxation, SolverParams};
use approx::assert_abs_diff_eq;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn no_progress(_: usize, _: usize) {}

/// 위상 0 그룹만 활성으로 둔 기본 기저 집합
fn phase_zero_only() -> (BasisSet, Adjacency) {
    let cfg = BasisConfig::default();
    let domain = BoxDomain::new(cfg.domain_min(), cfg.domain_max());
    let mut set = build_basis_set(&cfg, &domain).unwrap();
    let keep = set.orthogonal_groups[0].clone();
    for i in 0..set.len() {
        set.set_active(i, keep.contains(&(i as u32)));
    }
    let grid = AccelGrid::from_bases(&set.bases, set.domain_min, set.domain_max, cfg.accel_res);
    let adjacency = Adjacency::build(&set.bases, &grid, &AdjacencyParams::default(), &no_progress);
    (set, adjacency)
}

fn random_coeffs(set: &BasisSet, seed: u64) -> Array1<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array1::<f32>::zeros(set.len());
    for &i in &set.orthogonal_groups[0] {
        x[i as usize] = rng.gen_range(-1.0..1.0);
    }
    x
}

fn round_trip_params(relaxation: Relaxation) -> SolverParams {
    SolverParams {
        max_iterations: 5000,
        tolerance: 1e-6,
        relaxation,
        ..Default::default()
    }
}

#[test]
fn test_bb_곱의_역산은_원래_계수를_복원() {
    let (set, adjacency) = phase_zero_only();
    assert_eq!(set.count_with(crate::basis::BasisFlags::INTERIOR_ACTIVE), 49);

    let table = DecompressedBB::compute(&set.bases, &adjacency, &no_progress);
    let params = round_trip_params(Relaxation::GaussSeidel);
    let expected = random_coeffs(&set, 7);
    let b = apply(&table, &set.bases, expected.view(), &params).unwrap();

    let mut x = Array1::<f32>::zeros(set.len());
    let report = solve(&table, &set.bases, &set.orthogonal_groups, b.view(), x.view_mut(), &params).unwrap();
    assert!(report.converged, "residual {}", report.residual);
    for (got, want) in x.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 5e-3);
    }
}

#[test]
fn test_즉석_계산_행렬로도_같은_해() {
    let (set, adjacency) = phase_zero_only();
    let live = OnTheFlyBB::new(&set.bases, &adjacency);
    let table = DecompressedBB::compute(&set.bases, &adjacency, &no_progress);
    let params = round_trip_params(Relaxation::GaussSeidel);
    let expected = random_coeffs(&set, 11);
    let b = apply(&table, &set.bases, expected.view(), &params).unwrap();

    let mut from_table = Array1::<f32>::zeros(set.len());
    let mut from_live = Array1::<f32>::zeros(set.len());
    solve(&table, &set.bases, &set.orthogonal_groups, b.view(), from_table.view_mut(), &params).unwrap();
    let report = solve(&live, &set.bases, &set.orthogonal_groups, b.view(), from_live.view_mut(), &params).unwrap();
    assert!(report.converged);
    for (a, b) in from_table.iter().zip(from_live.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 5e-3);
    }
}

#[test]
fn test_그룹_병렬_역산() {
    let (set, adjacency) = phase_zero_only();
    let table = DecompressedBB::compute(&set.bases, &adjacency, &no_progress);
    let params = round_trip_params(Relaxation::GroupParallel);
    let expected = random_coeffs(&set, 3);
    let b = apply(&table, &set.bases, expected.view(), &params).unwrap();

    let mut x = Array1::<f32>::zeros(set.len());
    let report = solve(&table, &set.bases, &set.orthogonal_groups, b.view(), x.view_mut(), &params).unwrap();
    assert!(report.converged, "residual {}", report.residual);
    for (got, want) in x.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 5e-3);
    }
    // 비활성 기저는 건드리지 않음
    for &i in &set.orthogonal_groups[1] {
        assert_eq!(x[i as usize], 0.0);
    }
}
