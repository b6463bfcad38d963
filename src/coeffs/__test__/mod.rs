//! 계수 계산, 희소 테이블, 캐시 테스트

pub mod cache_test;

use crate::accel::{AccelGrid, Adjacency, AdjacencyParams};
use crate::basis::builder::{build_basis_set, BasisSet};
use crate::basis::domain::BoxDomain;
use crate::config::BasisConfig;
use glam::DVec2;

pub(crate) fn no_progress(_: usize, _: usize) {}

/// `[-1, 1]²` 도메인에서 주어진 최대 주파수로 기저 집합과 인접 리스트를 만든다.
pub(crate) fn setup(max_freq_lvl: i32) -> (BasisSet, Adjacency) {
    setup_with_tolerance(max_freq_lvl, AdjacencyParams::default().tolerance_bb)
}

pub(crate) fn setup_with_tolerance(max_freq_lvl: i32, tolerance_bb: f64) -> (BasisSet, Adjacency) {
    let cfg = BasisConfig {
        max_freq_lvl,
        ..Default::default()
    };
    let domain = BoxDomain::new(cfg.domain_min(), cfg.domain_max());
    let set = build_basis_set(&cfg, &domain).unwrap();
    let grid = AccelGrid::from_bases(&set.bases, DVec2::splat(-1.0), DVec2::splat(1.0), cfg.accel_res);
    let params = AdjacencyParams {
        tolerance_bb,
        ..Default::default()
    };
    let adjacency = Adjacency::build(&set.bases, &grid, &params, &no_progress);
    (set, adjacency)
}
