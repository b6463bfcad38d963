//! # 교차 및 가속 인덱스
//!
//! 기저마다 세 종류의 인접 리스트를 만든다.
//!
//! - `intersecting`: 지지 영역 내부가 겹치는 모든 기저
//! - `significant_bb`: 그중 `|BB| >= tolerance`인 기저
//! - `transport`: 같은 주파수 레벨이고 중심 차이가 반 크기 × 배율 × 여유 이내인 기저
//!
//! 모든 리스트는 자기 자신을 정확히 한 번 포함하고 인덱스 오름차순이다.
//! 기저마다 자기 리스트만 채우므로 rayon 병렬 반복에서 쓰기 경합이 없다.

pub mod grid;

#[cfg(test)]
mod __test__;

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec2;
use rayon::prelude::*;

use crate::basis::{BasisFlow, BasisSupport};
use crate::coeffs::bb_coefficient;
pub use grid::AccelGrid;

/// 인접 리스트 계산 파라미터
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjacencyParams {
    pub tolerance_bb: f64,
    pub density_multiplier: f64,
    pub transport_margin: f64,
    pub progress_interval: usize,
}

impl Default for AdjacencyParams {
    fn default() -> Self {
        Self {
            tolerance_bb: 1e-5,
            density_multiplier: 1.0,
            transport_margin: 1.01,
            progress_interval: 1000,
        }
    }
}

/// 기저별 인접 리스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    pub intersecting: Vec<Vec<u32>>,
    pub significant_bb: Vec<Vec<u32>>,
    pub transport: Vec<Vec<u32>>,
    pub progress_interval: usize,
}

/// 두 기저의 지지 영역 내부가 겹치는지
#[inline]
pub fn intersects(a: &BasisSupport, b: &BasisSupport) -> bool {
    a.intersects(b)
}

/// `b`가 `a` 기준으로 수송 인접인지 (같은 주파수, 축별 중심 차이 제한)
#[inline]
pub fn is_transport_neighbor(a: &BasisFlow, b: &BasisFlow, params: &AdjacencyParams) -> bool {
    if a.freq_lvl != b.freq_lvl {
        return false;
    }
    let limits = a.support_half_size() * params.density_multiplier * params.transport_margin;
    let d = (b.center - a.center).abs();
    d.x <= limits.x && d.y <= limits.y
}

impl Adjacency {
    /// 가속 격자로 후보를 줄여 인접 리스트를 만든다.
    pub fn build<F>(bases: &[BasisFlow], grid: &AccelGrid, params: &AdjacencyParams, progress: &F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let max_half = bases
            .iter()
            .fold(DVec2::ZERO, |acc, b| acc.max(b.support_half_size()));
        Self::build_with(bases, params, progress, |i, support, out| {
            let reach = BasisSupport::from_center(
                bases[i].center,
                support.size() * 0.5 + max_half,
            );
            out.extend(grid.candidates(&reach));
        })
    }

    /// 전체 쌍을 검사하는 기준 구현
    pub fn build_all_pairs<F>(bases: &[BasisFlow], params: &AdjacencyParams, progress: &F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let n = bases.len() as u32;
        Self::build_with(bases, params, progress, |_, _, out| out.extend(0..n))
    }

    fn build_with<F, C>(bases: &[BasisFlow], params: &AdjacencyParams, progress: &F, candidates: C) -> Self
    where
        F: Fn(usize, usize) + Send + Sync,
        C: Fn(usize, &BasisSupport, &mut Vec<u32>) + Send + Sync,
    {
        let n = bases.len();
        let supports: Vec<BasisSupport> = bases.iter().map(BasisFlow::support).collect();
        let interval = params.progress_interval.max(1);
        let done = AtomicUsize::new(0);

        let lists: Vec<(Vec<u32>, Vec<u32>, Vec<u32>)> = (0..n)
            .into_par_iter()
            .map_init(Vec::new, |scratch, i| {
                let bi = &bases[i];
                let si = &supports[i];

                scratch.clear();
                candidates(i, si, scratch);
                scratch.sort_unstable();
                scratch.dedup();

                let mut intersecting = Vec::new();
                let mut significant = Vec::new();
                let mut transport = Vec::new();
                for &j in scratch.iter() {
                    let ju = j as usize;
                    if ju == i {
                        // 자기 자신은 항상 포함
                        intersecting.push(j);
                        significant.push(j);
                        transport.push(j);
                        continue;
                    }
                    if !intersects(si, &supports[ju]) {
                        continue;
                    }
                    intersecting.push(j);
                    let bj = &bases[ju];
                    if bb_coefficient(bi, bj).abs() >= params.tolerance_bb {
                        significant.push(j);
                    }
                    if is_transport_neighbor(bi, bj, params) {
                        transport.push(j);
                    }
                }

                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                if count % interval == 0 {
                    log::info!("Basis intersection: {}/{}", count, n);
                    progress(count, n);
                }
                (intersecting, significant, transport)
            })
            .collect();

        let mut adjacency = Adjacency {
            intersecting: Vec::with_capacity(n),
            significant_bb: Vec::with_capacity(n),
            transport: Vec::with_capacity(n),
            progress_interval: interval,
        };
        for (intersecting, significant, transport) in lists {
            adjacency.intersecting.push(intersecting);
            adjacency.significant_bb.push(significant);
            adjacency.transport.push(transport);
        }
        adjacency
    }

    pub fn len(&self) -> usize {
        self.intersecting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersecting.is_empty()
    }

    /// 평균 유의미 BB 이웃 수 (자기 자신 포함)
    pub fn mean_significant_len(&self) -> f64 {
        if self.significant_bb.is_empty() {
            return 0.0;
        }
        let total: usize = self.significant_bb.iter().map(Vec::len).sum();
        total as f64 / self.significant_bb.len() as f64
    }
}
