//! # 시뮬레이션 컨텍스트
//!
//! 기저 집합, 가속 격자, 인접 리스트, 계수 테이블, 솔버 벡터를 한 구조체가 소유한다.
//! 호스트 시뮬레이션 루프는 매 스텝 `vec_b`를 채우고 `project`를 호출한 뒤
//! `vec_x`(또는 `velocity_at`)를 읽는다.

use std::path::Path;

use glam::DVec2;
use ndarray::{Array1, ArrayView1, ArrayViewMut1};

use crate::accel::{AccelGrid, Adjacency, AdjacencyParams};
use crate::basis::builder::{build_basis_set, BasisSet, FlagTransitions};
use crate::basis::domain::DomainOracle;
use crate::basis::{BasisFlow, BasisSupport};
use crate::coeffs::cache::{
    load_coeffs_bb, load_coeffs_t, save_coeffs_bb, save_coeffs_t, CacheFingerprint,
};
use crate::coeffs::{
    bb_coefficient, t_coefficient, BBMatrix, DecompressedBB, DecompressedT, OnTheFlyBB,
};
use crate::config::BasisConfig;
use crate::error::{BasisError, Result};
use crate::solver::{self, SolveReport, SolverParams};

/// 기저 흐름 엔진의 전체 상태
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub config: BasisConfig,
    pub basis_set: BasisSet,
    pub accel: AccelGrid,
    pub adjacency: Adjacency,
    coeffs_bb: Option<DecompressedBB>,
    coeffs_t: Option<DecompressedT>,
    max_half_size: DVec2,
    /// 풀이 결과 (기저 계수)
    pub vec_x: Array1<f32>,
    /// 오른쪽 항 (외부 힘을 기저 계수로 표현한 값)
    pub vec_b: Array1<f32>,
}

fn no_progress(_: usize, _: usize) {}

fn matrix_of<'a>(
    coeffs_bb: &'a Option<DecompressedBB>,
    bases: &'a [BasisFlow],
    adjacency: &'a Adjacency,
) -> Box<dyn BBMatrix + 'a> {
    match coeffs_bb {
        Some(table) => Box::new(table),
        None => Box::new(OnTheFlyBB::new(bases, adjacency)),
    }
}

impl FlowContext {
    /// 설정과 도메인 판정자로 전체 상태를 만든다.
    pub fn build(config: BasisConfig, oracle: &dyn DomainOracle) -> Result<Self> {
        Self::build_with_progress(config, oracle, &no_progress)
    }

    /// 진행 상황 콜백과 함께 만든다. 콜백은 `(처리한 기저 수, 전체)`를 받는다.
    pub fn build_with_progress<F>(config: BasisConfig, oracle: &dyn DomainOracle, progress: &F) -> Result<Self>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let mut ctx = Self::build_geometry(config, oracle, progress)?;
        if ctx.config.use_decompressed {
            ctx.coeffs_bb = Some(DecompressedBB::compute(&ctx.basis_set.bases, &ctx.adjacency, progress));
            ctx.coeffs_t = Some(DecompressedT::compute(&ctx.basis_set.bases, &ctx.adjacency, progress));
            ctx.log_table_stats();
        }
        log::info!("Basis setup done.");
        Ok(ctx)
    }

    /// 캐시 파일이 있으면 계수를 읽고, 없거나 호환되지 않으면 다시 계산해 저장한다.
    ///
    /// 캐시 문제는 모두 복구 가능하다. 읽기 실패는 재계산으로, 저장 실패는 경고만 남긴다.
    /// `use_decompressed`가 꺼져 있으면 캐시를 건드리지 않고 즉석 계산 경로로 만든다.
    pub fn build_cached<F>(
        config: BasisConfig,
        oracle: &dyn DomainOracle,
        bb_path: impl AsRef<Path>,
        t_path: impl AsRef<Path>,
        progress: &F,
    ) -> Result<Self>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        if !config.use_decompressed {
            log::info!("decompressed coefficients disabled, coefficient cache not used");
            return Self::build_with_progress(config, oracle, progress);
        }
        let (bb_path, t_path) = (bb_path.as_ref(), t_path.as_ref());
        let mut ctx = Self::build_geometry(config, oracle, progress)?;
        let fingerprint = ctx.cache_fingerprint();
        let bases = &ctx.basis_set.bases;
        let adjacency = &ctx.adjacency;

        let bb = load_or_compute(
            "BB",
            bb_path,
            || load_coeffs_bb(bb_path, bases, adjacency, &fingerprint),
            || DecompressedBB::compute(bases, adjacency, progress),
            |table| save_coeffs_bb(bb_path, table, &fingerprint),
        );
        let t = load_or_compute(
            "T",
            t_path,
            || load_coeffs_t(t_path, adjacency, &fingerprint),
            || DecompressedT::compute(bases, adjacency, progress),
            |table| save_coeffs_t(t_path, table, &fingerprint),
        );
        ctx.coeffs_bb = Some(bb);
        ctx.coeffs_t = Some(t);
        ctx.log_table_stats();
        Ok(ctx)
    }

    fn build_geometry<F>(config: BasisConfig, oracle: &dyn DomainOracle, progress: &F) -> Result<Self>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        config.validate()?;
        let basis_set = build_basis_set(&config, oracle)?;
        let bases = &basis_set.bases;
        let n = bases.len();

        let accel = AccelGrid::from_bases(bases, basis_set.domain_min, basis_set.domain_max, config.accel_res);
        let params = AdjacencyParams {
            tolerance_bb: config.tolerance_bb_coeff,
            density_multiplier: config.density_multiplier_half_size,
            transport_margin: config.transport_margin,
            progress_interval: config.progress_interval,
        };
        let adjacency = if config.use_accel_grid {
            Adjacency::build(bases, &accel, &params, progress)
        } else {
            Adjacency::build_all_pairs(bases, &params, progress)
        };
        log::info!(
            "Basis intersections done: {} bases, {:.1} significant neighbors on average",
            n,
            adjacency.mean_significant_len()
        );

        let max_half_size = bases
            .iter()
            .fold(DVec2::ZERO, |acc, b| acc.max(b.support_half_size()));

        Ok(Self {
            config,
            basis_set,
            accel,
            adjacency,
            coeffs_bb: None,
            coeffs_t: None,
            max_half_size,
            vec_x: Array1::zeros(n),
            vec_b: Array1::zeros(n),
        })
    }

    fn log_table_stats(&self) {
        if let Some(bb) = &self.coeffs_bb {
            let (min, max) = bb.row_len_range();
            log::info!(
                "decompressed BB: {} entries, row length {}..={}",
                bb.nnz(),
                min,
                max
            );
        }
    }

    pub fn len(&self) -> usize {
        self.basis_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis_set.is_empty()
    }

    pub fn bases(&self) -> &[BasisFlow] {
        &self.basis_set.bases
    }

    pub fn coeffs_bb(&self) -> Option<&DecompressedBB> {
        self.coeffs_bb.as_ref()
    }

    pub fn coeffs_t(&self) -> Option<&DecompressedT> {
        self.coeffs_t.as_ref()
    }

    /// 솔버가 사용할 BB 행렬 (미리 계산된 테이블이 없으면 즉석 계산)
    pub fn bb_matrix(&self) -> Box<dyn BBMatrix + '_> {
        matrix_of(&self.coeffs_bb, &self.basis_set.bases, &self.adjacency)
    }

    /// `BB(i, j)`. 유의미하지 않은 쌍은 0.
    pub fn bb(&self, i: usize, j: usize) -> f64 {
        self.bb_matrix().coefficient(i, j)
    }

    /// `T(i, j)`. 테이블이 없거나 저장되지 않은 쌍은 즉석 계산한다.
    pub fn t(&self, i: usize, j: usize) -> DVec2 {
        self.coeffs_t
            .as_ref()
            .and_then(|table| table.get(i, j))
            .unwrap_or_else(|| t_coefficient(&self.basis_set.bases[i], &self.basis_set.bases[j]))
    }

    /// 테이블을 거치지 않은 기준 BB 값
    pub fn bb_exact(&self, i: usize, j: usize) -> f64 {
        bb_coefficient(&self.basis_set.bases[i], &self.basis_set.bases[j])
    }

    /// 설정값으로 만든 기본 솔버 파라미터
    pub fn solver_params(&self) -> SolverParams {
        self.config.solver_params()
    }

    /// 임의의 `b`, `x`로 BB 계를 푼다.
    pub fn solve(&self, b: ArrayView1<f32>, x: ArrayViewMut1<f32>, params: &SolverParams) -> Result<SolveReport> {
        let matrix = self.bb_matrix();
        solver::solve(
            &*matrix,
            &self.basis_set.bases,
            &self.basis_set.orthogonal_groups,
            b,
            x,
            params,
        )
    }

    /// `vec_b`를 투영해 `vec_x`를 갱신한다.
    pub fn project(&mut self, params: &SolverParams) -> Result<SolveReport> {
        let matrix = matrix_of(&self.coeffs_bb, &self.basis_set.bases, &self.adjacency);
        solver::solve(
            &*matrix,
            &self.basis_set.bases,
            &self.basis_set.orthogonal_groups,
            self.vec_b.view(),
            self.vec_x.view_mut(),
            params,
        )
    }

    /// 외부 힘 벡터를 설정한다.
    pub fn set_forces(&mut self, b: ArrayView1<f32>) -> Result<()> {
        if b.len() != self.len() {
            return Err(BasisError::DimensionMismatch {
                expected: self.len(),
                got: b.len(),
            });
        }
        self.vec_b.assign(&b);
        Ok(())
    }

    /// `b = BB · x` (참여 행만)
    pub fn apply(&self, x: ArrayView1<f32>, params: &SolverParams) -> Result<Array1<f32>> {
        let matrix = self.bb_matrix();
        solver::apply(&*matrix, &self.basis_set.bases, x, params)
    }

    /// 현재 `vec_x`로 복원한 점 `p`의 속도
    pub fn velocity_at(&self, p: DVec2) -> DVec2 {
        let reach = BasisSupport::from_center(p, self.max_half_size);
        let bases = &self.basis_set.bases;
        self.accel
            .candidates(&reach)
            .map(|i| i as usize)
            .fold(DVec2::ZERO, |acc, i| acc + bases[i].eval(p) * self.vec_x[i] as f64)
    }

    /// 기저 `i`의 솔버 참여 여부를 바꾼다.
    pub fn set_active(&mut self, i: usize, active: bool) {
        self.basis_set.set_active(i, active);
    }

    /// 장애물 변화 후 내부 플래그를 갱신한다. 새로 꺼진 기저의 계수는 0으로 둔다.
    pub fn update_flags(&mut self, oracle: &dyn DomainOracle) -> FlagTransitions {
        let transitions = self.basis_set.update_flags(oracle);
        for &i in &transitions.deactivated {
            self.vec_x[i] = 0.0;
        }
        if !transitions.activated.is_empty() || !transitions.deactivated.is_empty() {
            log::debug!(
                "basis flags updated: {} activated, {} deactivated",
                transitions.activated.len(),
                transitions.deactivated.len()
            );
        }
        transitions
    }

    /// 현재 기저 집합과 BB 허용치로 만든 캐시 지문
    pub fn cache_fingerprint(&self) -> CacheFingerprint {
        CacheFingerprint::new(
            &self.basis_set.bases,
            &self.basis_set.freq_lvls,
            self.config.tolerance_bb_coeff,
        )
    }

    /// 계수 테이블을 캐시 파일로 저장한다. 미리 계산된 테이블이 없으면 에러.
    pub fn save_coeffs(&self, bb_path: impl AsRef<Path>, t_path: impl AsRef<Path>) -> Result<()> {
        let (bb, t) = match (&self.coeffs_bb, &self.coeffs_t) {
            (Some(bb), Some(t)) => (bb, t),
            _ => {
                return Err(BasisError::InvalidConfig(
                    "no decompressed coefficient tables to save (use_decompressed is off)".into(),
                ))
            }
        };
        let fingerprint = self.cache_fingerprint();
        save_coeffs_bb(bb_path, bb, &fingerprint)?;
        save_coeffs_t(t_path, t, &fingerprint)
    }
}

/// 캐시에서 읽거나, 실패하면 계산한 뒤 저장을 시도한다.
fn load_or_compute<T>(
    what: &str,
    path: &Path,
    load: impl FnOnce() -> Result<T>,
    compute: impl FnOnce() -> T,
    save: impl FnOnce(&T) -> Result<()>,
) -> T {
    match load() {
        Ok(table) => {
            log::info!("loaded {} coefficients from {}", what, path.display());
            table
        }
        Err(err) => {
            log::warn!("{} cache {} unusable ({}), recomputing", what, path.display(), err);
            let table = compute();
            if let Err(err) = save(&table) {
                log::warn!("could not write {} cache {}: {}", what, path.display(), err);
            }
            table
        }
    }
}
