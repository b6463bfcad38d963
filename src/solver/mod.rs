//! # BB 행렬 역산 (희소 반복 솔버)
//!
//! 기저 계수로 표현된 힘/속도 `b`를 BB 계수 계로 풀어 `x`를 구한다.
//!
//! ```text
//! r_i = b_i - Σ_{j≠i} BB(i, j) x_j
//! x_i ← (1 - α) x_i + α r_i / BB(i, i)
//! ```
//!
//! 활성 마스크(플래그)와 최소 주파수를 만족하는 행만 풀고, 비대각 항도 그런 이웃만
//! 더한다. 저장은 `f32`, 누적은 `f64`이다. 반복 상한에 도달해도 에러가 아니며
//! `SolveReport`로 잔차와 함께 보고한다.

#[cfg(test)]
mod __test__;

use ndarray::{Array1, ArrayView1, ArrayViewMut1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::basis::{BasisFlags, BasisFlow};
use crate::coeffs::BBMatrix;
use crate::error::{BasisError, Result};

/// 한 스윕 안에서 행을 갱신하는 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Relaxation {
    /// 생성 순서대로 순차 갱신 (가우스-자이델)
    #[default]
    GaussSeidel,
    /// 직교 그룹을 순서대로, 그룹 안에서는 그룹 시작 시점 값으로 병렬 갱신
    GroupParallel,
}

/// 솔버 파라미터
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// 최대 스윕 횟수
    pub max_iterations: usize,
    /// 최대 노름 잔차 허용치
    pub tolerance: f64,
    /// 이완 계수 α
    pub alpha: f64,
    /// 이 플래그를 모두 가진 기저만 푼다
    pub required_flags: BasisFlags,
    /// `min(freq_lvl.x, freq_lvl.y)`가 이보다 작은 기저는 건너뛴다
    pub min_freq: i32,
    pub relaxation: Relaxation,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-5,
            alpha: 1.0,
            required_flags: BasisFlags::INTERIOR_ACTIVE,
            min_freq: 0,
            relaxation: Relaxation::GaussSeidel,
        }
    }
}

/// 풀이 결과
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// 참여 행에 대한 최대 노름 잔차
    pub residual: f64,
    pub converged: bool,
    /// 대각이 0이거나 유한하지 않아 건너뛴 행 수
    pub skipped_rows: usize,
}

/// 행 `i`가 이번 풀이에 참여하는지
#[inline]
pub fn participates(basis: &BasisFlow, params: &SolverParams) -> bool {
    basis.flags.contains_all(params.required_flags)
        && basis.freq_lvl.x.min(basis.freq_lvl.y) >= params.min_freq
}

fn participation_mask(bases: &[BasisFlow], params: &SolverParams) -> Vec<bool> {
    bases.iter().map(|b| participates(b, params)).collect()
}

/// 참여하는 이웃에 대해 `Σ_{j≠i} BB(i, j) x_j`
#[inline]
fn off_diagonal_sum<M: BBMatrix + ?Sized>(matrix: &M, i: usize, x: &[f32], mask: &[bool]) -> f64 {
    let mut acc = 0.0f64;
    matrix.for_each_off_diagonal(i, &mut |j, c| {
        if mask[j] {
            acc += c * x[j] as f64;
        }
    });
    acc
}

/// 행 하나를 이완한 새 값. 대각이 특이하면 `None`.
#[inline]
fn relax_row<M: BBMatrix + ?Sized>(
    matrix: &M,
    i: usize,
    b: &[f32],
    x: &[f32],
    mask: &[bool],
    alpha: f64,
) -> Option<f32> {
    let diag = matrix.diagonal(i);
    if diag == 0.0 || !diag.is_finite() {
        return None;
    }
    let residual = b[i] as f64 - off_diagonal_sum(matrix, i, x, mask);
    let updated = (1.0 - alpha) * x[i] as f64 + alpha * residual / diag;
    updated.is_finite().then_some(updated as f32)
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(BasisError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// 참여 행에 대해 `b = BB · x`를 계산한다. 참여하지 않는 행은 0.
pub fn apply<M: BBMatrix + ?Sized>(
    matrix: &M,
    bases: &[BasisFlow],
    x: ArrayView1<f32>,
    params: &SolverParams,
) -> Result<Array1<f32>> {
    let n = matrix.len();
    check_len(n, bases.len())?;
    check_len(n, x.len())?;
    let mask = participation_mask(bases, params);
    let x = x.to_vec();
    let out: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| {
            if !mask[i] {
                return 0.0;
            }
            (matrix.diagonal(i) * x[i] as f64 + off_diagonal_sum(matrix, i, &x, &mask)) as f32
        })
        .collect();
    Ok(Array1::from(out))
}

/// 참여 행에 대한 최대 노름 잔차 `max_i |b_i - (BB · x)_i|`
pub fn residual_norm<M: BBMatrix + ?Sized>(
    matrix: &M,
    bases: &[BasisFlow],
    b: ArrayView1<f32>,
    x: ArrayView1<f32>,
    params: &SolverParams,
) -> Result<f64> {
    let n = matrix.len();
    check_len(n, bases.len())?;
    check_len(n, b.len())?;
    check_len(n, x.len())?;
    let mask = participation_mask(bases, params);
    Ok(max_residual(matrix, &b.to_vec(), &x.to_vec(), &mask))
}

fn max_residual<M: BBMatrix + ?Sized>(matrix: &M, b: &[f32], x: &[f32], mask: &[bool]) -> f64 {
    (0..matrix.len())
        .into_par_iter()
        .filter(|&i| mask[i])
        .map(|i| {
            let ax = matrix.diagonal(i) * x[i] as f64 + off_diagonal_sum(matrix, i, x, mask);
            (b[i] as f64 - ax).abs()
        })
        .reduce(|| 0.0, f64::max)
}

/// BB 계를 반복 이완으로 푼다. `x`는 초기값이며 결과로 덮어쓴다.
///
/// `groups`는 `Relaxation::GroupParallel`에서만 쓰이며, 모든 기저를 정확히 한 번씩
/// 포함하는 직교 그룹 목록이어야 한다.
pub fn solve<M: BBMatrix + ?Sized>(
    matrix: &M,
    bases: &[BasisFlow],
    groups: &[Vec<u32>],
    b: ArrayView1<f32>,
    mut x: ArrayViewMut1<f32>,
    params: &SolverParams,
) -> Result<SolveReport> {
    let n = matrix.len();
    check_len(n, bases.len())?;
    check_len(n, b.len())?;
    check_len(n, x.len())?;

    let mask = participation_mask(bases, params);
    let b = b.to_vec();
    let mut xv = x.to_vec();

    let skipped_rows = (0..n)
        .filter(|&i| mask[i])
        .filter(|&i| {
            let d = matrix.diagonal(i);
            d == 0.0 || !d.is_finite()
        })
        .count();

    let mut report = SolveReport {
        iterations: 0,
        residual: max_residual(matrix, &b, &xv, &mask),
        converged: false,
        skipped_rows,
    };

    while report.residual > params.tolerance && report.iterations < params.max_iterations {
        match params.relaxation {
            Relaxation::GaussSeidel => {
                for i in 0..n {
                    if !mask[i] {
                        continue;
                    }
                    if let Some(v) = relax_row(matrix, i, &b, &xv, &mask, params.alpha) {
                        xv[i] = v;
                    }
                }
            }
            Relaxation::GroupParallel => {
                for group in groups {
                    let snapshot = xv.clone();
                    let updates: Vec<(usize, f32)> = group
                        .par_iter()
                        .map(|&i| i as usize)
                        .filter(|&i| mask[i])
                        .filter_map(|i| {
                            relax_row(matrix, i, &b, &snapshot, &mask, params.alpha).map(|v| (i, v))
                        })
                        .collect();
                    for (i, v) in updates {
                        xv[i] = v;
                    }
                }
            }
        }
        report.iterations += 1;
        report.residual = max_residual(matrix, &b, &xv, &mask);
    }
    report.converged = report.residual <= params.tolerance;

    for (dst, src) in x.iter_mut().zip(xv) {
        *dst = src;
    }

    log::debug!(
        "BB inversion: {} iterations, residual {:.3e}, converged {}",
        report.iterations,
        report.residual,
        report.converged
    );
    Ok(report)
}
