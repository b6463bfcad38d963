//! 미리 풀어 둔 (decompressed) 희소 계수 테이블
//!
//! 기저마다 인접 기저와의 계수를 `(j, 값)` 행으로 한 번 계산해 두고 매 스텝 재사용한다.
//! 값은 `f32`로 저장하고 솔버가 `f64`로 누적한다.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{DVec2, IVec2};
use rayon::prelude::*;

use super::{bb_coefficient, t_coefficient, BBMatrix};
use crate::accel::Adjacency;
use crate::basis::BasisFlow;

/// 명시적 에너지 전달에 쓰는 상대 주파수 방향
pub const EXPLICIT_TRANSFER_FREQS: [IVec2; 6] = [
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, -1),
    IVec2::new(-1, -1),
];

pub const NB_EXPLICIT_TRANSFER_FREQS: usize = EXPLICIT_TRANSFER_FREQS.len();

/// 희소 행 하나: `(이웃 인덱스, 계수)`
pub type SparseRow<T> = Vec<(u32, T)>;

/// 주파수 방향별 변형 리스트와 전달률 추정치
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplicitTransfer {
    /// `deformation[d][i]`: 기저 `i`에서 방향 `d`에 있는 BB 이웃
    pub deformation: Vec<Vec<SparseRow<f32>>>,
    /// 방향별 `Σ|c|`
    pub sum_abs: Vec<[f32; NB_EXPLICIT_TRANSFER_FREQS]>,
    /// 방향별 `√Σc²`
    pub sum_sqr: Vec<[f32; NB_EXPLICIT_TRANSFER_FREQS]>,
}

impl ExplicitTransfer {
    /// BB 행으로부터 방향별 리스트와 합계를 만든다.
    pub fn from_rows(bases: &[BasisFlow], rows: &[SparseRow<f32>]) -> Self {
        let n = bases.len();
        let per_basis: Vec<_> = rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| {
                let freq_i = bases[i].freq_lvl;
                let mut lists: [SparseRow<f32>; NB_EXPLICIT_TRANSFER_FREQS] = Default::default();
                let mut abs = [0.0f32; NB_EXPLICIT_TRANSFER_FREQS];
                let mut sqr = [0.0f32; NB_EXPLICIT_TRANSFER_FREQS];
                for &(j, coeff) in row {
                    let rel = bases[j as usize].freq_lvl - freq_i;
                    if let Some(d) = EXPLICIT_TRANSFER_FREQS.iter().position(|&f| f == rel) {
                        abs[d] += coeff.abs();
                        sqr[d] += coeff * coeff;
                        lists[d].push((j, coeff));
                    }
                }
                (lists, abs, sqr.map(f32::sqrt))
            })
            .collect();

        let mut deformation = vec![Vec::with_capacity(n); NB_EXPLICIT_TRANSFER_FREQS];
        let mut sum_abs = Vec::with_capacity(n);
        let mut sum_sqr = Vec::with_capacity(n);
        for (lists, abs, sqr) in per_basis {
            for (d, list) in lists.into_iter().enumerate() {
                deformation[d].push(list);
            }
            sum_abs.push(abs);
            sum_sqr.push(sqr);
        }
        Self {
            deformation,
            sum_abs,
            sum_sqr,
        }
    }
}

/// 미리 계산된 BB 행렬
#[derive(Debug, Clone, PartialEq)]
pub struct DecompressedBB {
    rows: Vec<SparseRow<f32>>,
    diagonal: Vec<f32>,
    pub transfer: ExplicitTransfer,
}

impl DecompressedBB {
    /// 유의미한 BB 인접 리스트를 따라 모든 행을 계산한다. 자기 자신은 대각으로 따로 둔다.
    pub fn compute<F>(bases: &[BasisFlow], adjacency: &Adjacency, progress: &F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        log::info!("computing decompressed coefficients BB...");
        let n = bases.len();
        let interval = adjacency.progress_interval.max(1);
        let done = AtomicUsize::new(0);
        let rows: Vec<SparseRow<f32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let bi = &bases[i];
                let row = adjacency.significant_bb[i]
                    .iter()
                    .filter(|&&j| j as usize != i)
                    .map(|&j| (j, bb_coefficient(bi, &bases[j as usize]) as f32))
                    .collect();
                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                if count % interval == 0 {
                    log::info!("Decompressed BB : {} / {}", count, n);
                    progress(count, n);
                }
                row
            })
            .collect();
        Self::from_rows(bases, rows)
    }

    /// 이미 계산된 행(예: 캐시)에서 테이블을 조립한다.
    pub fn from_rows(bases: &[BasisFlow], rows: Vec<SparseRow<f32>>) -> Self {
        let diagonal = bases.iter().map(|b| b.norm_squared as f32).collect();
        let transfer = ExplicitTransfer::from_rows(bases, &rows);
        Self {
            rows,
            diagonal,
            transfer,
        }
    }

    pub fn rows(&self) -> &[SparseRow<f32>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &[(u32, f32)] {
        &self.rows[i]
    }

    /// 저장된 원소 수 (대각 제외)
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// 행 길이의 (최소, 최대)
    pub fn row_len_range(&self) -> (usize, usize) {
        let min = self.rows.iter().map(Vec::len).min().unwrap_or(0);
        let max = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (min, max)
    }
}

impl BBMatrix for DecompressedBB {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.diagonal[i] as f64
    }

    fn for_each_off_diagonal(&self, i: usize, f: &mut dyn FnMut(usize, f64)) {
        for &(j, c) in &self.rows[i] {
            f(j as usize, c as f64);
        }
    }

    fn coefficient(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.diagonal(i);
        }
        let row = &self.rows[i];
        match row.binary_search_by_key(&(j as u32), |&(k, _)| k) {
            Ok(pos) => row[pos].1 as f64,
            Err(_) => 0.0,
        }
    }
}

/// 미리 계산된 T 계수 테이블
#[derive(Debug, Clone, PartialEq)]
pub struct DecompressedT {
    rows: Vec<SparseRow<[f32; 2]>>,
}

impl DecompressedT {
    /// 교차하는 모든 기저(자기 자신 포함)에 대해 `T(i, j)`를 계산한다.
    pub fn compute<F>(bases: &[BasisFlow], adjacency: &Adjacency, progress: &F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        log::info!("computing decompressed coefficients T...");
        let n = bases.len();
        let interval = adjacency.progress_interval.max(1);
        let done = AtomicUsize::new(0);
        let rows = (0..n)
            .into_par_iter()
            .map(|i| {
                let bi = &bases[i];
                let row = adjacency.intersecting[i]
                    .iter()
                    .map(|&j| {
                        let t = t_coefficient(bi, &bases[j as usize]);
                        (j, [t.x as f32, t.y as f32])
                    })
                    .collect();
                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                if count % interval == 0 {
                    log::info!("decompressed T : {} / {}", count, n);
                    progress(count, n);
                }
                row
            })
            .collect();
        Self { rows }
    }

    pub fn from_rows(rows: Vec<SparseRow<[f32; 2]>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SparseRow<[f32; 2]>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `T(transported = i, transporting = j)`. 교차하지 않으면 `None`.
    pub fn get(&self, i: usize, j: usize) -> Option<DVec2> {
        let row = &self.rows[i];
        row.binary_search_by_key(&(j as u32), |&(k, _)| k)
            .ok()
            .map(|pos| {
                let [x, y] = row[pos].1;
                DVec2::new(x as f64, y as f64)
            })
    }

    /// 기저 계수 `x`로 가중한 평균 변위 `Σ_j T(i, j) x_j`
    pub fn transport_velocity(&self, i: usize, x: &[f32]) -> DVec2 {
        self.rows[i]
            .iter()
            .fold(DVec2::ZERO, |acc, &(j, [tx, ty])| {
                acc + DVec2::new(tx as f64, ty as f64) * x[j as usize] as f64
            })
    }
}
