//! BB/T 계수 캐시 파일
//!
//! 실행 간 재계산을 피하기 위해 희소 행을 JSON으로 저장한다. 파일에는 종류, 기저 수,
//! 기저 집합 지문, 기저별 `(이웃, 값)` 행이 들어간다. `f32` 값은 최단 왕복 표현으로
//! 쓰이므로 읽으면 비트 단위로 같은 값이 된다.
//!
//! 읽을 때는 현재 기저 집합과의 호환성을 먼저 검증한다.
//!
//! - 종류와 기저 수
//! - 지문 (BB 허용치, 주파수 레벨, 기저 배치 해시)
//! - 행마다 이웃 인덱스가 현재 인접 리스트와 정확히 같은지
//!
//! 하나라도 다르면 `CacheMismatch`를 돌려준다.

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use glam::IVec2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::decompressed::{DecompressedBB, DecompressedT, SparseRow};
use crate::accel::Adjacency;
use crate::basis::BasisFlow;
use crate::error::{BasisError, Result};

const KIND_BB: &str = "bb";
const KIND_T: &str = "t";

/// 캐시를 만든 기저 집합과 파라미터의 지문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFingerprint {
    pub tolerance_bb: f64,
    pub freq_lvls: Vec<IVec2>,
    /// 기저 순서, 주파수 레벨, 중심 비트 패턴의 해시
    pub layout_hash: u64,
}

impl CacheFingerprint {
    pub fn new(bases: &[BasisFlow], freq_lvls: &[IVec2], tolerance_bb: f64) -> Self {
        let mut hasher = DefaultHasher::new();
        bases.len().hash(&mut hasher);
        for b in bases {
            b.freq_lvl.x.hash(&mut hasher);
            b.freq_lvl.y.hash(&mut hasher);
            b.center.x.to_bits().hash(&mut hasher);
            b.center.y.to_bits().hash(&mut hasher);
        }
        Self {
            tolerance_bb,
            freq_lvls: freq_lvls.to_vec(),
            layout_hash: hasher.finish(),
        }
    }

    /// 허용치는 JSON 왕복 오차를 감안해 상대 비교한다.
    fn matches(&self, other: &Self) -> bool {
        let scale = self.tolerance_bb.abs().max(other.tolerance_bb.abs());
        (self.tolerance_bb - other.tolerance_bb).abs() <= 1e-12 * scale
            && self.freq_lvls == other.freq_lvls
            && self.layout_hash == other.layout_hash
    }
}

#[derive(Debug, Deserialize)]
struct CoeffCacheFile<T> {
    kind: String,
    basis_count: usize,
    fingerprint: CacheFingerprint,
    rows: Vec<SparseRow<T>>,
}

#[derive(Serialize)]
struct CoeffCacheRef<'a, T> {
    kind: &'a str,
    basis_count: usize,
    fingerprint: &'a CacheFingerprint,
    rows: &'a [SparseRow<T>],
}

fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> BasisError {
    BasisError::CacheMismatch {
        expected: expected.into(),
        found: found.into(),
    }
}

fn write_cache<T: Serialize>(
    path: &Path,
    kind: &str,
    fingerprint: &CacheFingerprint,
    rows: &[SparseRow<T>],
) -> Result<()> {
    let file = CoeffCacheRef {
        kind,
        basis_count: rows.len(),
        fingerprint,
        rows,
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &file)?;
    writer.flush()?;
    Ok(())
}

/// 파일을 읽고 행 `i`의 이웃이 `lists[i]`와 정확히 같은지 검증한다.
/// `skip_self`이면 `lists[i]`에서 `i`를 빼고 비교하며, 행에 `i`가 있으면 거부한다.
fn read_cache<T: DeserializeOwned>(
    path: &Path,
    kind: &str,
    fingerprint: &CacheFingerprint,
    lists: &[Vec<u32>],
    skip_self: bool,
) -> Result<Vec<SparseRow<T>>> {
    let basis_count = lists.len();
    let reader = BufReader::new(File::open(path)?);
    let file: CoeffCacheFile<T> = serde_json::from_reader(reader)?;

    if file.kind != kind {
        return Err(mismatch(format!("kind {}", kind), format!("kind {}", file.kind)));
    }
    if file.basis_count != basis_count || file.rows.len() != basis_count {
        return Err(mismatch(
            format!("{} bases", basis_count),
            format!("{} bases, {} rows", file.basis_count, file.rows.len()),
        ));
    }
    if !file.fingerprint.matches(fingerprint) {
        return Err(mismatch(
            format!("{:?}", fingerprint),
            format!("{:?}", file.fingerprint),
        ));
    }
    for (i, (row, list)) in file.rows.iter().zip(lists).enumerate() {
        let me = i as u32;
        let stored = row.iter().map(|&(j, _)| j);
        if skip_self && stored.clone().any(|j| j == me) {
            return Err(mismatch("off-diagonal entries only", format!("row {} lists itself", i)));
        }
        let expected = list.iter().copied().filter(|&j| !(skip_self && j == me));
        if !stored.clone().eq(expected.clone()) {
            return Err(mismatch(
                format!("row {} neighbors {:?}", i, expected.collect::<Vec<_>>()),
                format!("{:?}", stored.collect::<Vec<_>>()),
            ));
        }
    }
    Ok(file.rows)
}

/// BB 테이블을 저장한다.
pub fn save_coeffs_bb(
    path: impl AsRef<Path>,
    table: &DecompressedBB,
    fingerprint: &CacheFingerprint,
) -> Result<()> {
    write_cache(path.as_ref(), KIND_BB, fingerprint, table.rows())
}

/// BB 테이블을 읽고 현재 기저 집합에 맞춰 조립한다.
///
/// 행 `i`는 유의미한 BB 이웃에서 자기 자신을 뺀 목록과 정확히 같아야 한다.
pub fn load_coeffs_bb(
    path: impl AsRef<Path>,
    bases: &[BasisFlow],
    adjacency: &Adjacency,
    fingerprint: &CacheFingerprint,
) -> Result<DecompressedBB> {
    if adjacency.len() != bases.len() {
        return Err(BasisError::DimensionMismatch {
            expected: bases.len(),
            got: adjacency.len(),
        });
    }
    let rows = read_cache::<f32>(path.as_ref(), KIND_BB, fingerprint, &adjacency.significant_bb, true)?;
    Ok(DecompressedBB::from_rows(bases, rows))
}

/// T 테이블을 저장한다.
pub fn save_coeffs_t(
    path: impl AsRef<Path>,
    table: &DecompressedT,
    fingerprint: &CacheFingerprint,
) -> Result<()> {
    write_cache(path.as_ref(), KIND_T, fingerprint, table.rows())
}

/// T 테이블을 읽는다. 행 `i`는 교차 리스트(자기 자신 포함)와 정확히 같아야 한다.
pub fn load_coeffs_t(
    path: impl AsRef<Path>,
    adjacency: &Adjacency,
    fingerprint: &CacheFingerprint,
) -> Result<DecompressedT> {
    let rows = read_cache::<[f32; 2]>(path.as_ref(), KIND_T, fingerprint, &adjacency.intersecting, false)?;
    Ok(DecompressedT::from_rows(rows))
}
