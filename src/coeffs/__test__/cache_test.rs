use super::{no_progress, setup, setup_with_tolerance};
use crate::accel::Adjacency;
use crate::basis::builder::BasisSet;
use crate::basis::BasisFlow;
use crate::coeffs::cache::{
    load_coeffs_bb, load_coeffs_t, save_coeffs_bb, save_coeffs_t, CacheFingerprint,
};
use crate::coeffs::{DecompressedBB, DecompressedT};
use crate::error::BasisError;
use glam::{DVec2, IVec2};
use serde_json::json;

fn fingerprint(set: &BasisSet, tolerance_bb: f64) -> CacheFingerprint {
    CacheFingerprint::new(&set.bases, &set.freq_lvls, tolerance_bb)
}

/// 서로 겹치는 두 기저와 그 인접 리스트
fn two_bases() -> (Vec<BasisFlow>, Adjacency, CacheFingerprint) {
    let bases = vec![
        BasisFlow::new(IVec2::new(1, 1), DVec2::ZERO, 1.0),
        BasisFlow::new(IVec2::new(1, 1), DVec2::new(0.125, 0.0), 1.0),
    ];
    let adjacency = Adjacency {
        intersecting: vec![vec![0, 1], vec![0, 1]],
        significant_bb: vec![vec![0, 1], vec![0, 1]],
        transport: vec![vec![0, 1], vec![0, 1]],
        progress_interval: 1000,
    };
    let fp = CacheFingerprint::new(&bases, &[IVec2::new(1, 1)], 1e-5);
    (bases, adjacency, fp)
}

fn write_json(path: &std::path::Path, kind: &str, fp: &CacheFingerprint, rows: serde_json::Value) {
    let value = json!({
        "kind": kind,
        "basis_count": rows.as_array().map_or(0, |r| r.len()),
        "fingerprint": serde_json::to_value(fp).unwrap(),
        "rows": rows,
    });
    std::fs::write(path, value.to_string()).unwrap();
}

#[test]
fn test_bb_캐시_왕복() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs_bb.json");
    let (set, adjacency) = setup(1);
    let fp = fingerprint(&set, 1e-5);
    let table = DecompressedBB::compute(&set.bases, &adjacency, &no_progress);

    save_coeffs_bb(&path, &table, &fp).unwrap();
    let loaded = load_coeffs_bb(&path, &set.bases, &adjacency, &fp).unwrap();
    assert_eq!(loaded, table);
}

#[test]
fn test_t_캐시_왕복() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs_t.json");
    let (set, adjacency) = setup(1);
    let fp = fingerprint(&set, 1e-5);
    let table = DecompressedT::compute(&set.bases, &adjacency, &no_progress);

    save_coeffs_t(&path, &table, &fp).unwrap();
    let loaded = load_coeffs_t(&path, &adjacency, &fp).unwrap();
    assert_eq!(loaded, table);
}

#[test]
fn test_기저_수가_다르면_불일치() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs_bb.json");
    let (set, adjacency) = setup(1);
    let table = DecompressedBB::compute(&set.bases, &adjacency, &no_progress);
    save_coeffs_bb(&path, &table, &fingerprint(&set, 1e-5)).unwrap();

    let (bigger, bigger_adjacency) = setup(2);
    let err = load_coeffs_bb(&path, &bigger.bases, &bigger_adjacency, &fingerprint(&bigger, 1e-5)).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));
}

#[test]
fn test_허용치가_다른_캐시는_거부() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs_bb.json");
    let (set, loose) = setup(1);
    let table = DecompressedBB::compute(&set.bases, &loose, &no_progress);
    save_coeffs_bb(&path, &table, &fingerprint(&set, 1e-5)).unwrap();

    // 같은 기저 집합이어도 지문의 허용치가 다르면 읽지 않음
    let err = load_coeffs_bb(&path, &set.bases, &loose, &fingerprint(&set, 1e-2)).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));
}

#[test]
fn test_인접_리스트와_다른_행은_거부() {
    let dir = tempfile::tempdir().unwrap();
    let bb_path = dir.path().join("coeffs_bb.json");
    let t_path = dir.path().join("coeffs_t.json");
    let (set, loose) = setup(1);
    let (_, strict) = setup_with_tolerance(1, 1e-2);
    assert_ne!(loose.significant_bb, strict.significant_bb);

    // 지문이 맞더라도 행의 이웃 목록이 현재 인접 리스트와 다르면 거부
    let fp = fingerprint(&set, 1e-2);
    let table = DecompressedBB::compute(&set.bases, &loose, &no_progress);
    save_coeffs_bb(&bb_path, &table, &fp).unwrap();
    let err = load_coeffs_bb(&bb_path, &set.bases, &strict, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));

    let t_table = DecompressedT::compute(&set.bases, &loose, &no_progress);
    save_coeffs_t(&t_path, &t_table, &fp).unwrap();
    let mut shrunk = loose.clone();
    let row = shrunk.intersecting.iter_mut().find(|r| r.len() > 1).unwrap();
    row.pop();
    let err = load_coeffs_t(&t_path, &shrunk, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));
}

#[test]
fn test_bb_행에_자기_자신이_있으면_거부() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs_bb.json");
    let (bases, adjacency, fp) = two_bases();

    write_json(&path, "bb", &fp, json!([[[1, 0.5]], [[1, 0.25]]]));
    let err = load_coeffs_bb(&path, &bases, &adjacency, &fp).unwrap_err();
    match err {
        BasisError::CacheMismatch { found, .. } => assert!(found.contains("row 1")),
        other => panic!("unexpected error: {:?}", other),
    }

    write_json(&path, "bb", &fp, json!([[[1, 0.5]], [[0, 0.5]]]));
    let table = load_coeffs_bb(&path, &bases, &adjacency, &fp).unwrap();
    assert_eq!(table.row(1), &[(0u32, 0.5f32)][..]);
}

#[test]
fn test_종류가_다르면_불일치() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coeffs.json");
    let (bases, adjacency, fp) = two_bases();
    write_json(&path, "t", &fp, json!([[], []]));
    let err = load_coeffs_bb(&path, &bases, &adjacency, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));
}

#[test]
fn test_범위_밖_이웃과_정렬되지_않은_행() {
    let dir = tempfile::tempdir().unwrap();
    let (bases, adjacency, fp) = two_bases();

    let out_of_range = dir.path().join("range.json");
    write_json(&out_of_range, "t", &fp, json!([[[5, [1.0, 2.0]]], []]));
    let err = load_coeffs_t(&out_of_range, &adjacency, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));

    let unsorted = dir.path().join("unsorted.json");
    write_json(&unsorted, "t", &fp, json!([[[1, [0.5, 0.0]], [0, [0.25, 0.0]]], [[0, [0.5, 0.0]], [1, [0.25, 0.0]]]]));
    let err = load_coeffs_t(&unsorted, &adjacency, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));

    let wrong_bb = dir.path().join("bb.json");
    write_json(&wrong_bb, "bb", &fp, json!([[], [[0, 0.25]]]));
    let err = load_coeffs_bb(&wrong_bb, &bases, &adjacency, &fp).unwrap_err();
    assert!(matches!(err, BasisError::CacheMismatch { .. }));
}

#[test]
fn test_없는_파일과_깨진_파일() {
    let dir = tempfile::tempdir().unwrap();
    let (_, adjacency, fp) = two_bases();
    let missing = dir.path().join("missing.json");
    assert!(matches!(load_coeffs_t(&missing, &adjacency, &fp), Err(BasisError::Io(_))));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ \"kind\": ").unwrap();
    assert!(matches!(load_coeffs_t(&broken, &adjacency, &fp), Err(BasisError::Serde(_))));
}
