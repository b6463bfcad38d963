//! 크레이트 공용 에러 타입

use thiserror::Error;

/// 기저 흐름 엔진에서 발생하는 모든 에러
#[derive(Debug, Error)]
pub enum BasisError {
    /// 구성 값이 유효하지 않음 (생성 작업 시작 전에 보고됨)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 도메인 안에 들어가는 기저가 하나도 없음
    #[error("basis set is empty for the given domain and frequency range")]
    EmptyBasisSet,

    /// 캐시 파일이 현재 기저 집합과 호환되지 않음
    #[error("coefficient cache mismatch: expected {expected}, found {found}")]
    CacheMismatch { expected: String, found: String },

    /// 벡터 길이가 기저 수와 맞지 않음
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BasisError>;
