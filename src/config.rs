//! 기저 흐름 엔진 설정
//!
//! 도메인 크기, 주파수/이방성 범위, 가속 격자 해상도, 솔버 파라미터를 담는다.
//! 모든 필드는 `#[serde(default)]`이므로 JSON 파일에는 바꾸고 싶은 값만 적으면 된다.

use std::path::Path;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::basis::BasisFlags;
use crate::error::{BasisError, Result};
use crate::solver::{Relaxation, SolverParams};

/// 주파수/이방성 레벨 상한
pub const MAX_LEVEL: i32 = 20;

/// 엔진 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasisConfig {
    /// 도메인 중심
    pub domain_center: DVec2,

    /// 도메인 반 크기 (각 축)
    pub domain_half_size: DVec2,

    /// 주파수 레벨 0의 기준 길이
    pub length_lvl0: f64,

    /// 최소/최대 주파수 레벨
    pub min_freq_lvl: i32,
    pub max_freq_lvl: i32,

    /// 최소/최대 이방성 레벨
    pub min_aniso_lvl: i32,
    pub max_aniso_lvl: i32,

    /// 기저 중심 가속 격자 해상도 (각 축 셀 수)
    pub accel_res: usize,

    /// 가속 격자로 교차 후보를 줄일지 여부 (false면 전체 쌍 검사)
    pub use_accel_grid: bool,

    /// 이 값 이상의 |BB|만 유의미한 계수로 취급
    pub tolerance_bb_coeff: f64,

    /// 수송 인접 판정에 쓰는 반 크기 배율
    pub density_multiplier_half_size: f64,

    /// 수송 인접 판정 여유 (경계 부동소수 오차 흡수)
    pub transport_margin: f64,

    /// 계수를 미리 풀어 저장할지 여부
    pub use_decompressed: bool,

    /// 진행 상황 보고 간격 (기저 수)
    pub progress_interval: usize,

    /// 솔버 최대 반복 횟수
    pub max_iterations: usize,

    /// 이완 계수 α
    pub relaxation_alpha: f64,

    /// 솔버 잔차 허용치 (최대 노름)
    pub solver_tolerance: f64,

    /// 솔버 스윕 방식
    pub relaxation: Relaxation,
}

impl Default for BasisConfig {
    fn default() -> Self {
        Self {
            domain_center: DVec2::ZERO,
            domain_half_size: DVec2::ONE,
            length_lvl0: 1.0,
            min_freq_lvl: 1,
            max_freq_lvl: 1,
            min_aniso_lvl: 0,
            max_aniso_lvl: 1,
            accel_res: 64,
            use_accel_grid: true,
            tolerance_bb_coeff: 1e-5,
            density_multiplier_half_size: 1.0,
            transport_margin: 1.01,
            use_decompressed: true,
            progress_interval: 1000,
            max_iterations: 10,
            relaxation_alpha: 1.0,
            solver_tolerance: 1e-5,
            relaxation: Relaxation::GaussSeidel,
        }
    }
}

impl BasisConfig {
    /// JSON 문자열에서 설정을 읽고 검증한다.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// JSON 파일에서 설정을 읽고 검증한다.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// 생성 작업 전에 치명적인 설정 오류를 걸러낸다.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(BasisError::InvalidConfig(msg));

        if !(self.domain_half_size.x > 0.0 && self.domain_half_size.y > 0.0)
            || !self.domain_half_size.is_finite()
        {
            return invalid(format!(
                "domain half size must be positive, got {:?}",
                self.domain_half_size
            ));
        }
        if !self.domain_center.is_finite() {
            return invalid("domain center must be finite".into());
        }
        if !(self.length_lvl0 > 0.0 && self.length_lvl0.is_finite()) {
            return invalid(format!("length_lvl0 must be positive, got {}", self.length_lvl0));
        }
        if self.min_freq_lvl < 0 || self.min_freq_lvl > self.max_freq_lvl {
            return invalid(format!(
                "frequency range {}..={} is empty or negative",
                self.min_freq_lvl, self.max_freq_lvl
            ));
        }
        if self.min_aniso_lvl < 0 || self.min_aniso_lvl > self.max_aniso_lvl {
            return invalid(format!(
                "anisotropy range {}..={} is empty or negative",
                self.min_aniso_lvl, self.max_aniso_lvl
            ));
        }
        // 2^lvl 을 정수로 다루므로 과도한 레벨은 막는다
        if self.max_freq_lvl > MAX_LEVEL {
            return invalid(format!("max_freq_lvl {} is too large", self.max_freq_lvl));
        }
        if self.max_aniso_lvl > MAX_LEVEL {
            return invalid(format!("max_aniso_lvl {} is too large", self.max_aniso_lvl));
        }
        if self.accel_res == 0 {
            return invalid("accel_res must be at least 1".into());
        }
        if !(self.tolerance_bb_coeff >= 0.0 && self.tolerance_bb_coeff.is_finite()) {
            return invalid("tolerance_bb_coeff must be finite and non-negative".into());
        }
        if !(self.density_multiplier_half_size > 0.0) || !(self.transport_margin > 0.0) {
            return invalid("transport limits must be positive".into());
        }
        if !(self.relaxation_alpha > 0.0 && self.relaxation_alpha <= 2.0) {
            return invalid(format!(
                "relaxation_alpha must be in (0, 2], got {}",
                self.relaxation_alpha
            ));
        }
        // 0 이면 반복 상한까지 돈다
        if !(self.solver_tolerance >= 0.0 && self.solver_tolerance.is_finite()) {
            return invalid("solver_tolerance must be finite and non-negative".into());
        }
        Ok(())
    }

    pub fn domain_min(&self) -> DVec2 {
        self.domain_center - self.domain_half_size
    }

    pub fn domain_max(&self) -> DVec2 {
        self.domain_center + self.domain_half_size
    }

    /// 설정에서 솔버 파라미터를 만든다. 활성 플래그가 모두 켜진 기저만 푼다.
    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            max_iterations: self.max_iterations,
            tolerance: self.solver_tolerance,
            alpha: self.relaxation_alpha,
            required_flags: BasisFlags::INTERIOR_ACTIVE,
            min_freq: 0,
            relaxation: self.relaxation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = BasisConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.domain_min(), DVec2::new(-1.0, -1.0));
        assert_eq!(cfg.domain_max(), DVec2::new(1.0, 1.0));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "max_freq_lvl": 3, "relaxation_alpha": 0.8 }"#;
        let cfg = BasisConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.max_freq_lvl, 3);
        assert_eq!(cfg.relaxation_alpha, 0.8);
        assert_eq!(cfg.min_freq_lvl, 1);
        assert_eq!(cfg.accel_res, 64);
    }

    #[test]
    fn test_zero_domain_rejected() {
        let cfg = BasisConfig {
            domain_half_size: DVec2::new(0.0, 1.0),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BasisError::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_freq_range_rejected() {
        let cfg = BasisConfig {
            min_freq_lvl: 3,
            max_freq_lvl: 2,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BasisError::InvalidConfig(_))));
    }

    #[test]
    fn test_huge_anisotropy_rejected() {
        let cfg = BasisConfig {
            max_aniso_lvl: i32::MAX,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BasisError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_domain_rejected() {
        let cfg = BasisConfig {
            domain_half_size: DVec2::new(f64::INFINITY, 1.0),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BasisError::InvalidConfig(_))));

        let cfg = BasisConfig {
            length_lvl0: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BasisError::InvalidConfig(_))));
    }

    #[test]
    fn test_tolerances() {
        let zero = BasisConfig {
            solver_tolerance: 0.0,
            tolerance_bb_coeff: 0.0,
            ..Default::default()
        };
        assert!(zero.validate().is_ok());
        let negative = BasisConfig {
            solver_tolerance: -1e-3,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(BasisError::InvalidConfig(_))));
        let infinite = BasisConfig {
            tolerance_bb_coeff: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(infinite.validate(), Err(BasisError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_json_is_serde_error() {
        let err = BasisConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, BasisError::Serde(_)));
    }
}
