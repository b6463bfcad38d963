//! # basis_flow
//!
//! 해석적 무발산 기저 흐름으로 2차원 비압축성 유체 속도장을 표현하고 투영하는 엔진.
//!
//! 구성 순서는 다음과 같다.
//!
//! 1. [`basis::builder`]가 도메인을 덮는 기저 집합을 만든다.
//! 2. [`accel`]이 기저별 인접 리스트를 만든다.
//! 3. [`coeffs`]가 BB/T 계수를 계산해 희소 테이블로 저장한다.
//! 4. [`solver`]가 매 스텝 BB 계를 풀어 기저 계수를 구한다.
//!
//! [`FlowContext`]가 이 모든 상태를 소유한다.

pub mod accel;
pub mod basis;
pub mod coeffs;
pub mod config;
pub mod context;
pub mod error;
pub mod solver;

pub use basis::builder::{build_basis_set, BasisSet, FlagTransitions};
pub use basis::domain::{BoxDomain, CircleObstacle, DomainOracle};
pub use basis::{BasisFlag, BasisFlags, BasisFlow, BasisSupport};
pub use coeffs::{bb_coefficient, t_coefficient, BBMatrix, DecompressedBB, DecompressedT};
pub use config::BasisConfig;
pub use context::FlowContext;
pub use error::{BasisError, Result};
pub use solver::{Relaxation, SolveReport, SolverParams};
