//! 도메인/장애물 판정
//!
//! 기저 유효성 검사와 스텝마다의 플래그 갱신은 모두 `DomainOracle`을 통해
//! 점 단위로 도메인 내부 여부를 묻는다. 장애물 편집 UI 같은 외부 구성요소는
//! 이 트레이트만 구현하면 된다.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::support::BasisSupport;

/// 지지 영역 검사 시 축당 샘플 간격 수
const SUPPORT_SAMPLES: usize = 8;

/// 닫힌 경계 비교에 쓰는 허용 오차
pub const BOUNDARY_EPS: f64 = 1e-9;

/// 점이 도메인 내부이면서 장애물에 가려지지 않았는지 답하는 외부 판정자
pub trait DomainOracle: Sync {
    fn is_interior_and_unobstructed(&self, p: DVec2) -> bool;
}

/// 원형 장애물
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleObstacle {
    pub center: DVec2,
    pub radius: f64,
}

impl CircleObstacle {
    pub fn new(center: DVec2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 점이 장애물 내부(경계 제외)에 있는지
    pub fn contains(&self, p: DVec2) -> bool {
        p.distance_squared(self.center) < self.radius * self.radius
    }
}

/// 축 정렬 상자 도메인 + 선택적 원형 장애물
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxDomain {
    pub min: DVec2,
    pub max: DVec2,
    pub obstacles: Vec<CircleObstacle>,
}

impl BoxDomain {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min,
            max,
            obstacles: Vec::new(),
        }
    }

    pub fn with_obstacle(mut self, obstacle: CircleObstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }
}

impl DomainOracle for BoxDomain {
    fn is_interior_and_unobstructed(&self, p: DVec2) -> bool {
        let inside = p.x >= self.min.x - BOUNDARY_EPS
            && p.x <= self.max.x + BOUNDARY_EPS
            && p.y >= self.min.y - BOUNDARY_EPS
            && p.y <= self.max.y + BOUNDARY_EPS;
        inside && !self.obstacles.iter().any(|o| o.contains(p))
    }
}

impl<T: DomainOracle + ?Sized> DomainOracle for &T {
    fn is_interior_and_unobstructed(&self, p: DVec2) -> bool {
        (**self).is_interior_and_unobstructed(p)
    }
}

/// 지지 영역 전체가 도메인 상자 안에 있고, 판정자가 지지 영역의 모든 샘플 점을
/// 내부로 보는지 검사한다.
pub fn support_is_interior(
    support: &BasisSupport,
    domain_min: DVec2,
    domain_max: DVec2,
    oracle: &dyn DomainOracle,
) -> bool {
    if !support.within(domain_min, domain_max, BOUNDARY_EPS) {
        return false;
    }
    let size = support.size();
    for ix in 0..=SUPPORT_SAMPLES {
        for iy in 0..=SUPPORT_SAMPLES {
            let t = DVec2::new(
                ix as f64 / SUPPORT_SAMPLES as f64,
                iy as f64 / SUPPORT_SAMPLES as f64,
            );
            if !oracle.is_interior_and_unobstructed(support.min + size * t) {
                return false;
            }
        }
    }
    true
}
