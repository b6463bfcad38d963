//! 기저 지지 영역 (축 정렬 사각형)

use glam::DVec2;

/// 기저가 0이 아닌 축 정렬 사각형
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisSupport {
    pub min: DVec2,
    pub max: DVec2,
}

impl BasisSupport {
    pub fn from_center(center: DVec2, half_size: DVec2) -> Self {
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// 두 지지 영역의 내부가 겹치는지 검사한다. 경계만 맞닿으면 겹치지 않는다.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// 겹치는 사각형. 내부가 겹치지 않으면 `None`.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        })
    }

    /// 닫힌 사각형 `[min, max]` 안에 완전히 들어가는지 (허용 오차 `eps`)
    pub fn within(&self, min: DVec2, max: DVec2, eps: f64) -> bool {
        self.min.x >= min.x - eps
            && self.min.y >= min.y - eps
            && self.max.x <= max.x + eps
            && self.max.y <= max.y + eps
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_supports_do_not_intersect() {
        let a = BasisSupport::from_center(DVec2::new(0.0, 0.0), DVec2::splat(0.5));
        let b = BasisSupport::from_center(DVec2::new(1.0, 0.0), DVec2::splat(0.5));
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_overlap_intersection_rect() {
        let a = BasisSupport::from_center(DVec2::new(0.0, 0.0), DVec2::splat(0.5));
        let b = BasisSupport::from_center(DVec2::new(0.25, 0.5), DVec2::splat(0.5));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        let rect = a.intersection(&b).unwrap();
        assert_eq!(rect.min, DVec2::new(-0.25, 0.0));
        assert_eq!(rect.max, DVec2::new(0.5, 0.5));
    }

    #[test]
    fn test_within_closed_bounds() {
        let s = BasisSupport::from_center(DVec2::new(0.5, 0.5), DVec2::splat(0.5));
        assert!(s.within(DVec2::splat(-1.0), DVec2::splat(1.0), 0.0));
        assert!(!s.within(DVec2::splat(-1.0), DVec2::splat(0.9), 0.0));
    }
}
