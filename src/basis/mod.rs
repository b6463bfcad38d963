//! # 기저 흐름 (Basis Flow)
//!
//! 속도장을 구성하는 해석적 무발산 기저 함수를 정의한다. 각 기저는 주파수 레벨
//! `(fx, fy)`와 중심으로 결정되며, 반 크기 `h = L / 2^(f+1)` 인 축 정렬 사각형
//! 밖에서는 정확히 0이다. (레벨 0 템플릿의 지지 영역이 `[-L/2, L/2]²`)
//!
//! 국소 좌표 `u = (x - cx) / hx`, `v = (y - cy) / hy`에서 스트림 함수는
//! `ψ = k · s(u) · s(v)` (`k = √(hx·hy)`)이고 속도는 `(∂ψ/∂y, -∂ψ/∂x)` 이다.

pub mod builder;
pub mod domain;
pub mod profile;
pub mod support;

#[cfg(test)]
mod __test__;

use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};

use profile::{bump, bump_deriv};
pub use support::BasisSupport;

/// 기저 상태 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisFlag {
    /// 지지 영역 전체가 도메인 내부이고 장애물에 가려지지 않음
    Interior,
    /// 솔버에 참여함 (호스트가 끄고 켤 수 있음)
    Active,
}

/// 기저 상태 태그 집합
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BasisFlags {
    interior: bool,
    active: bool,
}

impl BasisFlags {
    pub const NONE: Self = Self {
        interior: false,
        active: false,
    };
    pub const INTERIOR: Self = Self {
        interior: true,
        active: false,
    };
    pub const ACTIVE: Self = Self {
        interior: false,
        active: true,
    };
    pub const INTERIOR_ACTIVE: Self = Self {
        interior: true,
        active: true,
    };

    pub fn is_interior(&self) -> bool {
        self.interior
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn contains(&self, flag: BasisFlag) -> bool {
        match flag {
            BasisFlag::Interior => self.interior,
            BasisFlag::Active => self.active,
        }
    }

    pub fn set(&mut self, flag: BasisFlag, value: bool) {
        match flag {
            BasisFlag::Interior => self.interior = value,
            BasisFlag::Active => self.active = value,
        }
    }

    /// `required`에 켜진 태그가 모두 켜져 있는지
    pub fn contains_all(&self, required: BasisFlags) -> bool {
        (!required.interior || self.interior) && (!required.active || self.active)
    }
}

/// 해석적 무발산 기저 흐름 하나
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisFlow {
    pub freq_lvl: IVec2,
    pub center: DVec2,
    pub group_id: u32,
    pub flags: BasisFlags,
    pub prev_flags: BasisFlags,
    /// 자기 자신과의 BB 계수
    pub norm_squared: f64,
    half_size: DVec2,
}

impl BasisFlow {
    /// 새 기저를 만든다. `length_lvl0`은 주파수 레벨 0 지지 영역의 한 변 길이.
    pub fn new(freq_lvl: IVec2, center: DVec2, length_lvl0: f64) -> Self {
        let half_size = DVec2::new(
            0.5 * length_lvl0 / (1u32 << freq_lvl.x) as f64,
            0.5 * length_lvl0 / (1u32 << freq_lvl.y) as f64,
        );
        Self {
            freq_lvl,
            center,
            group_id: 0,
            flags: BasisFlags::INTERIOR_ACTIVE,
            prev_flags: BasisFlags::INTERIOR_ACTIVE,
            norm_squared: 0.0,
            half_size,
        }
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    #[inline]
    pub fn support_half_size(&self) -> DVec2 {
        self.half_size
    }

    #[inline]
    pub fn support(&self) -> BasisSupport {
        BasisSupport::from_center(self.center, self.half_size)
    }

    /// 스트림 함수 진폭 `k`
    #[inline]
    pub(crate) fn amplitude(&self) -> f64 {
        (self.half_size.x * self.half_size.y).sqrt()
    }

    #[inline]
    pub(crate) fn local_x(&self, x: f64) -> f64 {
        (x - self.center.x) / self.half_size.x
    }

    #[inline]
    pub(crate) fn local_y(&self, y: f64) -> f64 {
        (y - self.center.y) / self.half_size.y
    }

    /// 점 `p`에서의 속도
    pub fn eval(&self, p: DVec2) -> DVec2 {
        let u = self.local_x(p.x);
        let v = self.local_y(p.y);
        if u.abs() >= 1.0 || v.abs() >= 1.0 {
            return DVec2::ZERO;
        }
        let k = self.amplitude();
        DVec2::new(
            k / self.half_size.y * bump(u) * bump_deriv(v),
            -k / self.half_size.x * bump_deriv(u) * bump(v),
        )
    }

    /// 스칼라 프로파일 `s(u)·s(v)` (수송 계수의 가중치)
    pub fn profile(&self, p: DVec2) -> f64 {
        bump(self.local_x(p.x)) * bump(self.local_y(p.y))
    }

    /// 스텝 경계에서 플래그를 갱신하며 직전 값을 보관한다.
    pub fn update_flags(&mut self, flags: BasisFlags) {
        self.prev_flags = self.flags;
        self.flags = flags;
    }

    /// 이번 스텝에 내부 상태가 새로 켜졌는지
    pub fn became_interior(&self) -> bool {
        self.flags.is_interior() && !self.prev_flags.is_interior()
    }

    /// 이번 스텝에 내부 상태가 꺼졌는지
    pub fn left_interior(&self) -> bool {
        !self.flags.is_interior() && self.prev_flags.is_interior()
    }
}
