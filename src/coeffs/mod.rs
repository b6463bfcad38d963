//! # 기저 간 상호작용 계수
//!
//! - BB 계수: 두 기저 속도장의 내적 `∫ v_a · v_b`
//! - T 계수: 수송되는 기저의 프로파일로 가중 평균한 수송하는 기저의 속도
//!
//! 모든 적분은 지지 영역 교집합 위에서 축별 5점 가우스-르장드르로 계산한다.
//! 피적분 함수가 교집합 안에서 다항식이므로 결과는 정확하고 결정적이며,
//! 곱셈 순서를 맞춰 두어 `BB(a, b)`와 `BB(b, a)`가 비트 단위로 같다.

pub mod cache;
pub mod decompressed;

#[cfg(test)]
mod __test__;

use glam::DVec2;

use crate::accel::Adjacency;
use crate::basis::profile::{bump, bump_deriv, integrate, BUMP_INTEGRAL};
use crate::basis::BasisFlow;

pub use decompressed::{DecompressedBB, DecompressedT, ExplicitTransfer, EXPLICIT_TRANSFER_FREQS};

/// 두 기저의 BB 계수 (속도장 내적). 지지 영역 내부가 겹치지 않으면 0.
pub fn bb_coefficient(a: &BasisFlow, b: &BasisFlow) -> f64 {
    let rect = match a.support().intersection(&b.support()) {
        Some(rect) => rect,
        None => return 0.0,
    };

    // x축: s·s 와 s'·s'
    let ix_ss = integrate(rect.min.x, rect.max.x, |x| {
        bump(a.local_x(x)) * bump(b.local_x(x))
    });
    let ix_dd = integrate(rect.min.x, rect.max.x, |x| {
        bump_deriv(a.local_x(x)) * bump_deriv(b.local_x(x))
    });
    // y축
    let iy_ss = integrate(rect.min.y, rect.max.y, |y| {
        bump(a.local_y(y)) * bump(b.local_y(y))
    });
    let iy_dd = integrate(rect.min.y, rect.max.y, |y| {
        bump_deriv(a.local_y(y)) * bump_deriv(b.local_y(y))
    });

    let ha = a.support_half_size();
    let hb = b.support_half_size();
    let kk = a.amplitude() * b.amplitude();

    // vx·vx' = kk/(hy hy') s s s' s',  vy·vy' = kk/(hx hx') s' s' s s
    kk / (ha.y * hb.y) * ix_ss * iy_dd + kk / (ha.x * hb.x) * ix_dd * iy_ss
}

/// `transporting` 기저의 속도를 `transported` 기저의 프로파일로 가중 평균한 값
pub fn t_coefficient(transported: &BasisFlow, transporting: &BasisFlow) -> DVec2 {
    let rect = match transported.support().intersection(&transporting.support()) {
        Some(rect) => rect,
        None => return DVec2::ZERO,
    };
    let (w, g) = (transported, transporting);

    let ix_ss = integrate(rect.min.x, rect.max.x, |x| bump(g.local_x(x)) * bump(w.local_x(x)));
    let ix_ds = integrate(rect.min.x, rect.max.x, |x| {
        bump_deriv(g.local_x(x)) * bump(w.local_x(x))
    });
    let iy_ss = integrate(rect.min.y, rect.max.y, |y| bump(g.local_y(y)) * bump(w.local_y(y)));
    let iy_ds = integrate(rect.min.y, rect.max.y, |y| {
        bump_deriv(g.local_y(y)) * bump(w.local_y(y))
    });

    let hg = g.support_half_size();
    let hw = w.support_half_size();
    let k = g.amplitude();
    let weight_total = hw.x * hw.y * BUMP_INTEGRAL * BUMP_INTEGRAL;

    DVec2::new(
        k / hg.y * ix_ss * iy_ds,
        -k / hg.x * ix_ds * iy_ss,
    ) / weight_total
}

/// 솔버가 보는 BB 행렬. 미리 풀어 둔 테이블과 즉석 계산 모두 이 인터페이스를 따른다.
pub trait BBMatrix: Sync {
    /// 행 수 (기저 수)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `BB(i, i)`
    fn diagonal(&self, i: usize) -> f64;

    /// 행 `i`의 유의미한 비대각 원소 `(j, BB(i, j))`를 인덱스 오름차순으로 방문한다.
    fn for_each_off_diagonal(&self, i: usize, f: &mut dyn FnMut(usize, f64));

    /// 단일 원소. 저장되지 않은 (유의미하지 않은) 원소는 0.
    fn coefficient(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.diagonal(i);
        }
        let mut value = 0.0;
        self.for_each_off_diagonal(i, &mut |k, c| {
            if k == j {
                value = c;
            }
        });
        value
    }
}

impl<M: BBMatrix + ?Sized> BBMatrix for &M {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn diagonal(&self, i: usize) -> f64 {
        (**self).diagonal(i)
    }

    fn for_each_off_diagonal(&self, i: usize, f: &mut dyn FnMut(usize, f64)) {
        (**self).for_each_off_diagonal(i, f)
    }

    fn coefficient(&self, i: usize, j: usize) -> f64 {
        (**self).coefficient(i, j)
    }
}

/// 인접 리스트를 따라 매번 계수를 다시 계산하는 BB 행렬
pub struct OnTheFlyBB<'a> {
    bases: &'a [BasisFlow],
    adjacency: &'a Adjacency,
}

impl<'a> OnTheFlyBB<'a> {
    pub fn new(bases: &'a [BasisFlow], adjacency: &'a Adjacency) -> Self {
        Self { bases, adjacency }
    }
}

impl BBMatrix for OnTheFlyBB<'_> {
    fn len(&self) -> usize {
        self.bases.len()
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.bases[i].norm_squared
    }

    fn for_each_off_diagonal(&self, i: usize, f: &mut dyn FnMut(usize, f64)) {
        let bi = &self.bases[i];
        for &j in &self.adjacency.significant_bb[i] {
            let j = j as usize;
            if j == i {
                continue;
            }
            f(j, bb_coefficient(bi, &self.bases[j]));
        }
    }
}
