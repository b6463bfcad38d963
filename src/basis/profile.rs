//! 1차원 범프 프로파일과 가우스-르장드르 적분
//!
//! 기저의 스트림 함수는 `s(u) * s(v)` 꼴로 분리되므로, 두 기저 사이의 모든 적분은
//! 1차원 적분의 곱으로 쓸 수 있다. `s(t) = (1 - t²)²` 이고 두 프로파일(또는 도함수)의
//! 곱은 축마다 최대 8차 다항식이므로 5점 가우스-르장드르 규칙이 정확하다.

/// 5점 가우스-르장드르 노드 ([-1, 1] 기준)
const GAUSS_NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683_1,
    0.0,
    0.538_469_310_105_683_1,
    0.906_179_845_938_664,
];

/// 노드별 가중치
const GAUSS_WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189_1,
    0.478_628_670_499_366_5,
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
];

/// `∫_{-1}^{1} s(t) dt`
pub const BUMP_INTEGRAL: f64 = 16.0 / 15.0;

/// 범프 프로파일 `s(t) = (1 - t²)²`, 지지 구간 밖에서는 0
#[inline]
pub fn bump(t: f64) -> f64 {
    if t.abs() >= 1.0 {
        return 0.0;
    }
    let a = 1.0 - t * t;
    a * a
}

/// `s'(t) = -4t(1 - t²)`
#[inline]
pub fn bump_deriv(t: f64) -> f64 {
    if t.abs() >= 1.0 {
        return 0.0;
    }
    -4.0 * t * (1.0 - t * t)
}

/// 구간 `[a, b]`에서 `f`를 5점 가우스-르장드르로 적분한다. 빈 구간이면 0.
pub fn integrate(a: f64, b: f64, f: impl Fn(f64) -> f64) -> f64 {
    if b <= a {
        return 0.0;
    }
    let mid = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let mut sum = 0.0;
    for (node, weight) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
        sum += weight * f(mid + half * node);
    }
    sum * half
}
