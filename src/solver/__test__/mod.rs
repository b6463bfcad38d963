//! 희소 반복 솔버 테스트

pub mod projection_test;

use crate::coeffs::BBMatrix;

/// 작은 조밀 행렬 (0이 아닌 비대각 원소만 방문)
pub(crate) struct DenseBB(pub Vec<Vec<f64>>);

impl BBMatrix for DenseBB {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.0[i][i]
    }

    fn for_each_off_diagonal(&self, i: usize, f: &mut dyn FnMut(usize, f64)) {
        for (j, &c) in self.0[i].iter().enumerate() {
            if j != i && c != 0.0 {
                f(j, c);
            }
        }
    }
}
