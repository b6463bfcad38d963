//! 기저 중심 가속 격자
//!
//! 도메인을 `res x res` 균일 셀로 나누고, 각 셀이 중심이 그 안에 있는 기저 인덱스를
//! 소유한다. 교차 후보 쌍을 줄이는 데만 쓰이며 정확성과는 무관하다.

use glam::DVec2;

use crate::basis::{BasisFlow, BasisSupport};

#[derive(Debug, Clone, PartialEq)]
pub struct AccelGrid {
    res: usize,
    min: DVec2,
    max: DVec2,
    cells: Vec<Vec<u32>>,
}

impl AccelGrid {
    /// 빈 격자
    pub fn new(min: DVec2, max: DVec2, res: usize) -> Self {
        let res = res.max(1);
        Self {
            res,
            min,
            max,
            cells: vec![Vec::new(); res * res],
        }
    }

    /// 기저 중심을 셀에 채운 격자
    pub fn from_bases(bases: &[BasisFlow], min: DVec2, max: DVec2, res: usize) -> Self {
        let mut grid = Self::new(min, max, res);
        for (i, b) in bases.iter().enumerate() {
            grid.insert(i as u32, b.center);
        }
        grid
    }

    pub fn res(&self) -> usize {
        self.res
    }

    /// 점이 속한 셀 좌표 (도메인 밖은 가장자리 셀로 고정)
    pub fn cell_of(&self, p: DVec2) -> (usize, usize) {
        (
            self.axis_cell(p.x, self.min.x, self.max.x),
            self.axis_cell(p.y, self.min.y, self.max.y),
        )
    }

    fn axis_cell(&self, value: f64, lo: f64, hi: f64) -> usize {
        let t = ((value - lo) / (hi - lo) * self.res as f64).floor();
        t.clamp(0.0, (self.res - 1) as f64) as usize
    }

    pub fn insert(&mut self, id: u32, center: DVec2) {
        let (cx, cy) = self.cell_of(center);
        self.cells[cy * self.res + cx].push(id);
    }

    pub fn cell(&self, cx: usize, cy: usize) -> &[u32] {
        &self.cells[cy * self.res + cx]
    }

    /// 중심이 `region` 안(셀 단위로 넉넉하게)에 있을 수 있는 모든 기저 인덱스
    pub fn candidates(&self, region: &BasisSupport) -> impl Iterator<Item = u32> + '_ {
        let (x0, y0) = self.cell_of(region.min);
        let (x1, y1) = self.cell_of(region.max);
        (y0..=y1).flat_map(move |cy| {
            (x0..=x1).flat_map(move |cx| self.cell(cx, cy).iter().copied())
        })
    }

    /// 셀에 들어간 인덱스 총합
    pub fn total(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    #[test]
    fn test_cell_of_clamps_to_domain() {
        let grid = AccelGrid::new(DVec2::splat(-1.0), DVec2::splat(1.0), 4);
        assert_eq!(grid.cell_of(DVec2::new(-1.0, -1.0)), (0, 0));
        assert_eq!(grid.cell_of(DVec2::new(1.0, 1.0)), (3, 3));
        assert_eq!(grid.cell_of(DVec2::new(-5.0, 0.1)), (0, 2));
    }

    #[test]
    fn test_every_basis_lands_in_one_cell() {
        let bases: Vec<_> = (0..10)
            .map(|i| BasisFlow::new(IVec2::new(2, 2), DVec2::new(-0.9 + 0.18 * i as f64, 0.0), 1.0))
            .collect();
        let grid = AccelGrid::from_bases(&bases, DVec2::splat(-1.0), DVec2::splat(1.0), 8);
        assert_eq!(grid.total(), bases.len());

        let everything = BasisSupport {
            min: DVec2::splat(-1.0),
            max: DVec2::splat(1.0),
        };
        let mut found: Vec<u32> = grid.candidates(&everything).collect();
        found.sort_unstable();
        assert_eq!(found, (0..10).collect::<Vec<u32>>());
    }
}
