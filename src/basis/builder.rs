//! 기저 집합 생성기
//!
//! 허용된 주파수/이방성 레벨마다 도메인을 덮는 네 개의 위상 격자에 기저를 배치하고,
//! 지지 영역이 도메인 안에 들어가는 기저만 남긴다. 생성 순서가 이후 모든 계수/인접
//! 테이블의 인덱스 공간이 된다.

use glam::{DVec2, IVec2};
use rayon::prelude::*;

use super::domain::{support_is_interior, DomainOracle};
use super::{BasisFlag, BasisFlags, BasisFlow};
use crate::coeffs::bb_coefficient;
use crate::config::BasisConfig;
use crate::error::{BasisError, Result};

/// 격자 보폭 단위의 위상 오프셋
pub const PHASE_OFFSETS: [DVec2; 4] = [
    DVec2::new(0.0, 0.0),
    DVec2::new(0.5, 0.0),
    DVec2::new(0.0, 0.5),
    DVec2::new(0.5, 0.5),
];

/// 생성된 기저 집합과 그룹 구조
#[derive(Debug, Clone, PartialEq)]
pub struct BasisSet {
    pub bases: Vec<BasisFlow>,
    /// 파수 오름차순으로 정렬된 주파수 레벨
    pub freq_lvls: Vec<IVec2>,
    /// 주파수 레벨과 위상이 같은 (서로 거의 직교하는) 기저 그룹
    pub orthogonal_groups: Vec<Vec<u32>>,
    /// 주파수 레벨이 같은 기저 그룹
    pub template_groups: Vec<Vec<u32>>,
    pub domain_min: DVec2,
    pub domain_max: DVec2,
}

/// 스텝 경계의 플래그 갱신 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagTransitions {
    pub activated: Vec<usize>,
    pub deactivated: Vec<usize>,
}

/// 파수 제곱 `(2^x)² + (2^y)²`
pub fn wave_number_sqr(freq_lvl: IVec2) -> u64 {
    let fx = 1u64 << freq_lvl.x;
    let fy = 1u64 << freq_lvl.y;
    fx * fx + fy * fy
}

/// 허용 주파수 레벨을 나열하고 파수 오름차순으로 정렬한다.
///
/// 이방성 0이면 `(f, f)`, 이방성 `a > 0`이면 `(major, major + a)`와 그 반전을 넣는다.
/// 정렬은 안정적이라 파수가 같으면 나열 순서를 유지한다.
pub fn enumerate_freq_lvls(
    min_freq: i32,
    max_freq: i32,
    min_aniso: i32,
    max_aniso: i32,
) -> Vec<IVec2> {
    let mut lvls = Vec::new();
    // 주파수 범위보다 큰 이방성은 레벨을 만들지 않음
    let max_aniso = max_aniso.min(max_freq.saturating_sub(min_freq).max(0));
    for aniso in min_aniso..=max_aniso {
        if aniso == 0 {
            for f in min_freq..=max_freq {
                lvls.push(IVec2::new(f, f));
            }
        } else {
            let mut major = min_freq;
            while major.checked_add(aniso).map_or(false, |m| m <= max_freq) {
                lvls.push(IVec2::new(major, major + aniso));
                lvls.push(IVec2::new(major + aniso, major));
                major += 1;
            }
        }
    }
    lvls.sort_by_key(|&lvl| wave_number_sqr(lvl));
    lvls
}

/// 설정과 도메인 판정자로 기저 집합을 만든다.
///
/// 기저가 하나도 없으면 인접/계수 계산을 시작하기 전에 `EmptyBasisSet`을 돌려준다.
pub fn build_basis_set(cfg: &BasisConfig, oracle: &dyn DomainOracle) -> Result<BasisSet> {
    cfg.validate()?;

    let domain_min = cfg.domain_min();
    let domain_max = cfg.domain_max();
    let length = cfg.length_lvl0;
    let freq_lvls = enumerate_freq_lvls(
        cfg.min_freq_lvl,
        cfg.max_freq_lvl,
        cfg.min_aniso_lvl,
        cfg.max_aniso_lvl,
    );
    if freq_lvls.is_empty() {
        return Err(BasisError::InvalidConfig(
            "no frequency level matches the anisotropy range".into(),
        ));
    }

    let mut bases: Vec<BasisFlow> = Vec::new();
    let mut orthogonal_groups: Vec<Vec<u32>> = Vec::new();
    let mut template_groups: Vec<Vec<u32>> = Vec::new();

    for &freq_lvl in &freq_lvls {
        let stride = DVec2::new(
            0.5 / (1u32 << freq_lvl.x) as f64,
            0.5 / (1u32 << freq_lvl.y) as f64,
        );
        let offset_min_x = (domain_min.x / length / stride.x).ceil() as i64 - 1;
        let offset_max_x = (domain_max.x / length / stride.x).floor() as i64 + 1;
        let offset_min_y = (domain_min.y / length / stride.y).ceil() as i64 - 1;
        let offset_max_y = (domain_max.y / length / stride.y).floor() as i64 + 1;

        let group_base = orthogonal_groups.len() as u32;
        let mut phase_groups: [Vec<u32>; 4] = Default::default();
        let mut template_group = Vec::new();

        for ix in offset_min_x..=offset_max_x {
            for iy in offset_min_y..=offset_max_y {
                for (phase, extra) in PHASE_OFFSETS.iter().enumerate() {
                    let center = length * DVec2::new(ix as f64 * stride.x, iy as f64 * stride.y)
                        + length * (*extra * stride);
                    let candidate = BasisFlow::new(freq_lvl, center, length);
                    if !support_is_interior(&candidate.support(), domain_min, domain_max, oracle) {
                        continue;
                    }
                    let id = bases.len() as u32;
                    bases.push(candidate.with_group(group_base + phase as u32));
                    phase_groups[phase].push(id);
                    template_group.push(id);
                }
            }
        }

        orthogonal_groups.extend(phase_groups);
        template_groups.push(template_group);
    }

    if bases.is_empty() {
        return Err(BasisError::EmptyBasisSet);
    }

    bases.par_iter_mut().for_each(|b| {
        b.norm_squared = bb_coefficient(b, b);
    });

    log::info!(
        "Basis set built: {} bases over {} frequency levels",
        bases.len(),
        freq_lvls.len()
    );

    Ok(BasisSet {
        bases,
        freq_lvls,
        orthogonal_groups,
        template_groups,
        domain_min,
        domain_max,
    })
}

impl BasisSet {
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn get(&self, i: usize) -> &BasisFlow {
        &self.bases[i]
    }

    /// 기저 `i`의 활성 여부를 바꾼다 (내부 여부는 건드리지 않음).
    pub fn set_active(&mut self, i: usize, active: bool) {
        self.bases[i].flags.set(BasisFlag::Active, active);
    }

    /// 장애물 변화 후 각 기저의 내부 플래그를 다시 계산한다.
    ///
    /// 모든 기저에 대해 `prev_flags`가 직전 `flags`로 바뀌고, 내부 상태가 새로 켜지거나
    /// 꺼진 기저 목록을 돌려준다.
    pub fn update_flags(&mut self, oracle: &dyn DomainOracle) -> FlagTransitions {
        let (domain_min, domain_max) = (self.domain_min, self.domain_max);
        self.bases.par_iter_mut().for_each(|b| {
            let mut flags = b.flags;
            flags.set(
                BasisFlag::Interior,
                support_is_interior(&b.support(), domain_min, domain_max, oracle),
            );
            b.update_flags(flags);
        });

        let mut transitions = FlagTransitions::default();
        for (i, b) in self.bases.iter().enumerate() {
            if b.became_interior() {
                transitions.activated.push(i);
            } else if b.left_interior() {
                transitions.deactivated.push(i);
            }
        }
        transitions
    }

    /// `required` 태그를 모두 가진 기저 수
    pub fn count_with(&self, required: BasisFlags) -> usize {
        self.bases
            .iter()
            .filter(|b| b.flags.contains_all(required))
            .count()
    }
}
