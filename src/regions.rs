use crate::error::RegionError;
use crate::utils::voxel_grid::{Occupancy, VoxelGrid};

/// 标签体素中的空体素
pub const LABEL_EMPTY: u16 = 0;
/// 标签体素中的交集体素
pub const LABEL_INTERSECTION: u16 = 1;

/// 谓词 i 的独占图层标签
pub fn expression_label(index: usize) -> Result<u16, RegionError> {
    index
        .checked_add(2)
        .and_then(|label| u16::try_from(label).ok())
        .ok_or(RegionError::TooManyPredicates(index + 1))
}

/// 区域组合结果
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    /// 所有占据体的并集
    pub union: Occupancy,
    /// 所有占据体的交集（零个谓词时为空）
    pub intersection: Occupancy,
    /// 每个谓词的独占区域：去掉更早谓词已占据的体素，再去掉交集
    pub distinct: Vec<Occupancy>,
}

/// 将按输入顺序排列的占据体折叠成并集、交集和独占区域
///
/// 同时满足 i 和 j (i < j) 但不满足全部谓词的体素归属于 i；
/// 满足全部谓词的体素只出现在交集里。
pub fn combine(shape: [usize; 3], volumes: &[Occupancy]) -> Regions {
    let mut union = Occupancy::empty(shape);
    let mut intersection = if volumes.is_empty() {
        Occupancy::empty(shape)
    } else {
        Occupancy::full(shape)
    };
    let mut distinct = Vec::with_capacity(volumes.len());

    for volume in volumes {
        // union 此时就是之前所有谓词已占据的体素
        distinct.push(volume.and_not(&union));
        intersection &= volume;
        union |= volume;
    }

    for area in distinct.iter_mut() {
        area.remove(&intersection);
    }

    log::debug!(
        "区域组合完成: {} 个谓词, 并集 {} 个体素, 交集 {} 个体素",
        volumes.len(),
        union.count(),
        intersection.count()
    );

    Regions {
        union,
        intersection,
        distinct,
    }
}

impl Regions {
    pub fn shape(&self) -> [usize; 3] {
        self.union.shape
    }

    /// 把划分压平成每体素一个 u16 标签
    /// 0 = 空，1 = 交集，i + 2 = 谓词 i 的独占区域
    /// intersection_only 时只保留交集
    pub fn label_volume(&self, intersection_only: bool) -> Result<VoxelGrid<u16>, RegionError> {
        let mut labels = VoxelGrid::filled(self.shape(), LABEL_EMPTY);

        if !intersection_only {
            for (index, area) in self.distinct.iter().enumerate() {
                let label = expression_label(index)?;
                for (slot, &hit) in labels.data.iter_mut().zip(area.data.iter()) {
                    if hit {
                        *slot = label;
                    }
                }
            }
        }

        for (slot, &hit) in labels.data.iter_mut().zip(self.intersection.data.iter()) {
            if hit {
                *slot = LABEL_INTERSECTION;
            }
        }

        Ok(labels)
    }

    /// 每个独占区域的体素数量
    pub fn distinct_counts(&self) -> Vec<usize> {
        self.distinct.iter().map(Occupancy::count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(bits: &[bool]) -> Occupancy {
        VoxelGrid::new([1, 1, bits.len()], bits.to_vec()).unwrap()
    }

    #[test]
    fn zero_predicates_yield_empty_volumes() {
        let regions = combine([2, 2, 2], &[]);
        assert!(!regions.union.any());
        assert!(!regions.intersection.any());
        assert!(regions.distinct.is_empty());
    }

    #[test]
    fn single_predicate_is_its_own_union_and_intersection() {
        let a = line(&[true, false, true]);
        let regions = combine([1, 1, 3], &[a.clone()]);
        assert_eq!(regions.union, a);
        assert_eq!(regions.intersection, a);
        // 全部体素都在交集里，独占层为空
        assert!(!regions.distinct[0].any());
    }

    #[test]
    fn earlier_predicate_wins_overlaps_outside_intersection() {
        let a = line(&[true, true, false, true]);
        let b = line(&[false, true, true, true]);
        let c = line(&[false, true, false, false]);
        let regions = combine([1, 1, 4], &[a, b, c]);

        assert_eq!(regions.union.data, vec![true, true, true, true]);
        assert_eq!(regions.intersection.data, vec![false, true, false, false]);
        assert_eq!(regions.distinct[0].data, vec![true, false, false, true]);
        assert_eq!(regions.distinct[1].data, vec![false, false, true, false]);
        assert_eq!(regions.distinct[2].data, vec![false, false, false, false]);
    }

    #[test]
    fn label_volume_partitions_union() {
        let a = line(&[true, true, false, false]);
        let b = line(&[false, true, true, false]);
        let regions = combine([1, 1, 4], &[a, b]);

        let labels = regions.label_volume(false).unwrap();
        assert_eq!(labels.data, vec![2, LABEL_INTERSECTION, 3, LABEL_EMPTY]);

        let only = regions.label_volume(true).unwrap();
        assert_eq!(only.data, vec![0, LABEL_INTERSECTION, 0, 0]);
        assert_eq!(regions.distinct_counts(), vec![1, 1]);
    }

    #[test]
    fn labels_overflow_is_an_error() {
        assert_eq!(expression_label(0).unwrap(), 2);
        assert_eq!(expression_label(65533).unwrap(), u16::MAX);
        assert!(matches!(
            expression_label(65534),
            Err(RegionError::TooManyPredicates(65535))
        ));
    }
}
