use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::utils::voxel_grid::{Field, VoxelGrid};

/// 采样定义域 [low, high]，三个坐标轴共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct Domain {
    pub low: i64,
    pub high: i64,
}

impl From<(i64, i64)> for Domain {
    fn from((low, high): (i64, i64)) -> Self {
        Domain { low, high }
    }
}

impl From<Domain> for (i64, i64) {
    fn from(domain: Domain) -> Self {
        (domain.low, domain.high)
    }
}

impl Default for Domain {
    fn default() -> Self {
        Domain { low: 0, high: 15 }
    }
}

impl Domain {
    pub fn new(low: i64, high: i64) -> Self {
        Domain { low, high }
    }

    /// 校验定义域：上下界必须非负，且 low <= high
    pub fn validate(&self) -> Result<(), RegionError> {
        if self.low < 0 || self.high < 0 || self.high < self.low {
            return Err(RegionError::InvalidDomain {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// 每个轴的采样点数 n = r * (high - low) + 1
    pub fn samples_per_axis(&self, resolution: u32) -> Result<usize, RegionError> {
        self.validate()?;
        if resolution == 0 {
            return Err(RegionError::InvalidResolution(resolution));
        }
        usize::try_from(self.high - self.low)
            .ok()
            .and_then(|width| width.checked_mul(resolution as usize))
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| self.too_large(resolution))
    }

    /// 只计算网格形状，不分配内存
    pub fn shape(&self, resolution: u32) -> Result<[usize; 3], RegionError> {
        let n = self.samples_per_axis(resolution)?;
        self.voxel_count_of(n, resolution)?;
        Ok([n, n, n])
    }

    /// 体素总数 n³，溢出时返回 GridTooLarge
    pub fn voxel_count(&self, resolution: u32) -> Result<usize, RegionError> {
        let n = self.samples_per_axis(resolution)?;
        self.voxel_count_of(n, resolution)
    }

    fn voxel_count_of(&self, n: usize, resolution: u32) -> Result<usize, RegionError> {
        n.checked_mul(n)
            .and_then(|nn| nn.checked_mul(n))
            .ok_or_else(|| self.too_large(resolution))
    }

    fn too_large(&self, resolution: u32) -> RegionError {
        RegionError::GridTooLarge {
            low: self.low,
            high: self.high,
            resolution,
        }
    }
}

/// 在 [start, stop] 上均匀取 n 个点（包含两端）
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (n - 1) as f64;
            let mut points: Vec<f64> = (0..n)
                .map(|i| start + (stop - start) * i as f64 / last)
                .collect();
            points[n - 1] = stop;
            points
        }
    }
}

/// 三维采样网格：三个同形坐标数组，"ij" 索引
/// 第一个下标扫过 X，第二个扫过 Y，第三个扫过 Z
#[derive(Debug, Clone)]
pub struct Grid {
    pub domain: Domain,
    pub resolution: u32,
    /// 单轴采样坐标（三个轴相同）
    pub axis: Vec<f64>,
    pub x: Field,
    pub y: Field,
    pub z: Field,
}

impl Grid {
    /// 构建网格；定义域或分辨率无效时在分配任何内存之前返回错误
    pub fn build(domain: Domain, resolution: u32) -> Result<Self, RegionError> {
        let shape = domain.shape(resolution)?;
        let axis = linspace(domain.low as f64, domain.high as f64, shape[0]);

        let x = VoxelGrid::from_fn(shape, |[i, _, _]| axis[i]);
        let y = VoxelGrid::from_fn(shape, |[_, j, _]| axis[j]);
        let z = VoxelGrid::from_fn(shape, |[_, _, k]| axis[k]);

        log::debug!(
            "构建网格: domain=[{}, {}], resolution={}, shape={:?}",
            domain.low,
            domain.high,
            resolution,
            shape
        );

        Ok(Grid {
            domain,
            resolution,
            axis,
            x,
            y,
            z,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.x.shape
    }

    pub fn voxel_count(&self) -> usize {
        self.x.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(0.0, 4.0, 5), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(linspace(2.0, 3.0, 3), vec![2.0, 2.5, 3.0]);
        assert_eq!(linspace(7.0, 7.0, 1), vec![7.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn shape_follows_resolution_formula() {
        assert_eq!(Domain::new(0, 50).shape(1).unwrap(), [51, 51, 51]);
        assert_eq!(Domain::new(3, 5).shape(4).unwrap(), [9, 9, 9]);
        assert_eq!(Domain::new(5, 5).shape(3).unwrap(), [1, 1, 1]);
    }

    #[test]
    fn negative_bounds_are_rejected() {
        assert_eq!(
            Grid::build(Domain::new(-5, 10), 1).unwrap_err(),
            RegionError::InvalidDomain { low: -5, high: 10 }
        );
        assert!(Domain::new(0, -1).validate().is_err());
        assert!(Domain::new(10, 2).validate().is_err());
    }

    #[test]
    fn overflowing_grid_is_rejected() {
        let too_large = RegionError::GridTooLarge {
            low: 0,
            high: 4_194_303,
            resolution: 1,
        };
        // 4194304³ = 2^66，超出 usize
        assert_eq!(Domain::new(0, 4_194_303).shape(1).unwrap_err(), too_large);
        assert_eq!(Domain::new(0, 4_194_303).voxel_count(1).unwrap_err(), too_large);
        assert!(matches!(
            Domain::new(0, i64::MAX).shape(16),
            Err(RegionError::GridTooLarge { .. })
        ));
        assert_eq!(Domain::new(0, 50).voxel_count(1).unwrap(), 51 * 51 * 51);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert_eq!(
            Domain::new(0, 3).shape(0).unwrap_err(),
            RegionError::InvalidResolution(0)
        );
    }

    #[test]
    fn coordinates_use_ij_indexing() {
        let grid = Grid::build(Domain::new(1, 3), 2).unwrap();
        assert_eq!(grid.shape(), [5, 5, 5]);
        assert_eq!(grid.axis, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(grid.x[[4, 0, 1]], 3.0);
        assert_eq!(grid.y[[4, 0, 1]], 1.0);
        assert_eq!(grid.z[[4, 0, 1]], 1.5);
        assert_eq!(grid.voxel_count(), 125);
    }

    #[test]
    fn domain_deserializes_from_pair() {
        let domain: Domain = serde_json::from_str("[0, 50]").unwrap();
        assert_eq!(domain, Domain::new(0, 50));
        assert_eq!(serde_json::to_string(&domain).unwrap(), "[0,50]");
    }
}
