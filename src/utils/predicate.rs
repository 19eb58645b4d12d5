use crate::utils::voxel_grid::{Field, Occupancy};

/// 区域谓词 trait
/// 对整个坐标数组一次性求值（逐元素布尔组合），返回与网格同形的占据体
pub trait Predicate: Send + Sync {
    /// 对坐标数组 (x, y, z) 求值
    fn evaluate(&self, x: &Field, y: &Field, z: &Field) -> Occupancy;

    /// 谓词名称（用于日志和图层命名），默认无名
    fn label(&self) -> Option<&str> {
        None
    }
}

impl<F> Predicate for F
where
    F: Fn(&Field, &Field, &Field) -> Occupancy + Send + Sync,
{
    fn evaluate(&self, x: &Field, y: &Field, z: &Field) -> Occupancy {
        self(x, y, z)
    }
}
