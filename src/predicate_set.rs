use crate::error::RegionError;
use crate::grid::Grid;
use crate::utils::predicate::Predicate;
use crate::utils::voxel_grid::Occupancy;

/// 有序谓词集合
/// 输入顺序决定区域归属优先级以及调色板下标
pub struct PredicateSet {
    predicates: Vec<Box<dyn Predicate>>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// 单个谓词包装为只含一个元素的集合
    pub fn single(predicate: impl Predicate + 'static) -> Self {
        let mut set = Self::new();
        set.push(predicate);
        set
    }

    pub fn push(&mut self, predicate: impl Predicate + 'static) {
        self.predicates.push(Box::new(predicate));
    }

    /// builder 风格追加
    pub fn with(mut self, predicate: impl Predicate + 'static) -> Self {
        self.push(predicate);
        self
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Predicate> {
        self.predicates.iter().map(|p| p.as_ref())
    }

    /// 图层名称：有 label 用 label，否则 "Expr #i"
    pub fn layer_names(&self) -> Vec<String> {
        self.iter()
            .enumerate()
            .map(|(i, p)| match p.label() {
                Some(label) => label.to_string(),
                None => format!("Expr #{}", i),
            })
            .collect()
    }

    /// 按输入顺序对网格求值，每个谓词得到一个占据体
    pub fn evaluate_all(&self, grid: &Grid) -> Result<Vec<Occupancy>, RegionError> {
        let expected = grid.shape();
        let mut volumes = Vec::with_capacity(self.len());

        for (index, predicate) in self.iter().enumerate() {
            let volume = predicate.evaluate(&grid.x, &grid.y, &grid.z);
            if volume.shape != expected || volume.len() != grid.voxel_count() {
                return Err(RegionError::ShapeMismatch {
                    index,
                    expected,
                    actual: volume.shape,
                });
            }
            log::debug!(
                "谓词 #{} 求值完成: {} / {} 个体素满足",
                index,
                volume.count(),
                volume.len()
            );
            volumes.push(volume);
        }

        Ok(volumes)
    }
}

impl Default for PredicateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Box<dyn Predicate>>> for PredicateSet {
    fn from(predicates: Vec<Box<dyn Predicate>>) -> Self {
        Self { predicates }
    }
}

impl FromIterator<Box<dyn Predicate>> for PredicateSet {
    fn from_iter<I: IntoIterator<Item = Box<dyn Predicate>>>(iter: I) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}
