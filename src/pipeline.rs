use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::grid::{Domain, Grid};
use crate::palette::{Color, ColorMap, ColorOptions, assign_colors};
use crate::predicate_set::PredicateSet;
use crate::regions::{LABEL_INTERSECTION, Regions, combine, expression_label};
use crate::utils::voxel_grid::{Occupancy, VoxelGrid};

/// 区域计算选项
///
/// 默认值：
/// - `intersection_only = false`：绘制每个谓词的独占区域和交集
/// - `colors.colors = None`：使用内置调色板
/// - `colors.intersection_color = None`：使用内置交集颜色
/// - `colors.only_random_colors = false`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOptions {
    /// 只输出交集图层
    pub intersection_only: bool,
    #[serde(flatten)]
    pub colors: ColorOptions,
}

/// 图层类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum LayerKind {
    /// 第 i 个谓词的独占区域
    Expression(usize),
    Intersection,
}

/// 图层元信息：名称、类型、标签值和颜色
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub name: String,
    pub kind: LayerKind,
    /// 标签体素中的取值
    pub label: u16,
    pub color: Color,
}

/// 交给渲染端的一个图层
#[derive(Debug, Clone)]
pub struct Layer<'a> {
    pub info: LayerInfo,
    pub volume: &'a Occupancy,
}

/// 规划图层，不需要体素数据
/// intersection_only 时只有交集图层，否则每个谓词一层独占区域再加交集层
pub fn plan_layers(
    names: &[String],
    colors: &ColorMap,
    intersection_only: bool,
) -> Result<Vec<LayerInfo>, RegionError> {
    let mut layers = Vec::with_capacity(names.len() + 1);

    if !intersection_only {
        for (index, (name, &color)) in names.iter().zip(colors.layers.iter()).enumerate() {
            layers.push(LayerInfo {
                name: name.clone(),
                kind: LayerKind::Expression(index),
                label: expression_label(index)?,
                color,
            });
        }
    }

    layers.push(LayerInfo {
        name: "Intersection".to_string(),
        kind: LayerKind::Intersection,
        label: LABEL_INTERSECTION,
        color: colors.intersection,
    });

    Ok(layers)
}

/// 一次区域计算的完整结果
#[derive(Debug, Clone)]
pub struct RegionOutput {
    pub shape: [usize; 3],
    pub names: Vec<String>,
    pub regions: Regions,
    pub colors: ColorMap,
    pub intersection_only: bool,
}

/// 计算区域（颜色随机源使用线程 rng）
pub fn compute_regions(
    predicates: &PredicateSet,
    domain: Domain,
    resolution: u32,
    options: &RegionOptions,
) -> Result<RegionOutput, RegionError> {
    compute_regions_with_rng(predicates, domain, resolution, options, &mut rand::rng())
}

/// 计算区域：构建网格 -> 逐个求值 -> 组合 -> 配色
pub fn compute_regions_with_rng<R: rand::Rng>(
    predicates: &PredicateSet,
    domain: Domain,
    resolution: u32,
    options: &RegionOptions,
    rng: &mut R,
) -> Result<RegionOutput, RegionError> {
    let grid = Grid::build(domain, resolution)?;
    let volumes = predicates.evaluate_all(&grid)?;
    let regions = combine(grid.shape(), &volumes);
    let colors = assign_colors(predicates.len(), &options.colors, rng);

    Ok(RegionOutput {
        shape: grid.shape(),
        names: predicates.layer_names(),
        regions,
        colors,
        intersection_only: options.intersection_only,
    })
}

impl RegionOutput {
    pub fn union(&self) -> &Occupancy {
        &self.regions.union
    }

    pub fn intersection(&self) -> &Occupancy {
        &self.regions.intersection
    }

    pub fn distinct(&self) -> &[Occupancy] {
        &self.regions.distinct
    }

    /// 渲染端消费的图层列表
    pub fn layers(&self) -> Result<Vec<Layer<'_>>, RegionError> {
        let infos = plan_layers(&self.names, &self.colors, self.intersection_only)?;
        Ok(infos
            .into_iter()
            .map(|info| {
                let volume = match info.kind {
                    LayerKind::Expression(index) => &self.regions.distinct[index],
                    LayerKind::Intersection => &self.regions.intersection,
                };
                Layer { info, volume }
            })
            .collect())
    }

    /// 每体素一个标签的压平结果
    pub fn label_volume(&self) -> Result<VoxelGrid<u16>, RegionError> {
        self.regions.label_volume(self.intersection_only)
    }
}
