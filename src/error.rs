use thiserror::Error;

use crate::expr::ExprError;

/// 区域计算过程中的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    /// 定义域边界为负数（或上界小于下界）
    #[error("无效的定义域 [{low}, {high}]: 上下界必须为非负数且 low <= high")]
    InvalidDomain { low: i64, high: i64 },

    /// 分辨率必须 >= 1
    #[error("无效的分辨率 {0}: 分辨率必须 >= 1")]
    InvalidResolution(u32),

    /// 体素数量超出可寻址范围
    #[error("网格过大: 定义域 [{low}, {high}] 在分辨率 {resolution} 下体素数量溢出")]
    GridTooLarge { low: i64, high: i64, resolution: u32 },

    /// 数据长度与 shape 不匹配
    #[error("数据量不匹配: shape {shape:?} 需要 {expected} 个元素，但提供了 {actual} 个")]
    DataLength {
        shape: [usize; 3],
        expected: usize,
        actual: usize,
    },

    /// 谓词返回的体素数组与网格形状不一致
    #[error("谓词 #{index} 返回的形状 {actual:?} 与网格形状 {expected:?} 不一致")]
    ShapeMismatch {
        index: usize,
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// 颜色超出 24 位范围或格式错误
    #[error("无效的颜色: {0}")]
    InvalidColor(String),

    /// 谓词数量超过标签体素能表示的范围
    #[error("谓词数量过多: {0}")]
    TooManyPredicates(usize),

    /// 表达式解析失败
    #[error("表达式 #{index} 解析失败: {source}")]
    Expression {
        index: usize,
        #[source]
        source: ExprError,
    },
}
