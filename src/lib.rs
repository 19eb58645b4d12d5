//! 三维谓词区域计算
//!
//! 在规则网格上对一组布尔谓词求值，得到并集、交集与各谓词独占区域，
//! 并把结果编码为带配色的标签体素，通过 HTTP 分块下发给前端。

pub mod app_state;
pub mod config;
pub mod error;
pub mod expr;
pub mod grid;
pub mod handlers;
pub mod palette;
pub mod performance;
pub mod pipeline;
pub mod predicate_set;
pub mod regions;
pub mod routes;
pub mod task;
pub mod utils;

pub use error::RegionError;
pub use expr::{ExprError, ExprPredicate};
pub use grid::{Domain, Grid};
pub use palette::{Color, ColorMap, ColorOptions};
pub use pipeline::{RegionOptions, RegionOutput, compute_regions, compute_regions_with_rng};
pub use predicate_set::PredicateSet;
pub use regions::{Regions, combine};
pub use utils::predicate::Predicate;
pub use utils::voxel_grid::{Field, Occupancy, VoxelGrid};
