pub mod predicate;
pub mod voxel_grid;
