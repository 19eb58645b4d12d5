pub mod chunk;
pub mod health;
pub mod performance;
pub mod regions;
pub mod status;

pub use chunk::get_region_chunk;
pub use health::hello;
pub use performance::get_performance;
pub use regions::create_regions;
pub use status::get_region_status;
