//! Tile geometry resolution: block shapes, level grids and geotransforms.

mod block_params;
mod level_geometry;

pub use block_params::{BlockParams, DEFAULT_BLOCK_SIZE, resolve_block_params, resolve_observed_params};
pub use level_geometry::{LevelGeometry, RES_TOLERANCE, res_close};
