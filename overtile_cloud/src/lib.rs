//! Point-cloud derived overview tile pyramids.
//!
//! This crate derives raster tiles on the fly from a hierarchical spatial
//! index over an unordered point cloud:
//!
//! - [`SpatialIndexSource`] — the external index at its interface boundary,
//! - [`plan_levels`] — the level stack, doubling until one tile covers the
//!   extent,
//! - [`classify`] — the spatial node classifier, one worklist traversal per
//!   level producing per-tile aggregates,
//! - [`materialize_classification`] — atomic hand-off of the aggregates to
//!   the pyramid manager,
//! - [`PointSurface`] — per-level read access with five aggregate bands,
//! - [`MockIndex`] — a synthetic quadtree for tests and examples.
//!
//! # Quick start
//! ```rust,no_run
//! use overtile_cloud::*;
//! use overtile_core::{GridExtent, progress::ProgressDrain, progress::ProgressTrait};
//! use overtile_store::{Pyramid, RasterSurface, TileStore};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let extent = GridExtent::new(0.0, 0.0, 10.0, 10.0)?;
//!     let index = MockIndex::build(extent, vec![[1.5, 2.5], [7.0, 7.0]], 64);
//!
//!     let store = TileStore::create_path(Path::new("/tmp/cloud.pyramid"), extent)?;
//!     let mut pyramid = Pyramid::open(store)?;
//!
//!     let levels = plan_levels(&extent, 0.1, 10)?;
//!     let classification = classify(&index, &levels, &ClassifyOptions::default(), &mut ProgressDrain::new())?;
//!     let indices = materialize_classification(&mut pyramid, &classification).await?;
//!
//!     let surface = PointSurface::open(&pyramid, indices[0])?;
//!     let _block = surface.read_block(1, 7).await?;
//!     Ok(())
//! }
//! ```

mod classifier;
mod index;
mod materialize;
mod mock;
mod plan;
mod surface;

pub use classifier::*;
pub use index::*;
pub use materialize::*;
pub use mock::*;
pub use plan::*;
pub use surface::*;
