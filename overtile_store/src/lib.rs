//! Relational (SQLite) overview tile pyramids.
//!
//! This crate stores square raster tiles at successive resolutions inside a
//! SQLite database and manages them as a multi-resolution pyramid:
//!
//! - [`TileStore`] — the backing database with atomic, all-or-nothing level
//!   commits,
//! - [`Pyramid`] — discovery, synthesis and removal of resolution levels,
//! - [`RasterSurface`] / [`StoredSurface`] — per-level read access with its
//!   own geotransform.
//!
//! # Quick start
//! ```rust,no_run
//! use overtile_core::{GridExtent, LevelGeometry, PixelType, progress::ProgressDrain, progress::ProgressTrait};
//! use overtile_store::{BuildOptions, Pyramid, TileStore};
//! use std::{collections::BTreeMap, path::Path};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let extent = GridExtent::new(0.0, 0.0, 100.0, 100.0)?;
//!     let store = TileStore::create_path(Path::new("/tmp/example.pyramid"), extent)?;
//!     let mut pyramid = Pyramid::open(store)?;
//!
//!     // Seed the base level.
//!     let base = LevelGeometry::new(extent, 1.0, 1.0, 10, 10, 1, PixelType::U8)?;
//!     let mut tiles = BTreeMap::new();
//!     tiles.insert((0, 0), vec![7u8; base.payload_len()]);
//!     pyramid.materialize_pixel_level(base, &tiles).await?;
//!
//!     // Synthesize a half-resolution overview.
//!     let resample = |_sources: &[overtile_store::SourceTile],
//!                     block: &overtile_store::TargetBlock|
//!      -> anyhow::Result<Vec<u8>> { Ok(vec![0u8; block.geometry.payload_len()]) };
//!     let mut progress = ProgressDrain::new();
//!     pyramid
//!         .build_level(0, &BuildOptions::default(), &resample, &mut progress)
//!         .await?;
//!     Ok(())
//! }
//! ```

mod pyramid;
mod store;
mod surface;

pub use pyramid::*;
pub use store::*;
pub use surface::*;
