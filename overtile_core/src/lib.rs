//! Core types for multi-resolution tile pyramids over gridded data.
//!
//! This crate holds the vocabulary shared by the storage-backed pyramid
//! (`overtile_store`) and the point-cloud classifier (`overtile_cloud`):
//!
//! - [`GridExtent`], [`TileCoord`], [`TileBBox`] — world extents and
//!   grid-addressed tiles,
//! - [`LevelGeometry`], [`resolve_block_params`] — per-level raster geometry
//!   and the block resolver,
//! - [`PixelType`], [`infer_band_params`] — band sample types and payload
//!   inference,
//! - [`TileAggregate`] — per-tile point statistics,
//! - [`PyramidError`] — the shared error taxonomy,
//! - [`progress`] — the progress/cancellation contract.

mod error;
pub mod geometry;
pub mod progress;
pub mod types;

pub use error::PyramidError;
pub use geometry::*;
pub use types::*;
