//! Geometry of one resolution level: pixel size, block shape and tile grid.

use crate::{GridExtent, PixelType, PyramidError, TileBBox, TileCoord};
use anyhow::{Result, bail};
use std::fmt::Debug;

/// Relative tolerance when comparing stored pixel sizes.
///
/// Resolutions written by different sessions go through text/float round
/// trips in the store, so exact equality is too strict when grouping tiles
/// by resolution.
pub const RES_TOLERANCE: f64 = 1e-10;

/// The complete raster geometry of one resolution level.
///
/// A level covers its owning dataset extent with a grid of equally sized
/// tiles (blocks) of `block_width x block_height` pixels. The grid is
/// anchored at the extent's top-left corner `(x_min, y_max)`; columns grow
/// rightward, rows grow downward. Tiles at the right and bottom edges may
/// extend past the extent and are clipped on read.
///
/// # Examples
///
/// ```
/// use overtile_core::{GridExtent, LevelGeometry, PixelType};
///
/// let extent = GridExtent::new(0.0, 0.0, 100.0, 100.0).unwrap();
/// let level = LevelGeometry::new(extent, 1.0, 1.0, 10, 10, 1, PixelType::U8).unwrap();
/// assert_eq!((level.columns(), level.rows()), (10, 10));
///
/// let coarser = level.coarser(2.0).unwrap();
/// assert_eq!((coarser.columns(), coarser.rows()), (5, 5));
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct LevelGeometry {
	pub extent: GridExtent,
	pub pixel_size_x: f64,
	pub pixel_size_y: f64,
	pub block_width: u32,
	pub block_height: u32,
	pub band_count: u8,
	pub pixel_type: PixelType,
}

impl LevelGeometry {
	/// Create a validated level geometry.
	///
	/// # Errors
	/// Returns [`PyramidError::InvalidGeometry`] if a pixel size is
	/// non-positive or non-finite, a block dimension or the band count is
	/// zero, or the level would contain zero columns or rows.
	pub fn new(
		extent: GridExtent,
		pixel_size_x: f64,
		pixel_size_y: f64,
		block_width: u32,
		block_height: u32,
		band_count: u8,
		pixel_type: PixelType,
	) -> Result<LevelGeometry> {
		for (name, size) in [("x", pixel_size_x), ("y", pixel_size_y)] {
			if !size.is_finite() || size <= 0.0 {
				bail!(PyramidError::InvalidGeometry(format!(
					"pixel size {name} ({size}) must be a positive finite number"
				)));
			}
		}
		if block_width == 0 || block_height == 0 {
			bail!(PyramidError::InvalidGeometry(format!(
				"block size {block_width}x{block_height} must be at least 1x1"
			)));
		}
		if band_count == 0 {
			bail!(PyramidError::InvalidGeometry("band count must be at least 1".to_string()));
		}

		let geometry = LevelGeometry {
			extent,
			pixel_size_x,
			pixel_size_y,
			block_width,
			block_height,
			band_count,
			pixel_type,
		};
		if geometry.columns() == 0 || geometry.rows() == 0 {
			bail!(PyramidError::InvalidGeometry(format!(
				"extent {extent:?} at pixel size ({pixel_size_x}, {pixel_size_y}) contains zero columns or rows"
			)));
		}
		Ok(geometry)
	}

	/// Total raster width of the level in pixels (edge pixels included).
	pub fn raster_width(&self) -> u64 {
		(self.extent.width() / self.pixel_size_x).ceil() as u64
	}

	/// Total raster height of the level in pixels (edge pixels included).
	pub fn raster_height(&self) -> u64 {
		(self.extent.height() / self.pixel_size_y).ceil() as u64
	}

	/// Number of tile columns. Fractional tile counts round up; the partial
	/// tile at the high edge is clipped on read.
	pub fn columns(&self) -> u32 {
		self.raster_width().div_ceil(u64::from(self.block_width)) as u32
	}

	/// Number of tile rows.
	pub fn rows(&self) -> u32 {
		self.raster_height().div_ceil(u64::from(self.block_height)) as u32
	}

	/// Width of one tile in world units.
	pub fn tile_world_width(&self) -> f64 {
		self.pixel_size_x * f64::from(self.block_width)
	}

	/// Height of one tile in world units.
	pub fn tile_world_height(&self) -> f64 {
		self.pixel_size_y * f64::from(self.block_height)
	}

	/// The six affine geotransform coefficients of this level
	/// (origin at the extent's top-left corner, north-up).
	pub fn geo_transform(&self) -> [f64; 6] {
		[
			self.extent.x_min,
			self.pixel_size_x,
			0.0,
			self.extent.y_max,
			0.0,
			-self.pixel_size_y,
		]
	}

	/// The world extent of the tile at `(col, row)`, derived from the grid.
	/// Edge tiles extend past the dataset extent; clipping is the reader's
	/// concern.
	pub fn tile_extent(&self, col: i64, row: i64) -> GridExtent {
		let x_min = self.extent.x_min + col as f64 * self.tile_world_width();
		let y_max = self.extent.y_max - row as f64 * self.tile_world_height();
		GridExtent {
			x_min,
			y_min: y_max - self.tile_world_height(),
			x_max: x_min + self.tile_world_width(),
			y_max,
		}
	}

	/// Valid (unclipped) pixel size of the tile at `(col, row)`; interior
	/// tiles are full blocks, edge tiles may be smaller.
	pub fn tile_valid_size(&self, col: i64, row: i64) -> (u32, u32) {
		let width = (self.raster_width() - (col as u64 * u64::from(self.block_width)).min(self.raster_width()))
			.min(u64::from(self.block_width));
		let height = (self.raster_height() - (row as u64 * u64::from(self.block_height)).min(self.raster_height()))
			.min(u64::from(self.block_height));
		(width as u32, height as u32)
	}

	/// Assign a world position to its tile, flooring toward negative
	/// infinity. Positions on the extent's high edge fall into the last
	/// column/row; positions outside the extent return `None`.
	pub fn tile_for_position(&self, level: u8, x: f64, y: f64) -> Option<TileCoord> {
		if !self.extent.contains(x, y) {
			return None;
		}
		let col = TileCoord::floor_div(x - self.extent.x_min, self.tile_world_width());
		let row = TileCoord::floor_div(self.extent.y_max - y, self.tile_world_height());
		Some(TileCoord::new(
			level,
			col.min(i64::from(self.columns()) - 1),
			row.min(i64::from(self.rows()) - 1),
		))
	}

	/// The full tile grid of this level as a bbox.
	pub fn tile_bbox(&self, level: u8) -> TileBBox {
		TileBBox {
			level,
			col_min: 0,
			row_min: 0,
			col_max: i64::from(self.columns()) - 1,
			row_max: i64::from(self.rows()) - 1,
		}
	}

	/// All tiles of this level whose world extent overlaps `query`, or
	/// `None` when the query falls entirely outside the grid.
	pub fn tiles_overlapping(&self, level: u8, query: &GridExtent) -> Option<TileBBox> {
		let col_min = TileCoord::floor_div(query.x_min - self.extent.x_min, self.tile_world_width());
		let col_max = TileCoord::floor_div(query.x_max - self.extent.x_min, self.tile_world_width());
		let row_min = TileCoord::floor_div(self.extent.y_max - query.y_max, self.tile_world_height());
		let row_max = TileCoord::floor_div(self.extent.y_max - query.y_min, self.tile_world_height());
		TileBBox {
			level,
			col_min,
			row_min,
			col_max,
			row_max,
		}
		.intersection(&self.tile_bbox(level))
	}

	/// Derive the geometry of a coarser level by scaling both pixel sizes by
	/// `factor` (2.0 for the usual power-of-two pyramid). Block shape, band
	/// count and pixel type are inherited.
	///
	/// # Errors
	/// Returns [`PyramidError::InvalidGeometry`] if `factor` is not a finite
	/// number greater than 1.
	pub fn coarser(&self, factor: f64) -> Result<LevelGeometry> {
		if !factor.is_finite() || factor <= 1.0 {
			bail!(PyramidError::InvalidGeometry(format!(
				"level scale factor ({factor}) must be finite and greater than 1"
			)));
		}
		LevelGeometry::new(
			self.extent,
			self.pixel_size_x * factor,
			self.pixel_size_y * factor,
			self.block_width,
			self.block_height,
			self.band_count,
			self.pixel_type,
		)
	}

	/// Expected byte length of one full (unclipped) tile payload.
	pub fn payload_len(&self) -> usize {
		self.block_width as usize * self.block_height as usize * self.band_count as usize * self.pixel_type.byte_size()
	}

	/// Whether `(pixel_size_x, pixel_size_y)` names this level's resolution,
	/// within [`RES_TOLERANCE`].
	pub fn matches_resolution(&self, pixel_size_x: f64, pixel_size_y: f64) -> bool {
		res_close(self.pixel_size_x, pixel_size_x) && res_close(self.pixel_size_y, pixel_size_y)
	}
}

/// Compare two pixel sizes with relative tolerance [`RES_TOLERANCE`].
pub fn res_close(a: f64, b: f64) -> bool {
	(a - b).abs() <= RES_TOLERANCE * a.abs().max(b.abs())
}

impl Debug for LevelGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_fmt(format_args!(
			"LevelGeometry(px ({}, {}), {}x{} blocks of {}x{}, {} x {})",
			self.pixel_size_x,
			self.pixel_size_y,
			self.columns(),
			self.rows(),
			self.block_width,
			self.block_height,
			self.band_count,
			self.pixel_type
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn base() -> LevelGeometry {
		let extent = GridExtent::new(0.0, 0.0, 100.0, 100.0).unwrap();
		LevelGeometry::new(extent, 1.0, 1.0, 10, 10, 1, PixelType::U8).unwrap()
	}

	#[test]
	fn grid_shape() {
		let level = base();
		assert_eq!(level.raster_width(), 100);
		assert_eq!(level.raster_height(), 100);
		assert_eq!(level.columns(), 10);
		assert_eq!(level.rows(), 10);
		assert_eq!(level.tile_world_width(), 10.0);
		assert_eq!(level.payload_len(), 100);
	}

	#[test]
	fn doubling_halves_block_count_without_remainder() {
		// Extent (0,0)-(100,100), base pixel size 1, request pixel size 2.
		let coarser = base().coarser(2.0).unwrap();
		assert_eq!(coarser.columns(), 5);
		assert_eq!(coarser.rows(), 5);
		assert_eq!(coarser.raster_width() % u64::from(coarser.block_width), 0);
	}

	#[test]
	fn fractional_tile_count_rounds_up() {
		let extent = GridExtent::new(0.0, 0.0, 105.0, 95.0).unwrap();
		let level = LevelGeometry::new(extent, 1.0, 1.0, 10, 10, 1, PixelType::U8).unwrap();
		assert_eq!(level.columns(), 11);
		assert_eq!(level.rows(), 10);
		// The last column holds 5 valid pixels, the last row 5.
		assert_eq!(level.tile_valid_size(10, 0), (5, 10));
		assert_eq!(level.tile_valid_size(0, 9), (10, 5));
		assert_eq!(level.tile_valid_size(3, 3), (10, 10));
	}

	#[test]
	fn geo_transform_is_north_up() {
		let extent = GridExtent::new(10.0, 20.0, 110.0, 70.0).unwrap();
		let level = LevelGeometry::new(extent, 0.5, 0.25, 64, 64, 1, PixelType::U8).unwrap();
		assert_eq!(level.geo_transform(), [10.0, 0.5, 0.0, 70.0, 0.0, -0.25]);
	}

	#[test]
	fn tile_extent_is_derived() {
		let level = base();
		let extent = level.tile_extent(2, 3);
		assert_eq!(extent.as_array(), [20.0, 60.0, 30.0, 70.0]);
		// Edge tile of an uneven grid extends past the dataset extent.
		let uneven = LevelGeometry::new(GridExtent::new(0.0, 0.0, 95.0, 95.0).unwrap(), 1.0, 1.0, 10, 10, 1, PixelType::U8)
			.unwrap();
		let edge = uneven.tile_extent(9, 0);
		assert_eq!(edge.x_max, 100.0);
	}

	#[test]
	fn position_assignment() {
		let level = base();
		assert_eq!(level.tile_for_position(0, 0.0, 100.0), Some(TileCoord::new(0, 0, 0)));
		assert_eq!(level.tile_for_position(0, 25.0, 95.0), Some(TileCoord::new(0, 2, 0)));
		// High edge falls into the last column/row.
		assert_eq!(level.tile_for_position(0, 100.0, 0.0), Some(TileCoord::new(0, 9, 9)));
		assert_eq!(level.tile_for_position(0, 100.1, 0.0), None);
		assert_eq!(level.tile_for_position(0, 50.0, -0.1), None);
	}

	#[test]
	fn overlap_queries_clip_to_grid() {
		let level = base();
		let query = GridExtent::new(15.0, 75.0, 35.0, 95.0).unwrap();
		assert_eq!(
			level.tiles_overlapping(0, &query),
			Some(TileBBox::new(0, 1, 0, 3, 2).unwrap())
		);

		let outside = GridExtent::new(500.0, 500.0, 600.0, 600.0).unwrap();
		assert_eq!(level.tiles_overlapping(0, &outside), None);
	}

	#[test]
	fn validation() {
		let extent = GridExtent::new(0.0, 0.0, 100.0, 100.0).unwrap();
		for (px, py) in [(0.0, 1.0), (-1.0, 1.0), (f64::NAN, 1.0), (1.0, f64::INFINITY)] {
			let err = LevelGeometry::new(extent, px, py, 10, 10, 1, PixelType::U8).unwrap_err();
			assert!(matches!(
				err.downcast_ref::<PyramidError>(),
				Some(PyramidError::InvalidGeometry(_))
			));
		}
		assert!(LevelGeometry::new(extent, 1.0, 1.0, 0, 10, 1, PixelType::U8).is_err());
		assert!(LevelGeometry::new(extent, 1.0, 1.0, 10, 10, 0, PixelType::U8).is_err());

		// A degenerate extent yields zero columns.
		let degenerate = GridExtent::new(5.0, 5.0, 5.0, 9.0).unwrap();
		let err = LevelGeometry::new(degenerate, 1.0, 1.0, 10, 10, 1, PixelType::U8).unwrap_err();
		assert!(matches!(
			err.downcast_ref::<PyramidError>(),
			Some(PyramidError::InvalidGeometry(_))
		));
	}

	#[test]
	fn coarser_rejects_bad_factor() {
		assert!(base().coarser(1.0).is_err());
		assert!(base().coarser(0.5).is_err());
		assert!(base().coarser(f64::NAN).is_err());
	}

	#[rstest]
	#[case(100.0, 100.0, 1.0, 1.0, 10, 10)]
	#[case(105.0, 95.0, 1.0, 1.0, 10, 10)]
	#[case(100.0, 100.0, 3.0, 7.0, 16, 16)]
	#[case(1.0, 1.0, 0.4, 0.4, 256, 256)]
	#[case(33.3, 66.6, 0.7, 0.3, 5, 9)]
	fn grid_covers_extent_without_gaps(
		#[case] width: f64,
		#[case] height: f64,
		#[case] px: f64,
		#[case] py: f64,
		#[case] block_w: u32,
		#[case] block_h: u32,
	) {
		let extent = GridExtent::new(0.0, 0.0, width, height).unwrap();
		let level = LevelGeometry::new(extent, px, py, block_w, block_h, 1, PixelType::U8).unwrap();

		assert!(level.columns() >= 1 && level.rows() >= 1);
		// The tile grid covers the extent with no gap, allowing edge overhang.
		assert!(u64::from(level.columns()) * u64::from(block_w) >= level.raster_width());
		assert!(u64::from(level.rows()) * u64::from(block_h) >= level.raster_height());
		assert!(level.raster_width() as f64 * px >= width);
		assert!(level.raster_height() as f64 * py >= height);
		// No superfluous trailing tile column/row.
		assert!(u64::from(level.columns() - 1) * u64::from(block_w) < level.raster_width());
		assert!(u64::from(level.rows() - 1) * u64::from(block_h) < level.raster_height());
	}

	#[test]
	fn resolution_matching_uses_tolerance() {
		let level = base();
		assert!(level.matches_resolution(1.0, 1.0));
		assert!(level.matches_resolution(1.0 + 1e-13, 1.0));
		assert!(!level.matches_resolution(1.0 + 1e-6, 1.0));
	}
}
