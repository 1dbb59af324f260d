//! Raster surfaces: the composed read interface over one resolution level.
//!
//! Instead of a dataset/band class hierarchy, a data source implements the
//! small capability pair [`RasterSurface`] + [`BandDescriptor`] once per
//! source type. A surface is independently addressable, carries its own
//! geotransform, and stays valid for as long as it is held: it shares
//! ownership of the backing store, so dropping the [`Pyramid`] does not
//! invalidate it.

use crate::{Level, LevelKind, Pyramid, TilePayload, TileStore};
use anyhow::{Result, bail, ensure};
use async_trait::async_trait;
use overtile_core::{LevelGeometry, PyramidError};
use std::{path::PathBuf, sync::Arc};

/// Description of one band of a raster surface.
#[derive(Clone, Debug, PartialEq)]
pub struct BandDescriptor {
	/// Zero-based band index.
	pub index: u8,
	pub pixel_type: overtile_core::PixelType,
	/// Value marking cells without data, if the source defines one.
	pub nodata: Option<f64>,
	pub description: String,
}

/// An independently addressable raster view of one resolution level.
#[async_trait]
pub trait RasterSurface: Send + Sync {
	/// The level geometry this surface serves.
	fn geometry(&self) -> &LevelGeometry;

	/// Band descriptors, one per band.
	fn bands(&self) -> &[BandDescriptor];

	/// The six affine geotransform coefficients of the surface.
	fn geo_transform(&self) -> [f64; 6] {
		self.geometry().geo_transform()
	}

	/// Backing objects this surface depends on.
	fn file_list(&self) -> Vec<PathBuf>;

	/// Read one block as a full pixel-interleaved payload. Cells beyond the
	/// dataset extent (the clipped margin of edge tiles) are zero-filled.
	/// Returns `Ok(None)` for absent tiles, including coordinates outside
	/// the level grid.
	async fn read_block(&self, col: i64, row: i64) -> Result<Option<Vec<u8>>>;
}

/// [`RasterSurface`] over the stored tiles of one pixel level.
pub struct StoredSurface {
	store: Arc<TileStore>,
	level: Level,
	level_index: u8,
	bands: Vec<BandDescriptor>,
}

impl Pyramid {
	/// Open a raster surface over the pixel level at `index`.
	///
	/// # Errors
	/// Returns [`PyramidError::LevelNotFound`] if the level does not exist
	/// and [`PyramidError::InconsistentLevel`] if its stored tiles are not
	/// structurally uniform. Point-derived levels are served by the
	/// classifier crate's surface, not this one.
	pub fn surface(&self, index: usize) -> Result<StoredSurface> {
		let level = *self.level(index)?;
		ensure!(
			level.kind == LevelKind::Pixels,
			"level {index} is point-derived; open it through a point surface"
		);
		self.validate_pixel_level(index)?;

		let geometry = &level.geometry;
		let bands = (0..geometry.band_count)
			.map(|index| BandDescriptor {
				index,
				pixel_type: geometry.pixel_type,
				nodata: None,
				description: format!("band {index}"),
			})
			.collect();

		Ok(StoredSurface {
			store: Arc::clone(self.store()),
			level,
			level_index: index as u8,
			bands,
		})
	}
}

/// Zero the clipped margin of an edge tile's payload so stale padding never
/// leaves the store. Interior tiles pass through untouched.
pub fn zero_clip_margin(data: &mut [u8], geometry: &LevelGeometry, col: i64, row: i64) {
	let (valid_width, valid_height) = geometry.tile_valid_size(col, row);
	if valid_width == geometry.block_width && valid_height == geometry.block_height {
		return;
	}

	let cell = geometry.band_count as usize * geometry.pixel_type.byte_size();
	let stride = geometry.block_width as usize * cell;
	for y in 0..geometry.block_height as usize {
		let line = &mut data[y * stride..(y + 1) * stride];
		if y >= valid_height as usize {
			line.fill(0);
		} else {
			line[valid_width as usize * cell..].fill(0);
		}
	}
}

#[async_trait]
impl RasterSurface for StoredSurface {
	fn geometry(&self) -> &LevelGeometry {
		&self.level.geometry
	}

	fn bands(&self) -> &[BandDescriptor] {
		&self.bands
	}

	fn file_list(&self) -> Vec<PathBuf> {
		vec![self.store.path().to_path_buf()]
	}

	async fn read_block(&self, col: i64, row: i64) -> Result<Option<Vec<u8>>> {
		let geometry = &self.level.geometry;
		if !geometry.tile_bbox(self.level_index).contains(&overtile_core::TileCoord::new(
			self.level_index,
			col,
			row,
		)) {
			return Ok(None);
		}

		match self.store.get_tile(self.level.record_id, col, row)? {
			None => Ok(None),
			Some(TilePayload::Points(_)) => bail!(PyramidError::CorruptPyramid(format!(
				"pixel level {} stores an aggregate tile at ({col}, {row})",
				self.level_index
			))),
			Some(TilePayload::Pixels(mut data)) => {
				if data.len() != geometry.payload_len() {
					bail!(PyramidError::InconsistentLevel(format!(
						"tile ({col}, {row}) of level {} has {} bytes, expected {}",
						self.level_index,
						data.len(),
						geometry.payload_len()
					)));
				}
				zero_clip_margin(&mut data, geometry, col, row);
				Ok(Some(data))
			}
		}
	}
}

impl std::fmt::Debug for StoredSurface {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StoredSurface")
			.field("level", &self.level_index)
			.field("geometry", &self.level.geometry)
			.finish()
	}
}
