//! A raster surface over the aggregate tiles of a point-derived level.

use crate::AGGREGATE_BAND_COUNT;
use anyhow::{Result, bail, ensure};
use async_trait::async_trait;
use overtile_core::{LevelGeometry, PixelType, PyramidError, TileCoord};
use overtile_store::{BandDescriptor, Level, LevelKind, Pyramid, RasterSurface, TilePayload, TileStore, zero_clip_margin};
use std::{path::PathBuf, sync::Arc};

/// [`RasterSurface`] over a point-derived level.
///
/// Serves five `f64` bands (point count, minimum x, minimum y, maximum x,
/// maximum y) rasterized from the per-tile aggregate records. Every pixel
/// of a block takes the owning tile's aggregate values; absent tiles read
/// as `None`.
pub struct PointSurface {
	store: Arc<TileStore>,
	level: Level,
	level_index: u8,
	bands: Vec<BandDescriptor>,
}

impl PointSurface {
	/// Open a point surface over the level at `index`.
	///
	/// # Errors
	/// Returns [`PyramidError::LevelNotFound`] if the level does not exist;
	/// pixel levels are refused (they are served by the stored surface).
	pub fn open(pyramid: &Pyramid, index: usize) -> Result<PointSurface> {
		let level = *pyramid.level(index)?;
		ensure!(
			level.kind == LevelKind::Points,
			"level {index} stores pixels; open it through the stored surface"
		);
		ensure!(
			level.geometry.band_count == AGGREGATE_BAND_COUNT && level.geometry.pixel_type == PixelType::F64,
			"level {index} does not carry the aggregate band layout"
		);

		let descriptions = ["point count", "minimum x", "minimum y", "maximum x", "maximum y"];
		let bands = descriptions
			.iter()
			.enumerate()
			.map(|(index, description)| BandDescriptor {
				index: index as u8,
				pixel_type: PixelType::F64,
				nodata: if index == 0 { Some(0.0) } else { Some(f64::NAN) },
				description: (*description).to_string(),
			})
			.collect();

		Ok(PointSurface {
			store: Arc::clone(pyramid.store()),
			level,
			level_index: index as u8,
			bands,
		})
	}
}

#[async_trait]
impl RasterSurface for PointSurface {
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
		if !geometry
			.tile_bbox(self.level_index)
			.contains(&TileCoord::new(self.level_index, col, row))
		{
			return Ok(None);
		}

		let aggregate = match self.store.get_tile(self.level.record_id, col, row)? {
			None => return Ok(None),
			Some(TilePayload::Pixels(_)) => bail!(PyramidError::CorruptPyramid(format!(
				"point level {} stores a pixel tile at ({col}, {row})",
				self.level_index
			))),
			Some(TilePayload::Points(aggregate)) => aggregate,
		};

		let values = [
			aggregate.count as f64,
			aggregate.min[0],
			aggregate.min[1],
			aggregate.max[0],
			aggregate.max[1],
		];
		let mut cell = Vec::with_capacity(values.len() * 8);
		for value in values {
			cell.extend_from_slice(&value.to_le_bytes());
		}

		let cells = geometry.block_width as usize * geometry.block_height as usize;
		let mut data = Vec::with_capacity(geometry.payload_len());
		for _ in 0..cells {
			data.extend_from_slice(&cell);
		}
		zero_clip_margin(&mut data, geometry, col, row);
		Ok(Some(data))
	}
}

impl std::fmt::Debug for PointSurface {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PointSurface")
			.field("level", &self.level_index)
			.field("geometry", &self.level.geometry)
			.finish()
	}
}
