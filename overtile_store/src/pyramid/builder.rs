//! Level synthesis: building overview levels and materializing payloads.

use super::Pyramid;
use crate::{LevelKind, StagedTile, TilePayload};
use anyhow::{Context, Result, bail, ensure};
use overtile_core::{
	GridExtent, LevelGeometry, PyramidError, TileAggregate, TileCoord, progress::ProgressTrait, resolve_block_params,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for synthesizing an overview level from a source level.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BuildOptions {
	/// Factor by which the source pixel size is scaled; 2.0 gives the usual
	/// power-of-two pyramid.
	pub scale_factor: f64,
}

impl Default for BuildOptions {
	fn default() -> Self {
		BuildOptions { scale_factor: 2.0 }
	}
}

/// One source tile handed to the resampling collaborator.
#[derive(Clone, Debug)]
pub struct SourceTile {
	pub coord: TileCoord,
	/// World extent of the tile, derived from the source level grid.
	pub extent: GridExtent,
	/// Pixel payload, pixel-interleaved, a full (unclipped) block.
	pub data: Vec<u8>,
}

/// The target tile a resampling call must produce.
#[derive(Clone, Copy, Debug)]
pub struct TargetBlock<'a> {
	pub coord: TileCoord,
	/// World extent of the target tile (unclipped).
	pub extent: GridExtent,
	/// Geometry of the level being built.
	pub geometry: &'a LevelGeometry,
}

/// The caller-supplied resampling function. The manager decides which tiles
/// to synthesize and from which inputs; the pixel math is opaque to it.
/// The returned payload must be a full block of the target geometry.
pub type ResampleFn = dyn Fn(&[SourceTile], &TargetBlock) -> Result<Vec<u8>> + Send + Sync;

impl Pyramid {
	/// Synthesize one overview level from `source_index`.
	///
	/// The target pixel size is the source pixel size scaled by
	/// `options.scale_factor`; block shape, band count and pixel type are
	/// inherited from the source level. For every target tile the
	/// overlapping source tiles are fetched and handed to `resample`;
	/// target tiles without any source tile are skipped (sparse regions
	/// stay sparse).
	///
	/// The level is committed atomically: either every produced tile plus
	/// the level metadata row become visible, or the pyramid keeps its
	/// pre-call state (on failure or cancellation at any tile boundary).
	/// Progress is reported tile by tile; a cancelling progress sink
	/// aborts the build with [`PyramidError::Cancelled`] before anything is
	/// written.
	///
	/// Returns the index of the new level after re-discovery.
	pub async fn build_level(
		&mut self,
		source_index: usize,
		options: &BuildOptions,
		resample: &ResampleFn,
		progress: &mut dyn ProgressTrait,
	) -> Result<usize> {
		let source = *self.level(source_index)?;
		ensure!(
			source.kind == LevelKind::Pixels,
			"level {source_index} is point-derived and cannot be resampled"
		);
		self.validate_pixel_level(source_index)?;

		// Resolve the target geometry before any I/O.
		let target = source.geometry.coarser(options.scale_factor)?;
		let params = resolve_block_params(
			self.extent(),
			target.pixel_size_x,
			target.pixel_size_y,
			Some(&source.geometry),
		)?;
		debug_assert_eq!(params.block_width, target.block_width);
		self.ensure_new_resolution(&target)?;

		let _guard = self.begin_build(&target)?;
		let source_label = source_index as u8;
		let target_label = self.levels.len() as u8;
		let bbox = target.tile_bbox(target_label);

		log::debug!(
			"build level at pixel size ({}, {}): {} candidate tiles",
			target.pixel_size_x,
			target.pixel_size_y,
			bbox.count_tiles()
		);
		progress.init("building overview level", bbox.count_tiles());

		let mut staged: Vec<StagedTile> = Vec::new();
		for coord in bbox.iter_coords() {
			if progress.is_cancelled() {
				log::debug!("build cancelled at tile {coord:?}; nothing was written");
				bail!(PyramidError::Cancelled);
			}

			let tile_extent = target.tile_extent(coord.col, coord.row);
			let Some(clipped) = tile_extent.intersection(self.extent()) else {
				progress.inc(1);
				continue;
			};
			let Some(source_range) = source.geometry.tiles_overlapping(source_label, &clipped) else {
				progress.inc(1);
				continue;
			};

			let mut sources = Vec::new();
			for (source_coord, payload) in self.store().tiles_in_range(source.record_id, &source_range)? {
				let TilePayload::Pixels(data) = payload else {
					bail!(PyramidError::InconsistentLevel(format!(
						"pixel level {source_index} stores an aggregate tile at {source_coord:?}"
					)));
				};
				sources.push(SourceTile {
					coord: source_coord,
					extent: source.geometry.tile_extent(source_coord.col, source_coord.row),
					data,
				});
			}
			if sources.is_empty() {
				progress.inc(1);
				continue;
			}

			let block = TargetBlock {
				coord,
				extent: tile_extent,
				geometry: &target,
			};
			let data = resample(&sources, &block).with_context(|| format!("resampling tile {coord:?}"))?;
			if data.len() != target.payload_len() {
				bail!(PyramidError::InconsistentLevel(format!(
					"resampler produced {} bytes for tile {coord:?}, expected {}",
					data.len(),
					target.payload_len()
				)));
			}
			staged.push(StagedTile {
				coord,
				payload: TilePayload::Pixels(data),
			});
			progress.inc(1);
		}

		if progress.is_cancelled() {
			log::debug!("build cancelled before commit; nothing was written");
			bail!(PyramidError::Cancelled);
		}

		self.store().commit_level(&target, LevelKind::Pixels, &staged)?;
		progress.finish();

		self.reload()?;
		self
			.find_level(target.pixel_size_x, target.pixel_size_y)
			.context("freshly built level missing after reload")
	}

	/// Materialize a level from pre-produced pixel payloads, e.g. when
	/// seeding the base level of a new pyramid. Every payload must be a
	/// full block of `geometry`.
	///
	/// Commits atomically like [`build_level`](Self::build_level) and
	/// returns the index of the new level.
	pub async fn materialize_pixel_level(
		&mut self,
		geometry: LevelGeometry,
		tiles: &BTreeMap<(i64, i64), Vec<u8>>,
	) -> Result<usize> {
		self.ensure_new_resolution(&geometry)?;
		let _guard = self.begin_build(&geometry)?;

		let bbox = geometry.tile_bbox(self.levels.len() as u8);
		let mut staged = Vec::with_capacity(tiles.len());
		for (&(col, row), data) in tiles {
			let coord = TileCoord::new(bbox.level, col, row);
			ensure!(bbox.contains(&coord), "tile {coord:?} lies outside the level grid");
			if data.len() != geometry.payload_len() {
				bail!(PyramidError::InconsistentLevel(format!(
					"payload of {} bytes for tile {coord:?} does not match the declared {}",
					data.len(),
					geometry.payload_len()
				)));
			}
			staged.push(StagedTile {
				coord,
				payload: TilePayload::Pixels(data.clone()),
			});
		}

		self.store().commit_level(&geometry, LevelKind::Pixels, &staged)?;
		self.reload()?;
		self
			.find_level(geometry.pixel_size_x, geometry.pixel_size_y)
			.context("freshly materialized level missing after reload")
	}

	/// Materialize a point-derived level from per-tile aggregates, the
	/// output of one spatial classification pass. Empty aggregates are
	/// skipped.
	pub async fn materialize_point_level(
		&mut self,
		geometry: LevelGeometry,
		tiles: &BTreeMap<(i64, i64), TileAggregate>,
	) -> Result<usize> {
		self.ensure_new_resolution(&geometry)?;
		let _guard = self.begin_build(&geometry)?;

		let bbox = geometry.tile_bbox(self.levels.len() as u8);
		let mut staged = Vec::with_capacity(tiles.len());
		for (&(col, row), aggregate) in tiles {
			if aggregate.is_empty() {
				continue;
			}
			let coord = TileCoord::new(bbox.level, col, row);
			ensure!(bbox.contains(&coord), "tile {coord:?} lies outside the level grid");
			staged.push(StagedTile {
				coord,
				payload: TilePayload::Points(*aggregate),
			});
		}

		self.store().commit_level(&geometry, LevelKind::Points, &staged)?;
		self.reload()?;
		self
			.find_level(geometry.pixel_size_x, geometry.pixel_size_y)
			.context("freshly materialized level missing after reload")
	}

	fn ensure_new_resolution(&self, geometry: &LevelGeometry) -> Result<()> {
		if let Some(existing) = self.find_level(geometry.pixel_size_x, geometry.pixel_size_y) {
			bail!(
				"a level with pixel size ({}, {}) already exists at index {existing}; clean it before rebuilding",
				geometry.pixel_size_x,
				geometry.pixel_size_y
			);
		}
		Ok(())
	}
}
