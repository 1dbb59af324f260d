//! The overview pyramid manager.
//!
//! A [`Pyramid`] owns the ordered set of resolution levels of one open
//! dataset. Levels live in a plain indexed array and are addressed by
//! index only: level 0 is the finest (base) level, higher indices are
//! coarser overviews. The pyramid is discovered from the backing store on
//! open, synthesized level by level on demand, and dropped as a whole with
//! the dataset instance.

mod builder;

pub use builder::*;

use crate::{LevelKind, LevelRecord, TileStore};
use anyhow::{Result, bail, ensure};
use itertools::Itertools;
use overtile_core::{GridExtent, LevelGeometry, PyramidError, res_close, resolve_observed_params};
use parking_lot::Mutex;
use std::{
	collections::HashSet,
	path::PathBuf,
	sync::Arc,
};

/// One resolution level of a pyramid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
	/// Identifier of the level's metadata row in the store.
	pub record_id: i64,
	pub geometry: LevelGeometry,
	pub kind: LevelKind,
}

/// Result of enumerating the levels present in a store.
#[derive(Debug)]
pub struct Discovery {
	/// Valid levels, ordered finest to coarsest with strictly increasing
	/// pixel sizes.
	pub levels: Vec<Level>,
	/// Level identifiers referenced by tiles without a metadata row.
	/// Produced by external tampering; reported, never exposed as levels.
	pub orphans: Vec<i64>,
}

/// The set of resolution levels of one open dataset.
pub struct Pyramid {
	store: Arc<TileStore>,
	levels: Vec<Level>,
	orphans: Vec<i64>,
	/// Target resolutions with an in-flight build, keyed by pixel size bit
	/// patterns. Guards the one-build-per-level rule.
	builds: Arc<Mutex<HashSet<(u64, u64)>>>,
}

impl Pyramid {
	/// Open a pyramid over a store, discovering the levels already present.
	///
	/// # Errors
	/// Fails with [`PyramidError::CorruptPyramid`] if the stored levels
	/// violate the pyramid invariants (see [`Pyramid::discover`]).
	pub fn open(store: TileStore) -> Result<Pyramid> {
		let store = Arc::new(store);
		let discovery = Self::discover(&store)?;
		Ok(Pyramid {
			store,
			levels: discovery.levels,
			orphans: discovery.orphans,
			builds: Arc::new(Mutex::new(HashSet::new())),
		})
	}

	/// Enumerate the resolution levels present in a store.
	///
	/// Levels are ordered finest to coarsest. Two levels whose pixel sizes
	/// coincide within tolerance are a duplicate resolution and make the
	/// pyramid corrupt, as does a pixel size sequence that is not strictly
	/// increasing along both axes. Orphaned tile groups (tiles whose level
	/// id has no metadata row) are tolerated and reported, not hidden.
	pub fn discover(store: &TileStore) -> Result<Discovery> {
		log::debug!("discover levels in {:?}", store.path());

		let records = store.list_level_records()?;
		for (a, b) in records.iter().tuple_windows() {
			let ga = &a.geometry;
			let gb = &b.geometry;
			if res_close(ga.pixel_size_x, gb.pixel_size_x) && res_close(ga.pixel_size_y, gb.pixel_size_y) {
				let detail = if (ga.block_width, ga.block_height) == (gb.block_width, gb.block_height) {
					"duplicate resolution"
				} else {
					"identical pixel size with differing block geometry"
				};
				bail!(PyramidError::CorruptPyramid(format!(
					"levels {} and {} report {detail} at pixel size ({}, {})",
					a.level_id, b.level_id, ga.pixel_size_x, ga.pixel_size_y
				)));
			}
			if gb.pixel_size_x <= ga.pixel_size_x || gb.pixel_size_y <= ga.pixel_size_y {
				bail!(PyramidError::CorruptPyramid(format!(
					"levels {} and {} are not strictly ordered by pixel size",
					a.level_id, b.level_id
				)));
			}
		}

		let orphans = store.orphan_level_ids()?;
		if !orphans.is_empty() {
			log::warn!("store contains tiles for unknown levels {orphans:?}");
		}

		Ok(Discovery {
			levels: records.into_iter().map(Level::from).collect(),
			orphans,
		})
	}

	/// Re-run discovery after the store has changed.
	pub fn reload(&mut self) -> Result<()> {
		let discovery = Self::discover(&self.store)?;
		self.levels = discovery.levels;
		self.orphans = discovery.orphans;
		Ok(())
	}

	pub fn store(&self) -> &Arc<TileStore> {
		&self.store
	}

	pub fn extent(&self) -> &GridExtent {
		self.store.extent()
	}

	/// All discovered levels, finest first.
	pub fn levels(&self) -> &[Level] {
		&self.levels
	}

	/// Orphaned level ids reported by the last discovery.
	pub fn orphans(&self) -> &[i64] {
		&self.orphans
	}

	/// The level at `index`.
	///
	/// # Errors
	/// Returns [`PyramidError::LevelNotFound`] if no such level exists.
	pub fn level(&self, index: usize) -> Result<&Level> {
		self.levels.get(index).ok_or_else(|| {
			PyramidError::LevelNotFound(format!("level {index} of {} does not exist", self.levels.len())).into()
		})
	}

	/// Find the level matching a resolution, within tolerance.
	pub fn find_level(&self, pixel_size_x: f64, pixel_size_y: f64) -> Option<usize> {
		self
			.levels
			.iter()
			.position(|level| level.geometry.matches_resolution(pixel_size_x, pixel_size_y))
	}

	/// Remove exactly one overview level: all of its tiles plus its
	/// metadata row. Sibling levels are untouched. The base level cannot be
	/// removed through this interface.
	///
	/// # Errors
	/// Returns [`PyramidError::LevelNotFound`] if the level does not exist.
	pub fn clean_level(&mut self, index: usize) -> Result<()> {
		log::debug!("clean level {index}");

		let level = self.level(index)?;
		ensure!(index != 0, "the base level cannot be removed");
		self.store.delete_levels(&[level.record_id])?;
		self.reload()
	}

	/// Remove every non-base level in one transaction. A pyramid holding
	/// only its base level is left unchanged.
	pub fn clean_all_overviews(&mut self) -> Result<()> {
		log::debug!("clean all overviews");

		let ids: Vec<i64> = self.levels.iter().skip(1).map(|level| level.record_id).collect();
		if ids.is_empty() {
			return Ok(());
		}
		self.store.delete_levels(&ids)?;
		self.reload()
	}

	/// The backing objects this pyramid depends on.
	pub fn file_list(&self) -> Vec<PathBuf> {
		vec![self.store.path().to_path_buf()]
	}

	/// Check that a pixel level's stored tiles are structurally uniform:
	/// the band count and pixel type inferred from every observed payload
	/// size must agree with each other and with the level's declaration.
	/// Empty levels are trivially uniform.
	///
	/// # Errors
	/// Returns [`PyramidError::InconsistentLevel`] on any mismatch.
	pub fn validate_pixel_level(&self, index: usize) -> Result<()> {
		let level = self.level(index)?;
		let geometry = &level.geometry;
		let sizes = self.store.distinct_payload_sizes(level.record_id)?;
		if sizes.is_empty() {
			return Ok(());
		}
		let observed = resolve_observed_params(&sizes, geometry.block_width, geometry.block_height, Some(geometry.pixel_type))?;
		if observed != (geometry.band_count, geometry.pixel_type) {
			bail!(PyramidError::InconsistentLevel(format!(
				"level {index} declares {} x {} but its tiles imply {} x {}",
				geometry.band_count, geometry.pixel_type, observed.0, observed.1
			)));
		}
		Ok(())
	}

	/// Register a resolution as being built, enforcing at most one in-flight
	/// build per level. The returned guard releases the slot on drop.
	pub(crate) fn begin_build(&self, geometry: &LevelGeometry) -> Result<BuildGuard> {
		let key = (geometry.pixel_size_x.to_bits(), geometry.pixel_size_y.to_bits());
		ensure!(
			self.builds.lock().insert(key),
			"a build for pixel size ({}, {}) is already in flight",
			geometry.pixel_size_x,
			geometry.pixel_size_y
		);
		Ok(BuildGuard {
			builds: Arc::clone(&self.builds),
			key,
		})
	}
}

impl From<LevelRecord> for Level {
	fn from(record: LevelRecord) -> Level {
		Level {
			record_id: record.level_id,
			geometry: record.geometry,
			kind: record.kind,
		}
	}
}

impl std::fmt::Debug for Pyramid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Pyramid")
			.field("store", &self.store.path())
			.field("levels", &self.levels)
			.finish()
	}
}

/// RAII release of a per-level build slot.
pub(crate) struct BuildGuard {
	builds: Arc<Mutex<HashSet<(u64, u64)>>>,
	key: (u64, u64),
}

impl Drop for BuildGuard {
	fn drop(&mut self) {
		self.builds.lock().remove(&self.key);
	}
}
