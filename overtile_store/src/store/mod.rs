//! The backing SQLite tile store.
//!
//! One database holds one pyramid: a `metadata` table with the dataset
//! extent, a `levels` table with one row per materialized resolution level,
//! and a `tiles` table with one row per `(level, column, row)`. Tile rows
//! carry either a raw pixel payload (`tile_data`) or point aggregate columns
//! (`point_count`, `min_x` .. `max_y`), never both.
//!
//! The store provides exactly the four capabilities the pyramid manager
//! needs: enumerating stored resolutions, querying tiles by coordinate
//! range, deleting levels, and committing a complete level (tiles plus its
//! metadata row) in one transaction. That last capability is the
//! durability point of "materialize": a level either appears with all of
//! its tiles or not at all, and a crash mid-commit leaves the previous
//! state observable.
//!
//! Concurrent writers from multiple processes are not supported; SQLite
//! locking errors surface as [`PyramidError::StoreIo`].

mod records;

pub use records::*;

use anyhow::{Context, Result, bail, ensure};
use overtile_core::{GridExtent, LevelGeometry, PixelType, PyramidError, TileAggregate, TileBBox, TileCoord};
use r2d2::Pool;
use r2d2_sqlite::{
	SqliteConnectionManager,
	rusqlite::{OptionalExtension, params},
};
use std::path::{Path, PathBuf};

/// A pooled connection to one pyramid database.
pub struct TileStore {
	path: PathBuf,
	extent: GridExtent,
	pool: Pool<SqliteConnectionManager>,
}

impl TileStore {
	/// Create a new, empty pyramid database at `path`, replacing any
	/// existing file, and record the dataset extent.
	///
	/// # Errors
	/// Returns an error if the file cannot be replaced or the schema cannot
	/// be written.
	pub fn create_path(path: &Path, extent: GridExtent) -> Result<TileStore> {
		log::debug!("create tile store at {path:?}");

		if path.exists() {
			std::fs::remove_file(path).with_context(|| format!("replacing existing store {path:?}"))?;
		}
		let pool = Self::connect(path)?;

		let conn = pool.get().map_err(PyramidError::store_io)?;
		conn
			.execute_batch(
				"CREATE TABLE metadata (name TEXT, value TEXT, UNIQUE (name));
				CREATE TABLE levels (
					level_id INTEGER PRIMARY KEY,
					pixel_size_x REAL NOT NULL,
					pixel_size_y REAL NOT NULL,
					block_width INTEGER NOT NULL,
					block_height INTEGER NOT NULL,
					band_count INTEGER NOT NULL,
					pixel_type TEXT NOT NULL,
					kind TEXT NOT NULL,
					UNIQUE (pixel_size_x, pixel_size_y));
				CREATE TABLE tiles (
					level_id INTEGER NOT NULL,
					tile_column INTEGER NOT NULL,
					tile_row INTEGER NOT NULL,
					tile_data BLOB,
					point_count INTEGER,
					min_x REAL,
					min_y REAL,
					max_x REAL,
					max_y REAL,
					UNIQUE (level_id, tile_column, tile_row));
				CREATE INDEX tile_index ON tiles (level_id, tile_column, tile_row);",
			)
			.map_err(PyramidError::store_io)?;
		conn
			.execute(
				"INSERT INTO metadata (name, value) VALUES ('extent', ?1)",
				params![format!("{} {} {} {}", extent.x_min, extent.y_min, extent.x_max, extent.y_max)],
			)
			.map_err(PyramidError::store_io)?;
		drop(conn);

		Ok(TileStore {
			path: path.to_path_buf(),
			extent,
			pool,
		})
	}

	/// Open an existing pyramid database.
	///
	/// # Errors
	/// Returns an error if the file does not exist or the extent metadata is
	/// missing or unreadable.
	pub fn open_path(path: &Path) -> Result<TileStore> {
		log::debug!("open tile store at {path:?}");

		ensure!(path.exists(), "store {path:?} does not exist");
		let pool = Self::connect(path)?;

		let conn = pool.get().map_err(PyramidError::store_io)?;
		let value: Option<String> = conn
			.query_row("SELECT value FROM metadata WHERE name = 'extent'", [], |row| row.get(0))
			.optional()
			.map_err(PyramidError::store_io)?;
		drop(conn);

		let Some(value) = value else {
			bail!(PyramidError::CorruptPyramid(format!(
				"store {path:?} has no extent metadata"
			)));
		};
		let bounds = value
			.split_whitespace()
			.map(str::parse::<f64>)
			.collect::<Result<Vec<f64>, _>>()
			.with_context(|| format!("parsing extent metadata '{value}'"))?;
		if bounds.len() != 4 {
			bail!(PyramidError::CorruptPyramid(format!(
				"extent metadata '{value}' must hold four numbers"
			)));
		}
		let extent = GridExtent::new(bounds[0], bounds[1], bounds[2], bounds[3])?;

		Ok(TileStore {
			path: path.to_path_buf(),
			extent,
			pool,
		})
	}

	fn connect(path: &Path) -> Result<Pool<SqliteConnectionManager>> {
		let manager = SqliteConnectionManager::file(path);
		Pool::builder()
			.max_size(10)
			.build(manager)
			.map_err(|e| PyramidError::store_io(e).into())
	}

	pub fn extent(&self) -> &GridExtent {
		&self.extent
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// All level metadata rows, ordered finest to coarsest by x pixel size.
	pub fn list_level_records(&self) -> Result<Vec<LevelRecord>> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let mut stmt = conn
			.prepare(
				"SELECT level_id, pixel_size_x, pixel_size_y, block_width, block_height, band_count, pixel_type, kind
				FROM levels ORDER BY pixel_size_x, pixel_size_y",
			)
			.map_err(PyramidError::store_io)?;
		let rows = stmt
			.query_map([], |row| {
				Ok((
					row.get::<_, i64>(0)?,
					row.get::<_, f64>(1)?,
					row.get::<_, f64>(2)?,
					row.get::<_, u32>(3)?,
					row.get::<_, u32>(4)?,
					row.get::<_, u8>(5)?,
					row.get::<_, String>(6)?,
					row.get::<_, String>(7)?,
				))
			})
			.map_err(PyramidError::store_io)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(PyramidError::store_io)?;

		let mut records = Vec::with_capacity(rows.len());
		for (level_id, px, py, block_width, block_height, band_count, pixel_type, kind) in rows {
			let geometry = LevelGeometry::new(
				self.extent,
				px,
				py,
				block_width,
				block_height,
				band_count,
				PixelType::parse_str(&pixel_type)?,
			)
			.map_err(|e| PyramidError::CorruptPyramid(format!("level {level_id}: {e}")))?;
			records.push(LevelRecord {
				level_id,
				geometry,
				kind: LevelKind::parse_str(&kind)?,
			});
		}
		Ok(records)
	}

	/// Identifiers referenced by tiles but missing from the `levels` table.
	/// These come from external tampering; they are reported by discovery
	/// and never exposed as levels.
	pub fn orphan_level_ids(&self) -> Result<Vec<i64>> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let mut stmt = conn
			.prepare(
				"SELECT DISTINCT level_id FROM tiles
				WHERE level_id NOT IN (SELECT level_id FROM levels) ORDER BY level_id",
			)
			.map_err(PyramidError::store_io)?;
		let ids = stmt
			.query_map([], |row| row.get::<_, i64>(0))
			.map_err(PyramidError::store_io)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(PyramidError::store_io)?;
		Ok(ids)
	}

	/// Distinct pixel payload sizes observed in one level's tiles.
	pub fn distinct_payload_sizes(&self, level_id: i64) -> Result<Vec<usize>> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let mut stmt = conn
			.prepare("SELECT DISTINCT LENGTH(tile_data) FROM tiles WHERE level_id = ?1 AND tile_data IS NOT NULL")
			.map_err(PyramidError::store_io)?;
		let sizes = stmt
			.query_map(params![level_id], |row| row.get::<_, i64>(0))
			.map_err(PyramidError::store_io)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(PyramidError::store_io)?;
		Ok(sizes.into_iter().map(|s| s as usize).collect())
	}

	/// Number of tiles stored for one level.
	pub fn tile_count(&self, level_id: i64) -> Result<u64> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let count: i64 = conn
			.query_row("SELECT COUNT(*) FROM tiles WHERE level_id = ?1", params![level_id], |row| {
				row.get(0)
			})
			.map_err(PyramidError::store_io)?;
		Ok(count as u64)
	}

	/// Fetch a single tile. Returns `Ok(None)` when the tile is not present.
	pub fn get_tile(&self, level_id: i64, col: i64, row: i64) -> Result<Option<TilePayload>> {
		log::trace!("read tile ({col}, {row}) of level {level_id}");

		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let mut stmt = conn
			.prepare(
				"SELECT tile_data, point_count, min_x, min_y, max_x, max_y FROM tiles
				WHERE level_id = ?1 AND tile_column = ?2 AND tile_row = ?3",
			)
			.map_err(PyramidError::store_io)?;
		let raw = stmt
			.query_row(params![level_id, col, row], |r| {
				Ok((
					r.get::<_, Option<Vec<u8>>>(0)?,
					r.get::<_, Option<i64>>(1)?,
					r.get::<_, Option<f64>>(2)?,
					r.get::<_, Option<f64>>(3)?,
					r.get::<_, Option<f64>>(4)?,
					r.get::<_, Option<f64>>(5)?,
				))
			})
			.optional()
			.map_err(PyramidError::store_io)?;

		raw.map(|r| Self::payload_from_row(level_id, col, row, r)).transpose()
	}

	/// All tiles of one level within an inclusive column/row range, in
	/// row-major order. The minted coordinates carry `range.level`.
	pub fn tiles_in_range(&self, level_id: i64, range: &TileBBox) -> Result<Vec<(TileCoord, TilePayload)>> {
		log::trace!("read tiles of level {level_id} in {range:?}");

		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		let mut stmt = conn
			.prepare(
				"SELECT tile_column, tile_row, tile_data, point_count, min_x, min_y, max_x, max_y FROM tiles
				WHERE level_id = ?1 AND tile_column >= ?2 AND tile_column <= ?3 AND tile_row >= ?4 AND tile_row <= ?5
				ORDER BY tile_row, tile_column",
			)
			.map_err(PyramidError::store_io)?;
		let rows = stmt
			.query_map(
				params![level_id, range.col_min, range.col_max, range.row_min, range.row_max],
				|r| {
					Ok((
						r.get::<_, i64>(0)?,
						r.get::<_, i64>(1)?,
						(
							r.get::<_, Option<Vec<u8>>>(2)?,
							r.get::<_, Option<i64>>(3)?,
							r.get::<_, Option<f64>>(4)?,
							r.get::<_, Option<f64>>(5)?,
							r.get::<_, Option<f64>>(6)?,
							r.get::<_, Option<f64>>(7)?,
						),
					))
				},
			)
			.map_err(PyramidError::store_io)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(PyramidError::store_io)?;

		let mut tiles = Vec::with_capacity(rows.len());
		for (col, row, raw) in rows {
			tiles.push((
				TileCoord::new(range.level, col, row),
				Self::payload_from_row(level_id, col, row, raw)?,
			));
		}
		Ok(tiles)
	}

	#[allow(clippy::type_complexity)]
	fn payload_from_row(
		level_id: i64,
		col: i64,
		row: i64,
		raw: (
			Option<Vec<u8>>,
			Option<i64>,
			Option<f64>,
			Option<f64>,
			Option<f64>,
			Option<f64>,
		),
	) -> Result<TilePayload> {
		match raw {
			(Some(data), None, ..) => Ok(TilePayload::Pixels(data)),
			(None, Some(count), Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
				Ok(TilePayload::Points(TileAggregate {
					count: count as u64,
					min: [min_x, min_y],
					max: [max_x, max_y],
				}))
			}
			_ => bail!(PyramidError::CorruptPyramid(format!(
				"tile ({col}, {row}) of level {level_id} carries neither a pixel payload nor a complete aggregate"
			))),
		}
	}

	/// Commit a complete level in one transaction: the metadata row plus all
	/// of its tiles. Returns the new level identifier.
	///
	/// Nothing of the level is observable until the transaction commits; an
	/// interruption at any point rolls back to the previous state.
	pub fn commit_level(&self, geometry: &LevelGeometry, kind: LevelKind, tiles: &[StagedTile]) -> Result<i64> {
		log::debug!("commit {kind:?} level with {} tiles: {geometry:?}", tiles.len());

		let mut conn = self.pool.get().map_err(PyramidError::store_io)?;
		let tx = conn.transaction().map_err(PyramidError::store_io)?;
		tx.execute(
			"INSERT INTO levels (pixel_size_x, pixel_size_y, block_width, block_height, band_count, pixel_type, kind)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
			params![
				geometry.pixel_size_x,
				geometry.pixel_size_y,
				geometry.block_width,
				geometry.block_height,
				geometry.band_count,
				geometry.pixel_type.as_str(),
				kind.as_str()
			],
		)
		.map_err(PyramidError::store_io)?;
		let level_id = tx.last_insert_rowid();

		{
			let mut stmt = tx
				.prepare(
					"INSERT INTO tiles (level_id, tile_column, tile_row, tile_data, point_count, min_x, min_y, max_x, max_y)
					VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
				)
				.map_err(PyramidError::store_io)?;
			for tile in tiles {
				match &tile.payload {
					TilePayload::Pixels(data) => stmt
						.execute(params![
							level_id,
							tile.coord.col,
							tile.coord.row,
							data,
							None::<i64>,
							None::<f64>,
							None::<f64>,
							None::<f64>,
							None::<f64>
						])
						.map_err(PyramidError::store_io)?,
					TilePayload::Points(agg) => stmt
						.execute(params![
							level_id,
							tile.coord.col,
							tile.coord.row,
							None::<Vec<u8>>,
							agg.count as i64,
							agg.min[0],
							agg.min[1],
							agg.max[0],
							agg.max[1]
						])
						.map_err(PyramidError::store_io)?,
				};
			}
		}

		tx.commit().map_err(PyramidError::store_io)?;
		Ok(level_id)
	}

	/// Delete the given levels, tiles and metadata rows both, in one
	/// transaction.
	pub fn delete_levels(&self, level_ids: &[i64]) -> Result<()> {
		log::debug!("delete levels {level_ids:?}");

		let mut conn = self.pool.get().map_err(PyramidError::store_io)?;
		let tx = conn.transaction().map_err(PyramidError::store_io)?;
		for level_id in level_ids {
			tx.execute("DELETE FROM tiles WHERE level_id = ?1", params![level_id])
				.map_err(PyramidError::store_io)?;
			tx.execute("DELETE FROM levels WHERE level_id = ?1", params![level_id])
				.map_err(PyramidError::store_io)?;
		}
		tx.commit().map_err(PyramidError::store_io)?;
		Ok(())
	}

	/// Insert a raw tile row outside any level commit, simulating external
	/// tampering. Exists for tests of discovery and consistency reporting.
	#[doc(hidden)]
	pub fn inject_tile(&self, level_id: i64, col: i64, row: i64, data: &[u8]) -> Result<()> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		conn
			.execute(
				"INSERT INTO tiles (level_id, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
				params![level_id, col, row, data],
			)
			.map_err(PyramidError::store_io)?;
		Ok(())
	}

	/// Insert a raw level metadata row outside any level commit, simulating
	/// external tampering. Exists for tests of discovery validation.
	#[doc(hidden)]
	pub fn inject_level_row(&self, geometry: &LevelGeometry, kind: LevelKind) -> Result<i64> {
		let conn = self.pool.get().map_err(PyramidError::store_io)?;
		conn
			.execute(
				"INSERT INTO levels (pixel_size_x, pixel_size_y, block_width, block_height, band_count, pixel_type, kind)
				VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
				params![
					geometry.pixel_size_x,
					geometry.pixel_size_y,
					geometry.block_width,
					geometry.block_height,
					geometry.band_count,
					geometry.pixel_type.as_str(),
					kind.as_str()
				],
			)
			.map_err(PyramidError::store_io)?;
		Ok(conn.last_insert_rowid())
	}
}

impl std::fmt::Debug for TileStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TileStore")
			.field("path", &self.path)
			.field("extent", &self.extent)
			.finish()
	}
}
