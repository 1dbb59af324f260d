//! Record types exchanged with the backing SQLite store.

use anyhow::{Result, bail};
use overtile_core::{LevelGeometry, PyramidError, TileAggregate, TileCoord};

/// What a level's tiles carry: raster pixel payloads or point aggregates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LevelKind {
	Pixels,
	Points,
}

impl LevelKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			LevelKind::Pixels => "pixels",
			LevelKind::Points => "points",
		}
	}

	/// Parse the identifier stored in the `levels` table.
	///
	/// # Errors
	/// Returns [`PyramidError::CorruptPyramid`] for unknown identifiers.
	pub fn parse_str(value: &str) -> Result<LevelKind> {
		Ok(match value {
			"pixels" => LevelKind::Pixels,
			"points" => LevelKind::Points,
			_ => bail!(PyramidError::CorruptPyramid(format!("unknown level kind '{value}'"))),
		})
	}
}

/// One row of the `levels` metadata table, joined with the dataset extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelRecord {
	/// Stable identifier of the level in the store; tiles reference it.
	pub level_id: i64,
	pub geometry: LevelGeometry,
	pub kind: LevelKind,
}

/// The content of one tile record.
#[derive(Clone, Debug, PartialEq)]
pub enum TilePayload {
	/// Raw pixel bytes, pixel-interleaved, always a full (unclipped) block.
	Pixels(Vec<u8>),
	/// Aggregate statistics of the points falling into the tile.
	Points(TileAggregate),
}

/// A tile staged for an atomic level commit.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedTile {
	pub coord: TileCoord,
	pub payload: TilePayload,
}
