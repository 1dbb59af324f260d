//! Tile-aligned bounding boxes for a single resolution level.

use crate::{PyramidError, TileCoord};
use anyhow::{Result, bail};
use std::fmt::Debug;

/// An inclusive rectangle of tile coordinates at one resolution level.
///
/// Both corners are inclusive: a bbox with `col_min == col_max` is one tile
/// wide. Unlike the transient coordinates produced during classification,
/// a `TileBBox` always addresses tiles inside a level's grid, so emptiness
/// is represented by `None` at the API level rather than by inverted bounds.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct TileBBox {
	pub level: u8,
	pub col_min: i64,
	pub row_min: i64,
	pub col_max: i64,
	pub row_max: i64,
}

impl TileBBox {
	/// Create a bbox from inclusive corners.
	///
	/// # Errors
	/// Returns [`PyramidError::InvalidGeometry`] if a minimum exceeds its maximum.
	pub fn new(level: u8, col_min: i64, row_min: i64, col_max: i64, row_max: i64) -> Result<TileBBox> {
		if col_max < col_min || row_max < row_min {
			bail!(PyramidError::InvalidGeometry(format!(
				"tile bbox ({col_min}, {row_min}, {col_max}, {row_max}) is inverted"
			)));
		}
		Ok(TileBBox {
			level,
			col_min,
			row_min,
			col_max,
			row_max,
		})
	}

	pub fn width(&self) -> u64 {
		(self.col_max - self.col_min + 1) as u64
	}

	pub fn height(&self) -> u64 {
		(self.row_max - self.row_min + 1) as u64
	}

	/// Number of tiles covered by this bbox.
	pub fn count_tiles(&self) -> u64 {
		self.width() * self.height()
	}

	pub fn contains(&self, coord: &TileCoord) -> bool {
		coord.level == self.level
			&& coord.col >= self.col_min
			&& coord.col <= self.col_max
			&& coord.row >= self.row_min
			&& coord.row <= self.row_max
	}

	/// Intersection with another bbox of the same level, `None` if disjoint.
	pub fn intersection(&self, other: &TileBBox) -> Option<TileBBox> {
		if self.level != other.level {
			return None;
		}
		let col_min = self.col_min.max(other.col_min);
		let row_min = self.row_min.max(other.row_min);
		let col_max = self.col_max.min(other.col_max);
		let row_max = self.row_max.min(other.row_max);
		if col_max < col_min || row_max < row_min {
			return None;
		}
		Some(TileBBox {
			level: self.level,
			col_min,
			row_min,
			col_max,
			row_max,
		})
	}

	/// Iterate all coordinates in row-major order (top row first).
	pub fn iter_coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
		let level = self.level;
		(self.row_min..=self.row_max)
			.flat_map(move |row| (self.col_min..=self.col_max).map(move |col| TileCoord::new(level, col, row)))
	}
}

impl Debug for TileBBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_fmt(format_args!(
			"{}: [{},{},{},{}] ({}x{})",
			self.level,
			self.col_min,
			self.row_min,
			self.col_max,
			self.row_max,
			self.width(),
			self.height()
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_and_counts() {
		let bbox = TileBBox::new(2, 0, 0, 3, 1).unwrap();
		assert_eq!(bbox.width(), 4);
		assert_eq!(bbox.height(), 2);
		assert_eq!(bbox.count_tiles(), 8);
		assert_eq!(format!("{bbox:?}"), "2: [0,0,3,1] (4x2)");
	}

	#[test]
	fn rejects_inverted() {
		assert!(TileBBox::new(0, 3, 0, 2, 0).is_err());
		assert!(TileBBox::new(0, 0, 3, 0, 2).is_err());
	}

	#[test]
	fn contains() {
		let bbox = TileBBox::new(1, -1, -1, 1, 1).unwrap();
		assert!(bbox.contains(&TileCoord::new(1, 0, 0)));
		assert!(bbox.contains(&TileCoord::new(1, -1, 1)));
		assert!(!bbox.contains(&TileCoord::new(1, 2, 0)));
		assert!(!bbox.contains(&TileCoord::new(2, 0, 0)));
	}

	#[test]
	fn intersection() {
		let a = TileBBox::new(0, 0, 0, 4, 4).unwrap();
		let b = TileBBox::new(0, 3, 3, 8, 8).unwrap();
		assert_eq!(a.intersection(&b), Some(TileBBox::new(0, 3, 3, 4, 4).unwrap()));

		let c = TileBBox::new(0, 5, 0, 6, 4).unwrap();
		assert_eq!(a.intersection(&c), None);

		let d = TileBBox::new(1, 0, 0, 4, 4).unwrap();
		assert_eq!(a.intersection(&d), None);
	}

	#[test]
	fn iteration_is_row_major() {
		let bbox = TileBBox::new(0, 0, 0, 1, 1).unwrap();
		let coords: Vec<TileCoord> = bbox.iter_coords().collect();
		assert_eq!(
			coords,
			vec![
				TileCoord::new(0, 0, 0),
				TileCoord::new(0, 1, 0),
				TileCoord::new(0, 0, 1),
				TileCoord::new(0, 1, 1),
			]
		);
	}
}
