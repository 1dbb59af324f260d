//! Grid-addressed tile coordinates within one resolution level.

use std::fmt::{self, Debug};

/// A tile coordinate: resolution level plus signed column/row indices.
///
/// Columns count rightward from the extent's left edge, rows downward from
/// the extent's top edge (north-up raster convention). Indices are signed so
/// that positions outside the extent floor to negative or past-the-end
/// coordinates instead of wrapping; such coordinates never address a stored
/// tile, they only exist transiently during classification.
///
/// A tile's world extent is fully derived from `(level geometry, col, row)`
/// and is never stored alongside the tile.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct TileCoord {
	/// Index of the resolution level this tile belongs to, 0 = finest.
	pub level: u8,
	/// Column index within the level's tile grid.
	pub col: i64,
	/// Row index within the level's tile grid.
	pub row: i64,
}

impl TileCoord {
	pub fn new(level: u8, col: i64, row: i64) -> TileCoord {
		TileCoord { level, col, row }
	}

	/// Assign a 1-dimensional position to a grid cell by dividing by the cell
	/// size and flooring toward negative infinity.
	///
	/// # Examples
	///
	/// ```
	/// use overtile_core::TileCoord;
	///
	/// assert_eq!(TileCoord::floor_div(4.5, 2.0), 2);
	/// assert_eq!(TileCoord::floor_div(-0.5, 2.0), -1);
	/// assert_eq!(TileCoord::floor_div(0.0, 2.0), 0);
	/// ```
	pub fn floor_div(offset: f64, cell_size: f64) -> i64 {
		(offset / cell_size).floor() as i64
	}
}

/// Custom `Debug` format as `TileCoord(level, [col, row])` for readability.
impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_fmt(format_args!("TileCoord({}, [{}, {}])", &self.level, &self.col, &self.row))
	}
}

/// Lexicographic ordering: first by `level`, then `row`, then `col`.
impl Ord for TileCoord {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self
			.level
			.cmp(&other.level)
			.then(self.row.cmp(&other.row))
			.then(self.col.cmp(&other.col))
	}
}

impl PartialOrd for TileCoord {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn debug_format() {
		assert_eq!(format!("{:?}", TileCoord::new(2, 7, -1)), "TileCoord(2, [7, -1])");
	}

	#[rstest]
	#[case(0.0, 1.0, 0)]
	#[case(0.999, 1.0, 0)]
	#[case(1.0, 1.0, 1)]
	#[case(-0.001, 1.0, -1)]
	#[case(-2.0, 1.0, -2)]
	#[case(7.9, 4.0, 1)]
	#[case(8.0, 4.0, 2)]
	fn floor_division(#[case] offset: f64, #[case] size: f64, #[case] expected: i64) {
		assert_eq!(TileCoord::floor_div(offset, size), expected);
	}

	#[test]
	fn ordering() {
		let mut coords = vec![
			TileCoord::new(1, 0, 0),
			TileCoord::new(0, 5, 5),
			TileCoord::new(0, 1, 0),
			TileCoord::new(0, 0, 1),
		];
		coords.sort();
		assert_eq!(
			coords,
			vec![
				TileCoord::new(0, 1, 0),
				TileCoord::new(0, 0, 1),
				TileCoord::new(0, 5, 5),
				TileCoord::new(1, 0, 0),
			]
		);
	}
}
