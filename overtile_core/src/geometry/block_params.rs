//! Block parameter resolution for existing and to-be-synthesized levels.

use crate::{GridExtent, LevelGeometry, PixelType, PyramidError, infer_band_params};
use anyhow::{Result, bail};

/// Block shape used when no source level dictates one.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Resolved block parameters of one resolution level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockParams {
	pub band_count: u8,
	pub pixel_type: PixelType,
	pub block_width: u32,
	pub block_height: u32,
}

impl BlockParams {
	pub fn of(geometry: &LevelGeometry) -> BlockParams {
		BlockParams {
			band_count: geometry.band_count,
			pixel_type: geometry.pixel_type,
			block_width: geometry.block_width,
			block_height: geometry.block_height,
		}
	}
}

/// Resolve the block parameters of a level at the requested pixel size.
///
/// Block shape, band count and pixel type are inherited from `source` (the
/// designated source level when synthesizing, or the base level when
/// declaring a new pyramid); without a source, defaults of one `u8` band in
/// [`DEFAULT_BLOCK_SIZE`]-square blocks apply.
///
/// Validation happens before any I/O: pixel sizes must be strictly positive
/// finite numbers and the resulting grid must contain at least one column
/// and one row, otherwise [`PyramidError::InvalidGeometry`] is returned.
/// Fractional tile counts round up; the partial tile at the extent's high
/// edge is clipped on read.
pub fn resolve_block_params(
	extent: &GridExtent,
	pixel_size_x: f64,
	pixel_size_y: f64,
	source: Option<&LevelGeometry>,
) -> Result<BlockParams> {
	let (block_width, block_height, band_count, pixel_type) = match source {
		Some(s) => (s.block_width, s.block_height, s.band_count, s.pixel_type),
		None => (DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_SIZE, 1, PixelType::U8),
	};
	let geometry = LevelGeometry::new(
		*extent,
		pixel_size_x,
		pixel_size_y,
		block_width,
		block_height,
		band_count,
		pixel_type,
	)?;
	Ok(BlockParams::of(&geometry))
}

/// Resolve band count and pixel type of an *existing* level from the payload
/// sizes its stored tiles were observed with.
///
/// Levels must be structurally uniform: every payload must imply the same
/// `(band_count, pixel_type)` pair, otherwise the level is rejected with
/// [`PyramidError::InconsistentLevel`].
pub fn resolve_observed_params(
	payload_sizes: &[usize],
	block_width: u32,
	block_height: u32,
	hint: Option<PixelType>,
) -> Result<(u8, PixelType)> {
	let Some(first) = payload_sizes.first() else {
		bail!(PyramidError::InconsistentLevel(
			"cannot infer band parameters from a level without tiles".to_string()
		));
	};
	let params = infer_band_params(*first, block_width, block_height, hint)?;
	for size in &payload_sizes[1..] {
		let other = infer_band_params(*size, block_width, block_height, hint)?;
		if other != params {
			bail!(PyramidError::InconsistentLevel(format!(
				"tiles disagree on band layout: {} bytes imply {:?}, {} bytes imply {:?}",
				first, params, size, other
			)));
		}
	}
	Ok(params)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn extent() -> GridExtent {
		GridExtent::new(0.0, 0.0, 1000.0, 1000.0).unwrap()
	}

	#[test]
	fn defaults_without_source() {
		let params = resolve_block_params(&extent(), 1.0, 1.0, None).unwrap();
		assert_eq!(
			params,
			BlockParams {
				band_count: 1,
				pixel_type: PixelType::U8,
				block_width: DEFAULT_BLOCK_SIZE,
				block_height: DEFAULT_BLOCK_SIZE,
			}
		);
	}

	#[test]
	fn inherits_from_source_level() {
		let source = LevelGeometry::new(extent(), 1.0, 1.0, 128, 64, 3, PixelType::U16).unwrap();
		let params = resolve_block_params(&extent(), 2.0, 2.0, Some(&source)).unwrap();
		assert_eq!(
			params,
			BlockParams {
				band_count: 3,
				pixel_type: PixelType::U16,
				block_width: 128,
				block_height: 64,
			}
		);
	}

	#[test]
	fn rejects_bad_pixel_sizes_before_io() {
		for (px, py) in [(0.0, 1.0), (-2.0, 1.0), (1.0, f64::NAN), (f64::INFINITY, 1.0)] {
			let err = resolve_block_params(&extent(), px, py, None).unwrap_err();
			assert!(matches!(
				err.downcast_ref::<PyramidError>(),
				Some(PyramidError::InvalidGeometry(_))
			));
		}
	}

	#[test]
	fn rejects_zero_row_level() {
		let flat = GridExtent::new(0.0, 5.0, 100.0, 5.0).unwrap();
		assert!(resolve_block_params(&flat, 1.0, 1.0, None).is_err());
	}

	#[test]
	fn observed_params_must_be_uniform() {
		let uniform = [64 * 64 * 3, 64 * 64 * 3];
		assert_eq!(
			resolve_observed_params(&uniform, 64, 64, None).unwrap(),
			(3, PixelType::U8)
		);

		let mixed = [64 * 64 * 3, 64 * 64 * 4];
		let err = resolve_observed_params(&mixed, 64, 64, None).unwrap_err();
		assert!(matches!(
			err.downcast_ref::<PyramidError>(),
			Some(PyramidError::InconsistentLevel(_))
		));

		assert!(resolve_observed_params(&[], 64, 64, None).is_err());
	}
}
