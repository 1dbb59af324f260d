//! Per-band pixel data types and payload-size inference.

use crate::PyramidError;
use anyhow::{Result, bail};
use std::fmt::{self, Display};

/// The data type of one raster band sample.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelType {
	U8,
	U16,
	I16,
	U32,
	I32,
	F32,
	F64,
}

impl PixelType {
	/// Size of one sample in bytes.
	pub fn byte_size(&self) -> usize {
		match self {
			PixelType::U8 => 1,
			PixelType::U16 | PixelType::I16 => 2,
			PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
			PixelType::F64 => 8,
		}
	}

	/// Parse the identifier used in the level metadata table.
	///
	/// # Errors
	/// Returns an error for unknown identifiers.
	pub fn parse_str(value: &str) -> Result<PixelType> {
		Ok(match value {
			"u8" => PixelType::U8,
			"u16" => PixelType::U16,
			"i16" => PixelType::I16,
			"u32" => PixelType::U32,
			"i32" => PixelType::I32,
			"f32" => PixelType::F32,
			"f64" => PixelType::F64,
			_ => bail!(PyramidError::InconsistentLevel(format!("unknown pixel type '{value}'"))),
		})
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PixelType::U8 => "u8",
			PixelType::U16 => "u16",
			PixelType::I16 => "i16",
			PixelType::U32 => "u32",
			PixelType::I32 => "i32",
			PixelType::F32 => "f32",
			PixelType::F64 => "f64",
		}
	}
}

impl Display for PixelType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Recover `(band_count, pixel_type)` from a stored tile payload size.
///
/// A payload of `block_width * block_height` cells must divide evenly into
/// bytes per cell; anything else means the tile cannot belong to a uniform
/// level. When a `hint` pixel type is given (the source level's type while
/// resolving a level to synthesize) it is preferred for breaking ties such
/// as 4 bytes/cell = 4 x u8 vs. 1 x f32; without a hint, a fixed preference
/// table mirroring common raster layouts applies.
///
/// # Errors
/// Returns [`PyramidError::InconsistentLevel`] if the payload size does not
/// describe a whole number of bytes per cell, or no known type fits.
pub fn infer_band_params(
	payload_len: usize,
	block_width: u32,
	block_height: u32,
	hint: Option<PixelType>,
) -> Result<(u8, PixelType)> {
	let cells = block_width as usize * block_height as usize;
	if cells == 0 || payload_len == 0 || payload_len % cells != 0 {
		bail!(PyramidError::InconsistentLevel(format!(
			"payload of {payload_len} bytes does not fill {block_width}x{block_height} cells evenly"
		)));
	}
	let bytes_per_cell = payload_len / cells;

	if let Some(hint) = hint {
		let size = hint.byte_size();
		if bytes_per_cell % size == 0 && bytes_per_cell / size <= u8::MAX as usize {
			return Ok(((bytes_per_cell / size) as u8, hint));
		}
	}

	let (bands, pixel_type) = match bytes_per_cell {
		1 => (1, PixelType::U8),
		2 => (1, PixelType::U16),
		3 => (3, PixelType::U8),
		4 => (4, PixelType::U8),
		6 => (3, PixelType::U16),
		8 => (1, PixelType::F64),
		n if n % 8 == 0 && n / 8 <= u8::MAX as usize => ((n / 8) as u8, PixelType::F64),
		n if n % 4 == 0 && n / 4 <= u8::MAX as usize => ((n / 4) as u8, PixelType::F32),
		n if n % 2 == 0 && n / 2 <= u8::MAX as usize => ((n / 2) as u8, PixelType::U16),
		n if n <= u8::MAX as usize => (n as u8, PixelType::U8),
		n => bail!(PyramidError::InconsistentLevel(format!(
			"no band layout fits {n} bytes per cell"
		))),
	};
	Ok((bands, pixel_type))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn string_round_trip() {
		for pt in [
			PixelType::U8,
			PixelType::U16,
			PixelType::I16,
			PixelType::U32,
			PixelType::I32,
			PixelType::F32,
			PixelType::F64,
		] {
			assert_eq!(PixelType::parse_str(pt.as_str()).unwrap(), pt);
		}
		assert!(PixelType::parse_str("u128").is_err());
	}

	#[rstest]
	#[case(256 * 256, 1, PixelType::U8)]
	#[case(256 * 256 * 2, 1, PixelType::U16)]
	#[case(256 * 256 * 3, 3, PixelType::U8)]
	#[case(256 * 256 * 4, 4, PixelType::U8)]
	#[case(256 * 256 * 6, 3, PixelType::U16)]
	#[case(256 * 256 * 8, 1, PixelType::F64)]
	fn inference_without_hint(#[case] len: usize, #[case] bands: u8, #[case] pixel_type: PixelType) {
		assert_eq!(infer_band_params(len, 256, 256, None).unwrap(), (bands, pixel_type));
	}

	#[test]
	fn hint_breaks_ties() {
		// 4 bytes per cell: RGBA by default, one f32 sample with a hint.
		let len = 64 * 64 * 4;
		assert_eq!(infer_band_params(len, 64, 64, None).unwrap(), (4, PixelType::U8));
		assert_eq!(
			infer_band_params(len, 64, 64, Some(PixelType::F32)).unwrap(),
			(1, PixelType::F32)
		);
		assert_eq!(
			infer_band_params(len, 64, 64, Some(PixelType::U16)).unwrap(),
			(2, PixelType::U16)
		);
	}

	#[test]
	fn hint_that_does_not_divide_falls_back() {
		// 3 bytes per cell cannot be u16 samples; the preference table applies.
		let len = 16 * 16 * 3;
		assert_eq!(
			infer_band_params(len, 16, 16, Some(PixelType::U16)).unwrap(),
			(3, PixelType::U8)
		);
	}

	#[test]
	fn uneven_payload_is_inconsistent() {
		let err = infer_band_params(1000, 16, 16, None).unwrap_err();
		assert!(matches!(
			err.downcast_ref::<crate::PyramidError>(),
			Some(crate::PyramidError::InconsistentLevel(_))
		));
		assert!(infer_band_params(0, 16, 16, None).is_err());
	}
}
