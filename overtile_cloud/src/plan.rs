//! Planning the level stack of a point-derived pyramid.

use anyhow::{Result, ensure};
use overtile_core::{GridExtent, LevelGeometry, PixelType};

/// Bands of an aggregate level: point count, minimum x/y, maximum x/y.
pub const AGGREGATE_BAND_COUNT: u8 = 5;

/// Derive the resolution levels of a point-derived pyramid.
///
/// Starting at `base_pixel_size`, the pixel size (and with it the tile
/// world size) doubles per level until a single tile covers the extent
/// along both axes, so the coarsest level always answers a whole-dataset
/// query with one tile. All levels share square blocks of `block_size`
/// pixels and the five [`f64`] aggregate bands.
///
/// Returns the levels ordered finest to coarsest.
///
/// # Examples
///
/// ```
/// use overtile_cloud::plan_levels;
/// use overtile_core::GridExtent;
///
/// let extent = GridExtent::new(0.0, 0.0, 10.0, 10.0).unwrap();
/// let levels = plan_levels(&extent, 0.1, 10).unwrap();
/// assert_eq!(levels.len(), 5);
/// assert_eq!(levels[0].columns(), 10);
/// assert_eq!(levels.last().unwrap().columns(), 1);
/// ```
pub fn plan_levels(extent: &GridExtent, base_pixel_size: f64, block_size: u32) -> Result<Vec<LevelGeometry>> {
	let base = LevelGeometry::new(
		*extent,
		base_pixel_size,
		base_pixel_size,
		block_size,
		block_size,
		AGGREGATE_BAND_COUNT,
		PixelType::F64,
	)?;

	let mut levels = vec![base];
	loop {
		let last = levels[levels.len() - 1];
		if last.columns() <= 1 && last.rows() <= 1 {
			break;
		}
		ensure!(levels.len() < 64, "level planning did not converge");
		levels.push(last.coarser(2.0)?);
	}

	log::debug!(
		"planned {} levels from pixel size {base_pixel_size} over {extent:?}",
		levels.len()
	);
	Ok(levels)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn doubles_until_one_tile_covers_the_extent() {
		let extent = GridExtent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		let levels = plan_levels(&extent, 0.1, 10).unwrap();

		let shapes: Vec<(u32, u32)> = levels.iter().map(|l| (l.columns(), l.rows())).collect();
		assert_eq!(shapes, vec![(10, 10), (5, 5), (3, 3), (2, 2), (1, 1)]);

		let sizes: Vec<f64> = levels.iter().map(|l| l.pixel_size_x).collect();
		assert!(sizes.windows(2).all(|w| w[1] == w[0] * 2.0));
		assert!(levels.iter().all(|l| l.band_count == AGGREGATE_BAND_COUNT));
	}

	#[test]
	fn elongated_extents_converge_on_both_axes() {
		let extent = GridExtent::new(0.0, 0.0, 100.0, 5.0).unwrap();
		let levels = plan_levels(&extent, 1.0, 4).unwrap();
		let last = levels.last().unwrap();
		assert_eq!((last.columns(), last.rows()), (1, 1));
	}

	#[test]
	fn single_tile_dataset_needs_one_level() {
		let extent = GridExtent::new(0.0, 0.0, 1.0, 1.0).unwrap();
		let levels = plan_levels(&extent, 0.5, 2).unwrap();
		assert_eq!(levels.len(), 1);
	}

	#[test]
	fn invalid_base_pixel_size_is_rejected() {
		let extent = GridExtent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		assert!(plan_levels(&extent, 0.0, 10).is_err());
		assert!(plan_levels(&extent, -1.0, 10).is_err());
	}
}
