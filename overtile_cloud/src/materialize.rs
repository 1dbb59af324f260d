//! Handing classification output to the pyramid manager.

use crate::Classification;
use anyhow::{Context, Result};
use overtile_store::Pyramid;

/// Materialize every level of a classification as a point-derived level of
/// the pyramid.
///
/// Each level commits atomically through the manager's materialization
/// path (aggregate records in place of resampled pixel bytes); a failure
/// while committing one level leaves the previously committed levels valid
/// and the failed one absent.
///
/// Returns the pyramid index of each materialized level, in classification
/// order (finest first).
pub async fn materialize_classification(pyramid: &mut Pyramid, classification: &Classification) -> Result<Vec<usize>> {
	log::debug!("materialize {} point levels", classification.levels.len());

	for level in &classification.levels {
		pyramid
			.materialize_point_level(level.geometry, &level.tiles)
			.await
			.with_context(|| {
				format!(
					"materializing point level at pixel size ({}, {})",
					level.geometry.pixel_size_x, level.geometry.pixel_size_y
				)
			})?;
	}

	// Indices shift as levels are inserted in resolution order; resolve them
	// once the pyramid is complete.
	classification
		.levels
		.iter()
		.map(|level| {
			pyramid
				.find_level(level.geometry.pixel_size_x, level.geometry.pixel_size_y)
				.context("materialized level missing after reload")
		})
		.collect()
}
