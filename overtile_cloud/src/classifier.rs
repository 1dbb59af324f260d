//! The spatial node classifier: one traversal pass per pyramid level.

use crate::SpatialIndexSource;
use anyhow::{Result, bail};
use overtile_core::{LevelGeometry, PyramidError, TileAggregate, progress::ProgressTrait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for a classification pass.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ClassifyOptions {
	/// A visited node whose subtree population does not exceed this value
	/// (or which has no children) is treated as a leaf: its member points
	/// are assigned to tiles individually. Larger nodes are descended into.
	pub leaf_population: u64,
}

impl Default for ClassifyOptions {
	fn default() -> Self {
		ClassifyOptions { leaf_population: 4096 }
	}
}

/// The per-tile aggregates of one target level.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelTiles {
	pub geometry: LevelGeometry,
	/// Aggregate record per touched tile, keyed by `(col, row)`.
	pub tiles: BTreeMap<(i64, i64), TileAggregate>,
}

/// The output of one classification pass over a spatial index.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
	/// One tile mapping per target level, in input order.
	pub levels: Vec<LevelTiles>,
	/// Points whose coordinates fall outside the dataset extent. They are
	/// excluded from tile assignment; the exclusion never aborts a pass.
	pub out_of_range: u64,
	/// Dataset-wide statistics of all classified points.
	pub dataset: TileAggregate,
}

/// Classify the points of a spatial index into the tiles of every target
/// level.
///
/// The index is walked once per level with an explicit worklist, bounding
/// stack depth on deep or unbalanced indices and making cancellation a
/// check between pops. At each visited node the subtree is either small
/// enough to accumulate (its points are assigned to tiles by flooring
/// their coordinates against the level's tile world size) or it is
/// descended into. Aggregation uses only associative, commutative
/// reductions, so the result is independent of visitation order.
///
/// # Errors
/// - [`PyramidError::IndexCorrupt`] if child populations sum to more than
///   their parent's declared population; committed levels are unaffected.
/// - [`PyramidError::Cancelled`] if the progress sink cancels.
pub fn classify(
	index: &dyn SpatialIndexSource,
	levels: &[LevelGeometry],
	options: &ClassifyOptions,
	progress: &mut dyn ProgressTrait,
) -> Result<Classification> {
	let root = index.root();
	let total = index.population(root)?;
	log::debug!("classify {total} points into {} levels", levels.len());

	progress.init("classifying points", total * levels.len() as u64);

	let mut out_of_range = 0u64;
	let mut dataset = TileAggregate::new();
	let mut classified = Vec::with_capacity(levels.len());

	for (level_index, geometry) in levels.iter().enumerate() {
		let mut tiles: BTreeMap<(i64, i64), TileAggregate> = BTreeMap::new();
		let mut stack = vec![root];

		while let Some(node) = stack.pop() {
			if progress.is_cancelled() {
				bail!(PyramidError::Cancelled);
			}

			let population = index.population(node)?;
			let children = index.children(node)?;

			if !children.is_empty() && population > options.leaf_population {
				let mut child_sum = 0u64;
				for &child in &children {
					child_sum += index.population(child)?;
				}
				if child_sum > population {
					bail!(PyramidError::IndexCorrupt(format!(
						"node {node} declares {population} points but its children declare {child_sum}"
					)));
				}
				stack.extend(children);
				continue;
			}

			for [x, y] in index.points(node)? {
				match geometry.tile_for_position(level_index as u8, x, y) {
					Some(coord) => {
						tiles.entry((coord.col, coord.row)).or_default().include_point(x, y);
						if level_index == 0 {
							dataset.include_point(x, y);
						}
					}
					None => {
						// The exclusion set is extent-based and identical for
						// every level; count it once.
						if level_index == 0 {
							out_of_range += 1;
						}
					}
				}
			}
			progress.inc(population);
		}

		classified.push(LevelTiles {
			geometry: *geometry,
			tiles,
		});
	}

	progress.finish();
	if out_of_range > 0 {
		log::warn!("{out_of_range} points fell outside the dataset extent and were excluded");
	}

	Ok(Classification {
		levels: classified,
		out_of_range,
		dataset,
	})
}
