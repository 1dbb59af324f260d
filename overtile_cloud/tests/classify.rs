//! Integration tests: classification, determinism, and end-to-end
//! materialization of point-derived levels.

use anyhow::Result;
use assert_fs::NamedTempFile;
use overtile_cloud::{
	ClassifyOptions, MockIndex, PointSurface, classify, materialize_classification, plan_levels,
};
use overtile_core::{
	GridExtent, PyramidError,
	progress::{ProgressDrain, ProgressFn, ProgressTrait},
};
use overtile_store::{LevelKind, Pyramid, RasterSurface, TileStore};

fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

fn extent() -> GridExtent {
	GridExtent::new(0.0, 0.0, 10.0, 10.0).unwrap()
}

/// 10,000 points spread uniformly over the extent: one point every 0.1
/// world units, offset to cell centers.
fn uniform_points() -> Vec<[f64; 2]> {
	(0..100 * 100)
		.map(|i| [(i % 100) as f64 * 0.1 + 0.05, (i / 100) as f64 * 0.1 + 0.05])
		.collect()
}

#[test]
fn uniform_cloud_fills_every_tile() -> Result<()> {
	init_logging();
	// Tile world size 1 over a 10x10 extent: exactly 100 tiles.
	let index = MockIndex::build(extent(), uniform_points(), 256);
	let levels = plan_levels(&extent(), 0.1, 10)?;

	let result = classify(
		&index,
		&levels[..1],
		&ClassifyOptions::default(),
		&mut ProgressDrain::new(),
	)?;

	let tiles = &result.levels[0].tiles;
	assert_eq!(tiles.len(), 100);
	assert_eq!(tiles.values().map(|t| t.count).sum::<u64>(), 10_000);
	assert!(tiles.values().all(|t| t.count == 100));
	assert_eq!(result.out_of_range, 0);

	assert_eq!(result.dataset.count, 10_000);
	assert_eq!(result.dataset.min, [0.05, 0.05]);
	assert_eq!(result.dataset.max, [9.95, 9.95]);
	Ok(())
}

#[test]
fn aggregates_are_independent_of_traversal_shape() -> Result<()> {
	let levels = plan_levels(&extent(), 0.1, 10)?;
	let options = ClassifyOptions { leaf_population: 32 };

	// Different leaf capacities give the quadtree a different shape and a
	// different visitation order; the aggregates must not change.
	let shallow = MockIndex::build(extent(), uniform_points(), 512);
	let deep = MockIndex::build(extent(), uniform_points(), 8);

	let a = classify(&shallow, &levels, &options, &mut ProgressDrain::new())?;
	let b = classify(&deep, &levels, &options, &mut ProgressDrain::new())?;
	let c = classify(&deep, &levels, &options, &mut ProgressDrain::new())?;

	assert_eq!(a, b);
	assert_eq!(b, c);
	Ok(())
}

#[test]
fn every_level_gets_its_own_tile_scale() -> Result<()> {
	let index = MockIndex::build(extent(), uniform_points(), 256);
	let levels = plan_levels(&extent(), 0.1, 10)?;
	assert_eq!(levels.len(), 5);

	let result = classify(&index, &levels, &ClassifyOptions::default(), &mut ProgressDrain::new())?;

	let tile_counts: Vec<usize> = result.levels.iter().map(|l| l.tiles.len()).collect();
	assert_eq!(tile_counts, vec![100, 25, 9, 4, 1]);

	// Every level accounts for every point.
	for level in &result.levels {
		assert_eq!(level.tiles.values().map(|t| t.count).sum::<u64>(), 10_000);
	}
	// The coarsest level's single tile carries the dataset statistics.
	let top = &result.levels[4].tiles[&(0, 0)];
	assert_eq!(top.count, 10_000);
	assert_eq!(top.min, [0.05, 0.05]);
	assert_eq!(top.max, [9.95, 9.95]);
	Ok(())
}

#[test]
fn out_of_range_points_are_counted_not_fatal() -> Result<()> {
	// The index covers a larger area than the dataset extent declares.
	let wide = GridExtent::new(0.0, 0.0, 20.0, 20.0).unwrap();
	let mut points = uniform_points();
	points.push([15.0, 3.0]);
	points.push([3.0, 15.0]);
	points.push([19.9, 19.9]);
	let index = MockIndex::build(wide, points, 256);

	let levels = plan_levels(&extent(), 0.1, 10)?;
	let result = classify(&index, &levels, &ClassifyOptions::default(), &mut ProgressDrain::new())?;

	assert_eq!(result.out_of_range, 3);
	assert_eq!(result.dataset.count, 10_000);
	for level in &result.levels {
		assert_eq!(level.tiles.values().map(|t| t.count).sum::<u64>(), 10_000);
	}
	Ok(())
}

#[test]
fn cancellation_aborts_the_pass() -> Result<()> {
	let index = MockIndex::build(extent(), uniform_points(), 64);
	let levels = plan_levels(&extent(), 0.1, 10)?;

	let mut progress = ProgressFn::from_callback(|fraction, _| fraction < 0.3);
	let err = classify(&index, &levels, &ClassifyOptions { leaf_population: 128 }, &mut progress).unwrap_err();
	assert!(matches!(
		err.downcast_ref::<PyramidError>(),
		Some(PyramidError::Cancelled)
	));
	Ok(())
}

#[tokio::test]
async fn classification_materializes_and_reads_back() -> Result<()> {
	let file = NamedTempFile::new("cloud.pyramid")?;
	let store = TileStore::create_path(file.path(), extent())?;
	let mut pyramid = Pyramid::open(store)?;

	let index = MockIndex::build(extent(), uniform_points(), 256);
	let levels = plan_levels(&extent(), 0.1, 10)?;
	let classification = classify(&index, &levels, &ClassifyOptions::default(), &mut ProgressDrain::new())?;

	let indices = materialize_classification(&mut pyramid, &classification).await?;
	assert_eq!(indices, vec![0, 1, 2, 3, 4]);
	assert_eq!(pyramid.levels().len(), 5);
	assert!(pyramid.levels().iter().all(|l| l.kind == LevelKind::Points));

	// Pixel sizes increase strictly with level index.
	let sizes: Vec<f64> = pyramid.levels().iter().map(|l| l.geometry.pixel_size_x).collect();
	assert!(sizes.windows(2).all(|w| w[0] < w[1]));

	// Read one block of the finest level: every cell carries the tile's
	// aggregate as five little-endian f64 bands.
	let surface = PointSurface::open(&pyramid, 0)?;
	assert_eq!(surface.bands().len(), 5);
	assert_eq!(surface.geo_transform(), [0.0, 0.1, 0.0, 10.0, 0.0, -0.1]);

	let block = surface.read_block(3, 4).await?.unwrap();
	assert_eq!(block.len(), surface.geometry().payload_len());
	let count = f64::from_le_bytes(block[0..8].try_into().unwrap());
	let min_x = f64::from_le_bytes(block[8..16].try_into().unwrap());
	let min_y = f64::from_le_bytes(block[16..24].try_into().unwrap());
	assert_eq!(count, 100.0);
	assert_eq!(min_x, 3.05);
	assert_eq!(min_y, 5.05);

	// Absent and out-of-grid blocks read as None.
	let top = PointSurface::open(&pyramid, 4)?;
	assert!(top.read_block(0, 0).await?.is_some());
	assert!(top.read_block(1, 0).await?.is_none());

	// The stored-pixel surface refuses point levels.
	assert!(pyramid.surface(0).is_err());
	Ok(())
}

#[tokio::test]
async fn reclassification_is_idempotent() -> Result<()> {
	let file = NamedTempFile::new("reclassify.pyramid")?;
	let store = TileStore::create_path(file.path(), extent())?;
	let mut pyramid = Pyramid::open(store)?;

	let index = MockIndex::build(extent(), uniform_points(), 256);
	let levels = plan_levels(&extent(), 0.1, 10)?;
	let classification = classify(&index, &levels, &ClassifyOptions::default(), &mut ProgressDrain::new())?;

	materialize_classification(&mut pyramid, &classification).await?;
	let surface = PointSurface::open(&pyramid, 1)?;
	let before = surface.read_block(2, 2).await?;

	// Clearing a stale level and rematerializing reproduces its content.
	pyramid.clean_level(1)?;
	assert_eq!(pyramid.levels().len(), 4);
	pyramid
		.materialize_point_level(classification.levels[1].geometry, &classification.levels[1].tiles)
		.await?;

	let surface = PointSurface::open(&pyramid, 1)?;
	let after = surface.read_block(2, 2).await?;
	assert_eq!(before, after);
	Ok(())
}
