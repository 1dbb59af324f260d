//! A synthetic in-memory spatial index for tests, examples and benchmarks.

use crate::{NodeId, SpatialIndexSource};
use anyhow::{Result, bail};
use overtile_core::GridExtent;

const MAX_DEPTH: usize = 32;

/// A balanced quadtree over a fixed point set, implementing
/// [`SpatialIndexSource`].
///
/// Points are partitioned by recursive quadrant subdivision until a node
/// holds at most `leaf_capacity` points. The point arena is arranged so
/// every subtree owns a contiguous range, which makes per-node point
/// iteration a cheap slice walk and keeps it restartable.
pub struct MockIndex {
	nodes: Vec<MockNode>,
	points: Vec<[f64; 2]>,
	root: NodeId,
}

struct MockNode {
	population: u64,
	children: Vec<NodeId>,
	start: usize,
	end: usize,
}

impl MockIndex {
	/// Build a quadtree over `points` within `bounds`.
	pub fn build(bounds: GridExtent, points: Vec<[f64; 2]>, leaf_capacity: usize) -> MockIndex {
		let mut index = MockIndex {
			nodes: Vec::new(),
			points: Vec::with_capacity(points.len()),
			root: 0,
		};
		index.root = index.subdivide(bounds, points, leaf_capacity.max(1), 0);
		index
	}

	fn subdivide(&mut self, bounds: GridExtent, points: Vec<[f64; 2]>, leaf_capacity: usize, depth: usize) -> NodeId {
		let population = points.len() as u64;
		let start = self.points.len();

		if points.len() <= leaf_capacity || depth >= MAX_DEPTH {
			self.points.extend(points);
			self.nodes.push(MockNode {
				population,
				children: Vec::new(),
				start,
				end: self.points.len(),
			});
			return (self.nodes.len() - 1) as NodeId;
		}

		let mid_x = (bounds.x_min + bounds.x_max) / 2.0;
		let mid_y = (bounds.y_min + bounds.y_max) / 2.0;
		let mut quadrants: [Vec<[f64; 2]>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
		for point in points {
			let quadrant = usize::from(point[0] >= mid_x) + 2 * usize::from(point[1] >= mid_y);
			quadrants[quadrant].push(point);
		}

		let quadrant_bounds = [
			GridExtent {
				x_min: bounds.x_min,
				y_min: bounds.y_min,
				x_max: mid_x,
				y_max: mid_y,
			},
			GridExtent {
				x_min: mid_x,
				y_min: bounds.y_min,
				x_max: bounds.x_max,
				y_max: mid_y,
			},
			GridExtent {
				x_min: bounds.x_min,
				y_min: mid_y,
				x_max: mid_x,
				y_max: bounds.y_max,
			},
			GridExtent {
				x_min: mid_x,
				y_min: mid_y,
				x_max: bounds.x_max,
				y_max: bounds.y_max,
			},
		];

		let mut children = Vec::new();
		for (quadrant, bounds) in quadrants.into_iter().zip(quadrant_bounds) {
			if !quadrant.is_empty() {
				children.push(self.subdivide(bounds, quadrant, leaf_capacity, depth + 1));
			}
		}

		self.nodes.push(MockNode {
			population,
			children,
			start,
			end: self.points.len(),
		});
		(self.nodes.len() - 1) as NodeId
	}

	fn node(&self, id: NodeId) -> Result<&MockNode> {
		match self.nodes.get(id as usize) {
			Some(node) => Ok(node),
			None => bail!("unknown node {id}"),
		}
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Overwrite a node's declared population, simulating index corruption.
	#[doc(hidden)]
	pub fn set_population(&mut self, id: NodeId, population: u64) {
		self.nodes[id as usize].population = population;
	}
}

impl SpatialIndexSource for MockIndex {
	fn root(&self) -> NodeId {
		self.root
	}

	fn population(&self, node: NodeId) -> Result<u64> {
		Ok(self.node(node)?.population)
	}

	fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
		Ok(self.node(node)?.children.clone())
	}

	fn points(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = [f64; 2]> + '_>> {
		let node = self.node(node)?;
		Ok(Box::new(self.points[node.start..node.end].iter().copied()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grid_points(n: usize) -> Vec<[f64; 2]> {
		(0..n * n)
			.map(|i| [(i % n) as f64 + 0.5, (i / n) as f64 + 0.5])
			.collect()
	}

	#[test]
	fn populations_are_consistent() {
		let bounds = GridExtent::new(0.0, 0.0, 8.0, 8.0).unwrap();
		let index = MockIndex::build(bounds, grid_points(8), 4);

		let root = index.root();
		assert_eq!(index.population(root).unwrap(), 64);

		// Child populations sum to the parent's for every inner node.
		for id in 0..index.node_count() as NodeId {
			let children = index.children(id).unwrap();
			if !children.is_empty() {
				let sum: u64 = children.iter().map(|&c| index.population(c).unwrap()).sum();
				assert_eq!(sum, index.population(id).unwrap());
			}
		}
	}

	#[test]
	fn subtree_points_are_complete_and_restartable() {
		let bounds = GridExtent::new(0.0, 0.0, 8.0, 8.0).unwrap();
		let index = MockIndex::build(bounds, grid_points(8), 4);

		let root = index.root();
		assert_eq!(index.points(root).unwrap().count(), 64);
		// Restartable: a second iteration yields the same sequence.
		let first: Vec<[f64; 2]> = index.points(root).unwrap().collect();
		let second: Vec<[f64; 2]> = index.points(root).unwrap().collect();
		assert_eq!(first, second);
	}

	#[test]
	fn tiny_sets_collapse_to_a_leaf() {
		let bounds = GridExtent::new(0.0, 0.0, 1.0, 1.0).unwrap();
		let index = MockIndex::build(bounds, vec![[0.5, 0.5]], 16);
		assert_eq!(index.node_count(), 1);
		assert!(index.children(index.root()).unwrap().is_empty());
	}

	#[test]
	fn identical_points_terminate() {
		let bounds = GridExtent::new(0.0, 0.0, 1.0, 1.0).unwrap();
		let points = vec![[0.25, 0.25]; 100];
		let index = MockIndex::build(bounds, points, 10);
		assert_eq!(index.population(index.root()).unwrap(), 100);
	}
}
