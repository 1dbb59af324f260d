//! The external hierarchical spatial index, seen at its interface boundary.

use anyhow::Result;

/// Opaque identifier of one node of the external index.
pub type NodeId = u64;

/// Read-only view of a hierarchical spatial index over an unordered point
/// cloud.
///
/// The index is owned by an external collaborator (typically a point-cloud
/// SDK); the classifier only visits it. Implementations expose the root
/// node, the declared point population of each subtree, child enumeration,
/// and lazy iteration over a node's member points. Point iteration is
/// restartable: calling [`points`](Self::points) again yields the same
/// finite sequence, and for an inner node it covers the whole subtree.
pub trait SpatialIndexSource: Send + Sync {
	/// The root node of the index.
	fn root(&self) -> NodeId;

	/// The declared point population of the subtree rooted at `node`.
	fn population(&self, node: NodeId) -> Result<u64>;

	/// The children of `node`; empty for leaf nodes.
	fn children(&self, node: NodeId) -> Result<Vec<NodeId>>;

	/// Iterate the coordinates of all points in the subtree rooted at
	/// `node`.
	fn points(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = [f64; 2]> + '_>>;
}
