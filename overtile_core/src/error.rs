//! Error taxonomy shared by all pyramid operations.
//!
//! Every fallible API in this workspace returns [`anyhow::Result`]; errors that
//! callers are expected to distinguish are raised as [`PyramidError`] values so
//! they can be recovered with `err.downcast_ref::<PyramidError>()`:
//!
//! ```
//! use overtile_core::{GridExtent, PyramidError};
//!
//! let err = GridExtent::new(0.0, 0.0, f64::NAN, 1.0).unwrap_err();
//! assert!(matches!(
//! 	err.downcast_ref::<PyramidError>(),
//! 	Some(PyramidError::InvalidGeometry(_))
//! ));
//! ```
//!
//! Per-point out-of-range exclusions are deliberately *not* part of this enum:
//! they are non-fatal, counted in the classifier summary and never abort a pass.

use thiserror::Error;

/// Structural and operational failures of a tile pyramid.
#[derive(Debug, Error)]
pub enum PyramidError {
	/// Bad input sizes or extent, rejected before any I/O.
	#[error("invalid geometry: {0}")]
	InvalidGeometry(String),

	/// Stored tiles of one level disagree on band count, pixel type or payload size.
	#[error("inconsistent level: {0}")]
	InconsistentLevel(String),

	/// The set of stored levels violates a pyramid invariant.
	#[error("corrupt pyramid: {0}")]
	CorruptPyramid(String),

	/// The addressed resolution level does not exist.
	#[error("level not found: {0}")]
	LevelNotFound(String),

	/// The external spatial index reported an inconsistent population count.
	#[error("spatial index corrupt: {0}")]
	IndexCorrupt(String),

	/// An underlying storage error; any uncommitted level build is rolled back.
	#[error("store I/O failure: {source}")]
	StoreIo {
		#[source]
		source: anyhow::Error,
	},

	/// The caller requested cancellation; the pyramid is left in its pre-call state.
	#[error("operation cancelled by caller")]
	Cancelled,
}

impl PyramidError {
	/// Wrap an underlying storage error as [`PyramidError::StoreIo`].
	pub fn store_io(source: impl Into<anyhow::Error>) -> PyramidError {
		PyramidError::StoreIo {
			source: source.into(),
		}
	}
}
