//! A no-op progress indicator.
//!
//! Provides the same interface as the other sinks but does nothing. Useful
//! where a progress sink is required by an interface but no output is
//! wanted, e.g. in tests.

use super::ProgressTrait;

/// A no-op progress indicator.
pub struct ProgressDrain {}

impl ProgressTrait for ProgressDrain {
	fn new() -> Self {
		Self {}
	}

	fn init(&mut self, _message: &str, _max_value: u64) {}

	fn set_position(&mut self, _value: u64) {}

	fn inc(&mut self, _value: u64) {}

	fn finish(&mut self) {}
}
