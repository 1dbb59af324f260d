//! The progress reporting contract used by long-running pyramid operations.

/// Factory for the default progress sink.
///
/// Returns a log-backed indicator in normal builds and a no-op drain under
/// test, so test output stays quiet without wiring a sink through every call.
pub fn get_progress(message: &str, max_value: u64) -> Box<dyn ProgressTrait> {
	#[cfg(not(test))]
	let mut progress = super::progress_log::ProgressLog::new();
	#[cfg(test)]
	let mut progress = super::progress_drain::ProgressDrain::new();
	progress.init(message, max_value);
	Box::new(progress)
}

/// A progress indicator for long-running operations.
///
/// Builders report progress tile-by-tile through [`inc`](Self::inc) and poll
/// [`is_cancelled`](Self::is_cancelled) between tile boundaries; a sink that
/// returns `true` there makes the operation abort before committing and roll
/// back to its pre-call state.
pub trait ProgressTrait: Send + Sync {
	/// Creates a new instance of the progress indicator.
	fn new() -> Self
	where
		Self: Sized;

	/// Initializes the progress indicator with a task message and the
	/// maximum value (total number of work items).
	fn init(&mut self, message: &str, max_value: u64);

	/// Sets the absolute position of the progress.
	fn set_position(&mut self, value: u64);

	/// Increases the position of the progress by a given amount.
	fn inc(&mut self, value: u64);

	/// Marks the operation as finished.
	fn finish(&mut self);

	/// Whether the caller behind this sink has requested cancellation.
	/// The default implementation never cancels.
	fn is_cancelled(&self) -> bool {
		false
	}
}
