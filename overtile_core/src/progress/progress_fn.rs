//! A progress indicator backed by a caller-supplied callback.

use super::ProgressTrait;

/// Adapts a `Fn(fraction, message) -> continue` callback to [`ProgressTrait`].
///
/// The callback receives the completed fraction in `[0, 1]` and the task
/// message; returning `false` requests cancellation, which builders honor
/// between tile boundaries. Once the callback has returned `false` the sink
/// stays cancelled and the callback is not invoked again.
///
/// # Examples
///
/// ```
/// use overtile_core::progress::{ProgressFn, ProgressTrait};
///
/// let mut progress = ProgressFn::from_callback(|fraction, message| {
/// 	println!("{message}: {:.0}%", fraction * 100.0);
/// 	fraction < 0.5 // cancel halfway
/// });
/// progress.init("building", 10);
/// progress.inc(6);
/// assert!(progress.is_cancelled());
/// ```
pub struct ProgressFn {
	callback: Box<dyn Fn(f64, &str) -> bool + Send + Sync>,
	message: String,
	max_value: u64,
	position: u64,
	cancelled: bool,
}

impl ProgressFn {
	/// Wrap a progress callback.
	pub fn from_callback(callback: impl Fn(f64, &str) -> bool + Send + Sync + 'static) -> ProgressFn {
		ProgressFn {
			callback: Box::new(callback),
			message: String::new(),
			max_value: 0,
			position: 0,
			cancelled: false,
		}
	}

	fn fraction(&self) -> f64 {
		if self.max_value == 0 {
			return 0.0;
		}
		self.position as f64 / self.max_value as f64
	}

	fn invoke(&mut self) {
		if self.cancelled {
			return;
		}
		if !(self.callback)(self.fraction(), &self.message) {
			self.cancelled = true;
		}
	}
}

impl ProgressTrait for ProgressFn {
	/// A sink with a callback that always continues; use
	/// [`from_callback`](Self::from_callback) for a real one.
	fn new() -> Self {
		Self::from_callback(|_, _| true)
	}

	fn init(&mut self, message: &str, max_value: u64) {
		self.message = message.to_string();
		self.max_value = max_value;
		self.position = 0;
		self.invoke();
	}

	fn set_position(&mut self, value: u64) {
		self.position = value.min(self.max_value);
		self.invoke();
	}

	fn inc(&mut self, value: u64) {
		self.position = (self.position + value).min(self.max_value);
		self.invoke();
	}

	fn finish(&mut self) {
		self.position = self.max_value;
		self.invoke();
	}

	fn is_cancelled(&self) -> bool {
		self.cancelled
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	};

	#[test]
	fn reports_fractions() {
		let calls = Arc::new(AtomicUsize::new(0));
		let calls2 = Arc::clone(&calls);
		let mut progress = ProgressFn::from_callback(move |fraction, message| {
			assert!((0.0..=1.0).contains(&fraction));
			assert_eq!(message, "task");
			calls2.fetch_add(1, Ordering::SeqCst);
			true
		});
		progress.init("task", 4);
		progress.inc(1);
		progress.inc(1);
		progress.set_position(4);
		progress.finish();
		assert_eq!(calls.load(Ordering::SeqCst), 5);
		assert!(!progress.is_cancelled());
	}

	#[test]
	fn cancellation_is_sticky() {
		let mut progress = ProgressFn::from_callback(|fraction, _| fraction < 0.5);
		progress.init("task", 10);
		assert!(!progress.is_cancelled());
		progress.inc(5);
		assert!(progress.is_cancelled());
		// Later callbacks are suppressed; the sink stays cancelled.
		progress.inc(5);
		assert!(progress.is_cancelled());
	}
}
