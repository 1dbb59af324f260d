//! A progress indicator that reports through the `log` facade.

use super::ProgressTrait;

/// Logs progress at `info` level in 10% steps.
///
/// Suited for library use where no terminal is available; the consuming
/// application decides through its logger configuration whether the
/// messages are shown.
pub struct ProgressLog {
	message: String,
	max_value: u64,
	position: u64,
	logged_decile: u64,
}

impl ProgressLog {
	fn report(&mut self) {
		if self.max_value == 0 {
			return;
		}
		let decile = self.position * 10 / self.max_value;
		if decile > self.logged_decile {
			self.logged_decile = decile;
			log::info!("{}: {}%", self.message, decile * 10);
		}
	}
}

impl ProgressTrait for ProgressLog {
	fn new() -> Self {
		Self {
			message: String::new(),
			max_value: 0,
			position: 0,
			logged_decile: 0,
		}
	}

	fn init(&mut self, message: &str, max_value: u64) {
		self.message = message.to_string();
		self.max_value = max_value;
		self.position = 0;
		self.logged_decile = 0;
		log::info!("{message}: started ({max_value} steps)");
	}

	fn set_position(&mut self, value: u64) {
		self.position = value.min(self.max_value);
		self.report();
	}

	fn inc(&mut self, value: u64) {
		self.position = (self.position + value).min(self.max_value);
		self.report();
	}

	fn finish(&mut self) {
		self.position = self.max_value;
		log::info!("{}: finished", self.message);
	}
}
