use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{HmmError, Result};

/// Highest supported model order.
pub const MAX_ORDER: usize = 5;

/// Model order and the delimiter/sentinel strings shared by training,
/// the model file and decoding.
///
/// # Invariants
/// - `order` is always in `1..=MAX_ORDER`
/// - delimiters and sentinels are non-empty (checked by `validate`)
/// - the begin and end sentinels differ
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HmmConfig {
	order: usize,

	/// Separates observation and state in a training record, and the key
	/// from the probability in a model record.
	pub count_delim: String,

	/// A training record equal to this string closes the current sequence.
	pub sequence_delim: String,

	/// Label of the synthetic states preceding every sequence.
	pub sequence_beg: String,

	/// Label of the synthetic states following every sequence.
	pub sequence_end: String,
}

impl Default for HmmConfig {
	fn default() -> Self {
		Self {
			order: 3,
			count_delim: "\t".to_owned(),
			sequence_delim: "*_*".to_owned(),
			sequence_beg: "<s>".to_owned(),
			sequence_end: "</s>".to_owned(),
		}
	}
}

impl HmmConfig {
	/// Default configuration with the given order.
	///
	/// Orders outside `1..=MAX_ORDER` fall back to 1. This is not an error.
	pub fn with_order(order: i64) -> Self {
		let mut config = Self::default();
		config.set_order(order);
		config
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Sets the order, silently clamping out-of-range values to 1.
	pub fn set_order(&mut self, order: i64) {
		self.order = clamp_order(order);
	}

	/// Checks delimiters and sentinels.
	///
	/// # Errors
	/// Returns `HmmError::Config` if a delimiter or sentinel is empty, if a
	/// sentinel contains whitespace (it could not be read back from a
	/// transition record), or if both sentinels are equal.
	pub fn validate(&self) -> Result<()> {
		if self.count_delim.is_empty() {
			return Err(HmmError::Config("count delimiter is empty".to_owned()));
		}
		if self.sequence_delim.trim().is_empty() {
			return Err(HmmError::Config("sequence delimiter is blank".to_owned()));
		}
		for sentinel in [&self.sequence_beg, &self.sequence_end] {
			if sentinel.is_empty() || sentinel.chars().any(char::is_whitespace) {
				return Err(HmmError::Config(format!("invalid sentinel {:?}", sentinel)));
			}
		}
		if self.sequence_beg == self.sequence_end {
			return Err(HmmError::Config("begin and end sentinels are equal".to_owned()));
		}
		Ok(())
	}
}

pub(crate) fn clamp_order(order: i64) -> usize {
	if (1..=MAX_ORDER as i64).contains(&order) {
		order as usize
	} else {
		warn!("order {} outside 1..={}, using 1", order, MAX_ORDER);
		1
	}
}
