use serde::{Deserialize, Serialize};

use super::vocabulary::Label;
use crate::config::MAX_ORDER;

/// An ordered window of up to `MAX_ORDER` state labels.
///
/// Used as the key of the transition table. Slots past `len` are always
/// `Label::default()`, so equal windows hash equally whatever they were
/// truncated from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Context {
	len: u8,
	labels: [Label; MAX_ORDER],
}

impl Context {
	/// Builds a window from a slice.
	///
	/// Returns `None` if the slice is longer than `MAX_ORDER`.
	pub fn new(labels: &[Label]) -> Option<Self> {
		if labels.len() > MAX_ORDER {
			return None;
		}
		let mut window = Self { len: labels.len() as u8, labels: [Label::default(); MAX_ORDER] };
		window.labels[..labels.len()].copy_from_slice(labels);
		Some(window)
	}

	/// Window holding a single label.
	pub fn unigram(label: Label) -> Self {
		let mut labels = [Label::default(); MAX_ORDER];
		labels[0] = label;
		Self { len: 1, labels }
	}

	/// `len` copies of `label`, capped at `MAX_ORDER`.
	pub fn filled(label: Label, len: usize) -> Self {
		let len = len.min(MAX_ORDER);
		let mut labels = [Label::default(); MAX_ORDER];
		labels[..len].fill(label);
		Self { len: len as u8, labels }
	}

	pub fn len(&self) -> usize {
		self.len as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn labels(&self) -> &[Label] {
		&self.labels[..self.len()]
	}

	pub fn last(&self) -> Option<Label> {
		self.labels().last().copied()
	}

	/// The first `len` labels of the window (the window itself if shorter).
	pub fn prefix(&self, len: usize) -> Self {
		let len = len.min(self.len());
		let mut prefix = Self { len: len as u8, labels: [Label::default(); MAX_ORDER] };
		prefix.labels[..len].copy_from_slice(&self.labels[..len]);
		prefix
	}

	/// The window extended by one label, or `None` when already full.
	pub fn push(&self, label: Label) -> Option<Self> {
		if self.len() == MAX_ORDER {
			return None;
		}
		let mut extended = *self;
		extended.labels[self.len()] = label;
		extended.len += 1;
		Some(extended)
	}

	/// Drops the oldest label and appends `label`, keeping the length.
	pub fn shift(&self, label: Label) -> Self {
		let len = self.len();
		if len == 0 {
			return *self;
		}
		let mut shifted = *self;
		shifted.labels.copy_within(1..len, 0);
		shifted.labels[len - 1] = label;
		shifted
	}
}
