use serde::{Deserialize, Serialize};

use crate::error::{HmmError, Result};

/// Deleted-interpolation weights of an order-N model.
///
/// Holds `N + 2` weights: `N` weights blending the transition orders
/// `1..=N`, then two weights blending the emission estimate with the
/// unigram transition fallback.
///
/// # Invariants
/// - `weights.len() == order + 2`
/// - each group sums to 1, or is all zero when training saw no evidence
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Smoothing {
	order: usize,
	weights: Vec<f64>,
}

impl Smoothing {
	/// All-zero weights (no smoothing contribution).
	pub fn zeros(order: usize) -> Self {
		Self { order, weights: vec![0.0; order + 2] }
	}

	/// Wraps explicit weights as found in a model file.
	///
	/// # Errors
	/// Returns `HmmError::InconsistentModel` if the length is not `order + 2`.
	pub fn from_weights(order: usize, weights: Vec<f64>) -> Result<Self> {
		if weights.len() != order + 2 {
			return Err(HmmError::InconsistentModel(format!(
				"order {} needs {} smoothing weights, got {}",
				order,
				order + 2,
				weights.len()
			)));
		}
		Ok(Self { order, weights })
	}

	/// Builds the vector from raw training accumulators, normalizing each
	/// group by its own sum.
	pub(crate) fn from_accumulators(transition: &[f64], emission: [f64; 2]) -> Self {
		let mut weights = normalize(transition);
		weights.extend(normalize(&emission));
		Self { order: transition.len(), weights }
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Weight of the transition estimate of length `len` (1-based).
	pub fn transition(&self, len: usize) -> f64 {
		self.weights[len - 1]
	}

	/// Weights of transition orders `1..=N`.
	pub fn transitions(&self) -> &[f64] {
		&self.weights[..self.order]
	}

	/// `(emission estimate, unigram fallback)` weights.
	pub fn emission(&self) -> (f64, f64) {
		(self.weights[self.order], self.weights[self.order + 1])
	}

	pub fn as_slice(&self) -> &[f64] {
		&self.weights
	}
}

/// Divides every accumulator by the group sum; leaves zeros when nothing
/// was accumulated.
fn normalize(accumulators: &[f64]) -> Vec<f64> {
	let sum: f64 = accumulators.iter().sum();
	if sum > 0.0 {
		accumulators.iter().map(|a| a / sum).collect()
	} else {
		vec![0.0; accumulators.len()]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn groups_are_normalized_independently() {
		let smoothing = Smoothing::from_accumulators(&[1.0, 3.0, 0.0], [2.0, 2.0]);
		assert_eq!(smoothing.order(), 3);
		assert_eq!(smoothing.transitions(), &[0.25, 0.75, 0.0]);
		assert_eq!(smoothing.transition(2), 0.75);
		assert_eq!(smoothing.emission(), (0.5, 0.5));
	}

	#[test]
	fn empty_evidence_stays_zero() {
		let smoothing = Smoothing::from_accumulators(&[0.0, 0.0], [0.0, 0.0]);
		assert_eq!(smoothing, Smoothing::zeros(2));
	}

	#[test]
	fn explicit_weights_are_length_checked() {
		assert!(Smoothing::from_weights(2, vec![0.5, 0.5, 1.0, 0.0]).is_ok());
		assert!(matches!(
			Smoothing::from_weights(2, vec![1.0, 0.0, 1.0]),
			Err(HmmError::InconsistentModel(_))
		));
	}
}
