use std::iter;
use std::panic;
use std::thread;

use log::debug;

use super::context::Context;
use super::store::HmmModel;
use super::vocabulary::{Label, Symbol};
use crate::error::{HmmError, Result};

/// Substitute for `ln(0)`.
pub const LOGZERO: f64 = -1000.0;

/// Most-likely state sequence search over a borrowed model.
///
/// Order 1 labels every position independently. Higher orders run a
/// Viterbi search whose predecessor contexts hold `order - 1` labels but
/// whose scores are keyed by the last label of the context only.
///
/// Decoding never fails once the decoder is built: unseen observations,
/// labels or windows score 0, and a zero probability contributes
/// `LOGZERO` to a log score. A model without states (trained on an empty
/// corpus) has nothing to label with and decodes every input to an empty
/// sequence.
#[derive(Clone, Copy, Debug)]
pub struct Decoder<'m> {
	model: &'m HmmModel,
}

impl<'m> Decoder<'m> {
	/// Checks that `model` can be decoded with.
	///
	/// # Errors
	/// Returns `HmmError::InconsistentModel` if the smoothing vector does
	/// not hold `order + 2` weights.
	pub fn new(model: &'m HmmModel) -> Result<Self> {
		let weights = model.smoothing.as_slice().len();
		if weights != model.order() + 2 {
			return Err(HmmError::InconsistentModel(format!(
				"order-{} model with {} smoothing weights",
				model.order(),
				weights
			)));
		}
		Ok(Self { model })
	}

	/// Labels each observation, returning one state per position.
	///
	/// Returns an empty sequence if the input is empty or if the model has
	/// no states.
	pub fn decode<S: AsRef<str>>(&self, observations: &[S]) -> Vec<&'m str> {
		if observations.is_empty() || self.model.states.is_empty() {
			return Vec::new();
		}
		let symbols: Vec<Option<Symbol>> =
			observations.iter().map(|o| self.model.symbol(o.as_ref())).collect();

		let labels = if self.model.order() < 2 {
			self.best_per_position(&symbols)
		} else {
			self.viterbi(&symbols)
		};
		labels.into_iter().map(|l| self.model.label_name(l)).collect()
	}

	/// Decodes independent sequences on all CPUs. Output order follows input order.
	pub fn decode_many<S: AsRef<str> + Sync>(&self, sequences: &[Vec<S>]) -> Vec<Vec<&'m str>> {
		if sequences.is_empty() {
			return Vec::new();
		}
		let workers = num_cpus::get().max(1);
		let chunk_size = sequences.len().div_ceil(workers);
		debug!("decoding {} sequences in chunks of {}", sequences.len(), chunk_size);

		thread::scope(|scope| {
			let handles: Vec<_> = sequences
				.chunks(chunk_size)
				.map(|chunk| {
					let decoder = *self;
					scope.spawn(move || chunk.iter().map(|seq| decoder.decode(seq)).collect::<Vec<_>>())
				})
				.collect();

			handles
				.into_iter()
				.flat_map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
				.collect()
		})
	}

	/// Interpolated emission score; the end sentinel always scores 1.
	fn emission_score(&self, state: Label, symbol: Option<Symbol>) -> f64 {
		if state == Label::END {
			return 1.0;
		}
		let (emission_weight, fallback_weight) = self.model.smoothing.emission();
		let emission = symbol.map_or(0.0, |s| self.model.emission_prob(state, s));
		emission_weight * emission + fallback_weight * self.model.transition_prob(&Context::unigram(state))
	}

	/// Interpolated transition score of a full window: the weight of each
	/// length `i` multiplies the estimate of the window's first `i` labels.
	fn transition_score(&self, window: &Context) -> f64 {
		(1..=self.model.order())
			.map(|len| self.model.smoothing.transition(len) * self.model.transition_prob(&window.prefix(len)))
			.sum()
	}

	/// Order 1: highest emission score per position, first state on ties.
	fn best_per_position(&self, symbols: &[Option<Symbol>]) -> Vec<Label> {
		symbols
			.iter()
			.map(|&symbol| {
				let mut best = (f64::NEG_INFINITY, self.model.states[0]);
				for &state in &self.model.states {
					let score = self.emission_score(state, symbol);
					if score > best.0 {
						best = (score, state);
					}
				}
				best.1
			})
			.collect()
	}

	fn viterbi(&self, symbols: &[Option<Symbol>]) -> Vec<Label> {
		let order = self.model.order();
		let states: &[Label] = &self.model.states;
		let label_count = self.model.labels.len();

		// Candidate labels for each position of the predecessor context
		let begin: &[Label] = &[Label::BEGIN];
		let mut candidates = vec![begin; order - 1];
		let mut previous = vec![f64::NEG_INFINITY; label_count];
		previous[Label::BEGIN.index()] = 0.0;
		let mut backpointers: Vec<Vec<Label>> = Vec::with_capacity(symbols.len() + 1);

		// `None` marks the closing step, forced to the end sentinel
		let steps = symbols.iter().map(|&s| (s, false)).chain(iter::once((None, true)));
		for (symbol, closing) in steps {
			let targets: &[Label] = if closing { &[Label::END] } else { states };
			let contexts = cartesian_product(&candidates);

			let mut current = vec![f64::NEG_INFINITY; label_count];
			let mut back = vec![Label::BEGIN; label_count];
			for &state in targets {
				let emission = log_or_floor(self.emission_score(state, symbol));
				let mut best: Option<(f64, Label)> = None;
				for context in &contexts {
					let (Some(last), Some(window)) = (context.last(), context.push(state)) else {
						continue;
					};
					let score = previous[last.index()] + log_or_floor(self.transition_score(&window)) + emission;
					if best.is_none_or(|(max, _)| score > max) {
						best = Some((score, last));
					}
				}
				if let Some((score, last)) = best {
					current[state.index()] = score;
					back[state.index()] = last;
				}
			}

			backpointers.push(back);
			candidates.remove(0);
			candidates.push(states);
			previous = current;
		}

		// The first step only points back to the begin sentinel
		let mut labels = Vec::with_capacity(symbols.len());
		let mut state = Label::END;
		for back in backpointers.iter().skip(1).rev() {
			state = back[state.index()];
			labels.push(state);
		}
		labels.reverse();
		labels
	}
}

/// `ln(p)`, with `LOGZERO` standing in for `ln(0)`.
fn log_or_floor(probability: f64) -> f64 {
	if probability > 0.0 { probability.ln() } else { LOGZERO }
}

/// Every context picking one label per position, last position varying fastest.
fn cartesian_product(candidates: &[&[Label]]) -> Vec<Context> {
	let mut contexts = vec![Context::filled(Label::BEGIN, 0)];
	for options in candidates {
		contexts = contexts
			.iter()
			.flat_map(|context| options.iter().filter_map(move |&label| context.push(label)))
			.collect();
	}
	contexts
}

impl HmmModel {
	/// Labels `observations` with this model.
	///
	/// # Errors
	/// See `Decoder::new`.
	pub fn decode<S: AsRef<str>>(&self, observations: &[S]) -> Result<Vec<&str>> {
		Ok(Decoder::new(self)?.decode(observations))
	}
}
