use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};

use super::context::Context;
use super::smoothing::Smoothing;
use super::store::HmmModel;
use super::vocabulary::{Label, Symbol};
use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::io::read_lines;

/// Streaming builder of an `HmmModel`.
///
/// Records are fed one at a time; `finish` turns the raw counts into
/// maximum-likelihood tables and deleted-interpolation weights. The model
/// under construction is never observable before `finish`.
///
/// # Counting
/// Every record forms a window `history ++ [state]` of exactly `order`
/// labels. The window and each of its prefixes are counted once, so the
/// same table holds both numerators and denominators. Shorter n-grams are
/// only ever obtained by truncating full windows.
pub struct Trainer {
	model: HmmModel,
	/// Window and prefix counts.
	counts: HashMap<Context, u64>,
	emission_counts: HashMap<(Label, Symbol), u64>,
	/// The last `order - 1` labels.
	history: Context,
	/// Non-blank records seen, sequence delimiters included.
	records: u64,
	line: usize,
}

impl Trainer {
	/// Creates a trainer for a fresh model.
	///
	/// # Errors
	/// Returns `HmmError::Config` if the delimiters or sentinels are invalid.
	pub fn new(config: HmmConfig) -> Result<Self> {
		let history = begin_history(config.order());
		Ok(Self {
			model: HmmModel::new(config)?,
			counts: HashMap::new(),
			emission_counts: HashMap::new(),
			history,
			records: 0,
			line: 0,
		})
	}

	/// Consumes one training record.
	///
	/// A record is blank (ignored), the sequence delimiter (closes the
	/// current sequence) or `<observation><count-delim><state>`.
	///
	/// # Errors
	/// Returns `HmmError::TrainingData` if the record does not split into
	/// exactly two fields.
	pub fn feed(&mut self, record: &str) -> Result<()> {
		self.line += 1;
		let trimmed = record.trim();
		if trimmed.is_empty() {
			return Ok(());
		}
		self.records += 1;

		if trimmed == self.model.config.sequence_delim {
			self.close_sequence();
			return Ok(());
		}

		let fields: Vec<&str> = record.trim_end().split(self.model.config.count_delim.as_str()).collect();
		let [observation, state] = fields.as_slice() else {
			return Err(HmmError::training(
				self.line,
				format!("expected observation and state separated by {:?}", self.model.config.count_delim),
			));
		};
		let symbol = self.model.intern_observation(observation);
		let label = self.model.intern_state(state);
		self.count_window(label);
		*self.emission_counts.entry((label, symbol)).or_insert(0) += 1;
		Ok(())
	}

	/// Counts `history ++ [label]` and all its prefixes, then slides the history.
	fn count_window(&mut self, label: Label) {
		// The history holds at most MAX_ORDER - 1 labels
		if let Some(window) = self.history.push(label) {
			for len in (1..=window.len()).rev() {
				*self.counts.entry(window.prefix(len)).or_insert(0) += 1;
			}
		}
		self.history = self.history.shift(label);
	}

	/// Flushes the history with end sentinels and starts a new sequence.
	fn close_sequence(&mut self) {
		let order = self.model.order();
		if order < 2 {
			return;
		}
		for _ in 0..order - 1 {
			self.count_window(Label::END);
		}
		self.history = begin_history(order);
	}

	/// Finalizes the model.
	///
	/// An empty corpus yields empty tables and all-zero smoothing weights.
	pub fn finish(self) -> HmmModel {
		let Self { mut model, counts, emission_counts, records, .. } = self;
		let order = model.order();
		let records = records as f64;
		let count = |context: &Context| counts.get(context).map(|&c| c as f64);

		let mut transition_lambdas = vec![0.0; order];
		let mut transitions = HashMap::new();
		for (window, &window_count) in &counts {
			if window.len() < order {
				continue;
			}
			// deleted[k]: held-out estimate of the (k + 1)-gram
			let mut deleted = vec![0.0; order];
			for len in (1..=order).rev() {
				let ngram = window.prefix(len);
				let numerator = count(&ngram).unwrap_or(0.0);
				let denominator = count(&window.prefix(len - 1)).unwrap_or(records);
				transitions.insert(ngram, numerator / denominator);
				deleted[len - 1] = if denominator - 1.0 < 1.0 {
					0.0
				} else {
					(numerator - 1.0) / (denominator - 1.0)
				};
			}
			transition_lambdas[first_max_index(&deleted)] += window_count as f64;
		}

		let mut emission_lambdas = [0.0; 2];
		let mut emissions = HashMap::new();
		for (&(label, symbol), &emission_count) in &emission_counts {
			let emission_count = emission_count as f64;
			let state_count = count(&Context::unigram(label)).unwrap_or(emission_count);
			emissions.insert((label, symbol), emission_count / state_count);

			let held_out_state = if records > 1.0 { (state_count - 1.0) / (records - 1.0) } else { 0.0 };
			let held_out_emission = if state_count > 1.0 {
				(emission_count - 1.0) / (state_count - 1.0)
			} else {
				0.0
			};
			// Ties go to the second weight
			let slot = if held_out_state > held_out_emission { 0 } else { 1 };
			emission_lambdas[slot] += emission_count;
		}

		debug!("transition accumulators {:?}, emission accumulators {:?}", transition_lambdas, emission_lambdas);
		model.smoothing = Smoothing::from_accumulators(&transition_lambdas, emission_lambdas);
		model.transitions = transitions;
		model.emissions = emissions;

		info!(
			"trained order-{} model on {} records: {} states, {} observations, {} transitions, {} emissions",
			order,
			records,
			model.states.len(),
			model.observations.len(),
			model.transitions.len(),
			model.emissions.len()
		);
		model
	}
}

fn begin_history(order: usize) -> Context {
	Context::filled(Label::BEGIN, order.saturating_sub(1))
}

/// Index of the first maximal value.
fn first_max_index(values: &[f64]) -> usize {
	let mut best = 0;
	for (i, &value) in values.iter().enumerate() {
		if value > values[best] {
			best = i;
		}
	}
	best
}

impl HmmModel {
	/// Trains a fresh model from a stream of records.
	///
	/// # Errors
	/// - `HmmError::Config` for invalid delimiters or sentinels
	/// - `HmmError::TrainingData` for the first malformed record; no
	///   partial model is returned
	pub fn train<I, S>(records: I, config: HmmConfig) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut trainer = Trainer::new(config)?;
		for record in records {
			trainer.feed(record.as_ref())?;
		}
		Ok(trainer.finish())
	}

	/// Trains a fresh model from a corpus file, one record per line.
	pub fn train_file<P: AsRef<Path>>(path: P, config: HmmConfig) -> Result<Self> {
		let lines = read_lines(&path)?;
		debug!("read {} training lines from {}", lines.len(), path.as_ref().display());
		Self::train(&lines, config)
	}
}
