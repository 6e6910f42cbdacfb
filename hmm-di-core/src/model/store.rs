use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::context::Context;
use super::smoothing::Smoothing;
use super::vocabulary::{Label, Symbol, Vocabulary};
use crate::config::{HmmConfig, MAX_ORDER};
use crate::error::{HmmError, Result};
use crate::io::{build_output_path, read_lines, write_atomic};

/// A trained or loaded order-N hidden Markov model.
///
/// Holds the interpolation weights, the delimiter/sentinel configuration,
/// the state and observation vocabularies and the two probability tables.
///
/// # Responsibilities
/// - Read and write the textual model format
/// - Cache the whole model as a compact binary snapshot
/// - Answer probability lookups for the decoder (unseen keys score 0)
///
/// # Invariants
/// - `labels` starts with the begin and end sentinels (`Label::BEGIN`, `Label::END`)
/// - `states` never contains a sentinel and keeps first-seen order
/// - every transition key has a length in `1..=order`
/// - `smoothing` has `order + 2` weights
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HmmModel {
	pub(super) config: HmmConfig,
	pub(super) smoothing: Smoothing,
	/// Every label seen in a table, sentinels included.
	pub(super) labels: Vocabulary,
	/// State vocabulary, i.e. the labels the decoder may emit.
	pub(super) states: Vec<Label>,
	pub(super) observations: Vocabulary,
	pub(super) transitions: HashMap<Context, f64>,
	pub(super) emissions: HashMap<(Label, Symbol), f64>,
}

impl HmmModel {
	/// Creates an empty model with all-zero smoothing weights.
	///
	/// # Errors
	/// Returns `HmmError::Config` if the delimiters or sentinels are invalid.
	pub fn new(config: HmmConfig) -> Result<Self> {
		config.validate()?;
		let mut labels = Vocabulary::new();
		labels.intern(&config.sequence_beg);
		labels.intern(&config.sequence_end);

		Ok(Self {
			smoothing: Smoothing::zeros(config.order()),
			config,
			labels,
			states: Vec::new(),
			observations: Vocabulary::new(),
			transitions: HashMap::new(),
			emissions: HashMap::new(),
		})
	}

	/// Replaces the interpolation weights.
	///
	/// # Errors
	/// Returns `HmmError::InconsistentModel` if there are not `order + 2` weights.
	pub fn with_smoothing(mut self, weights: Vec<f64>) -> Result<Self> {
		self.smoothing = Smoothing::from_weights(self.order(), weights)?;
		Ok(self)
	}

	pub fn order(&self) -> usize {
		self.config.order()
	}

	pub fn config(&self) -> &HmmConfig {
		&self.config
	}

	pub fn smoothing(&self) -> &Smoothing {
		&self.smoothing
	}

	/// State vocabulary in first-seen order.
	pub fn states(&self) -> impl Iterator<Item = &str> {
		self.states.iter().map(|&s| self.label_name(s))
	}

	/// Observation vocabulary in first-seen order.
	pub fn observations(&self) -> impl Iterator<Item = &str> {
		self.observations.iter()
	}

	pub fn transition_count(&self) -> usize {
		self.transitions.len()
	}

	pub fn emission_count(&self) -> usize {
		self.emissions.len()
	}

	/// Every transition record as `(labels, probability)`, in no particular order.
	pub fn transitions(&self) -> impl Iterator<Item = (Vec<&str>, f64)> {
		self.transitions.iter().map(|(context, &mle)| {
			(context.labels().iter().map(|&l| self.label_name(l)).collect(), mle)
		})
	}

	/// Every emission record as `((state, observation), probability)`, in no particular order.
	pub fn emissions(&self) -> impl Iterator<Item = ((&str, &str), f64)> {
		self.emissions.iter().map(|(&(label, symbol), &mle)| {
			((self.label_name(label), self.observations.name(symbol.0)), mle)
		})
	}

	/// Probability of the last label of `window` given the preceding ones.
	///
	/// Unseen windows (or unknown labels) score 0.
	pub fn transition(&self, window: &[&str]) -> f64 {
		let labels: Option<Vec<Label>> = window.iter().map(|l| self.label(l)).collect();
		labels
			.and_then(|labels| Context::new(&labels))
			.and_then(|context| self.transitions.get(&context).copied())
			.unwrap_or(0.0)
	}

	/// Probability of `observation` given `state`; unseen pairs score 0.
	pub fn emission(&self, state: &str, observation: &str) -> f64 {
		match (self.label(state), self.symbol(observation)) {
			(Some(label), Some(symbol)) => self.emission_prob(label, symbol),
			_ => 0.0,
		}
	}

	pub(crate) fn label(&self, name: &str) -> Option<Label> {
		self.labels.id(name).map(Label)
	}

	pub(crate) fn symbol(&self, name: &str) -> Option<Symbol> {
		self.observations.id(name).map(Symbol)
	}

	pub(crate) fn label_name(&self, label: Label) -> &str {
		self.labels.name(label.0)
	}

	pub(crate) fn transition_prob(&self, context: &Context) -> f64 {
		self.transitions.get(context).copied().unwrap_or(0.0)
	}

	pub(crate) fn emission_prob(&self, label: Label, symbol: Symbol) -> f64 {
		self.emissions.get(&(label, symbol)).copied().unwrap_or(0.0)
	}

	/// Interns a label, registering it in the state vocabulary unless it
	/// is a sentinel.
	pub(super) fn intern_state(&mut self, name: &str) -> Label {
		let known = self.labels.len();
		let label = Label(self.labels.intern(name));
		if label.index() >= known && !label.is_sentinel() {
			self.states.push(label);
		}
		label
	}

	pub(super) fn intern_observation(&mut self, name: &str) -> Symbol {
		Symbol(self.observations.intern(name))
	}

	/// Loads a model from its textual format.
	///
	/// # Errors
	/// - `HmmError::Io` if the file cannot be read
	/// - `HmmError::ModelFormat` if any line deviates from the format
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let lines = read_lines(&path)?;
		let model = Self::parse_lines(&lines)?;
		info!(
			"loaded order-{} model from {} ({} transitions, {} emissions)",
			model.order(),
			path.as_ref().display(),
			model.transition_count(),
			model.emission_count()
		);
		Ok(model)
	}

	/// Parses the textual model format from memory.
	pub fn parse(text: &str) -> Result<Self> {
		let lines: Vec<&str> = text.lines().collect();
		Self::parse_lines(&lines)
	}

	fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
		let mut reader = LineReader { lines, next: 0 };

		let order = reader.integer()?;
		if !(1..=MAX_ORDER).contains(&order) {
			return Err(HmmError::format(reader.next, format!("order {} outside 1..={}", order, MAX_ORDER)));
		}

		let (line_no, line) = reader.line()?;
		let weights = line
			.split_whitespace()
			.map(|w| w.parse::<f64>())
			.collect::<std::result::Result<Vec<_>, _>>()
			.map_err(|e| HmmError::format(line_no, format!("bad smoothing weight: {}", e)))?;
		if weights.len() != order + 2 {
			return Err(HmmError::format(
				line_no,
				format!("expected {} smoothing weights, got {}", order + 2, weights.len()),
			));
		}

		let mut config = HmmConfig::default();
		config.set_order(order as i64);
		config.count_delim = reader.quoted()?;
		config.sequence_delim = reader.quoted()?;
		config.sequence_beg = reader.quoted()?;
		config.sequence_end = reader.quoted()?;

		let mut model = Self::new(config)
			.map_err(|e| HmmError::format(reader.next, e.to_string()))?
			.with_smoothing(weights)?;

		let transitions = reader.integer()?;
		for _ in 0..transitions {
			let (line_no, line) = reader.line()?;
			let (key, mle) = model.split_record(line_no, line)?;
			let names: Vec<&str> = key.split_whitespace().collect();
			if names.is_empty() || names.len() > order {
				return Err(HmmError::format(
					line_no,
					format!("transition of length {} in an order-{} model", names.len(), order),
				));
			}
			let labels: Vec<Label> = names.iter().map(|name| model.intern_state(name)).collect();
			// Length checked above
			if let Some(context) = Context::new(&labels) {
				model.transitions.insert(context, mle);
			}
		}

		let emissions = reader.integer()?;
		for _ in 0..emissions {
			let (line_no, line) = reader.line()?;
			let (key, mle) = model.split_record(line_no, line)?;
			let fields: Vec<&str> = key.split(' ').collect();
			let (state, observation) = match fields.as_slice() {
				[state, observation] => (*state, *observation),
				// A single-space observation leaves two empty fields
				[state, "", ""] => (*state, " "),
				[_] => return Err(HmmError::format(line_no, "too few state/observation fields")),
				_ => {
					return Err(HmmError::format(line_no, "spaces inside a state or observation"));
				}
			};
			let label = Label(model.labels.intern(state));
			let symbol = model.intern_observation(observation);
			model.emissions.insert((label, symbol), mle);
		}

		debug!("model has {} states, {} observations", model.states.len(), model.observations.len());
		Ok(model)
	}

	/// Splits `<key><count-delim><probability>`.
	fn split_record<'l>(&self, line_no: usize, line: &'l str) -> Result<(&'l str, f64)> {
		let fields: Vec<&str> = line.split(self.config.count_delim.as_str()).collect();
		let [key, mle] = fields.as_slice() else {
			return Err(HmmError::format(
				line_no,
				format!("expected 2 fields separated by {:?}, got {}", self.config.count_delim, fields.len()),
			));
		};
		let mle = mle
			.trim()
			.parse::<f64>()
			.map_err(|e| HmmError::format(line_no, format!("bad probability {:?}: {}", mle, e)))?;
		if !mle.is_finite() || mle < 0.0 {
			return Err(HmmError::format(line_no, format!("invalid probability {}", mle)));
		}
		Ok((*key, mle))
	}

	/// Renders the textual model format.
	pub fn to_model_string(&self) -> String {
		self.to_string()
	}

	/// Writes the textual model format.
	///
	/// Both tables are written by descending probability; equal
	/// probabilities are ordered by key so the output is deterministic.
	fn write_model(&self, out: &mut impl fmt::Write) -> fmt::Result {
		let delim = &self.config.count_delim;

		let weights: Vec<String> = self.smoothing.as_slice().iter().map(f64::to_string).collect();
		writeln!(out, "{}", self.order())?;
		writeln!(out, "{}", weights.join(" "))?;
		writeln!(out, "\"{}\"", self.config.count_delim)?;
		writeln!(out, "\"{}\"", self.config.sequence_delim)?;
		writeln!(out, "\"{}\"", self.config.sequence_beg)?;
		writeln!(out, "\"{}\"", self.config.sequence_end)?;

		let mut transitions: Vec<(String, f64)> =
			self.transitions().map(|(names, mle)| (names.join(" "), mle)).collect();
		sort_by_probability(&mut transitions);
		writeln!(out, "{}", transitions.len())?;
		for (key, mle) in &transitions {
			writeln!(out, "{}{}{:.20}", key, delim, mle)?;
		}

		let mut emissions: Vec<(String, f64)> = self
			.emissions()
			.map(|((state, observation), mle)| (format!("{} {}", state, observation), mle))
			.collect();
		sort_by_probability(&mut emissions);
		writeln!(out, "{}", emissions.len())?;
		for (key, mle) in &emissions {
			writeln!(out, "{}{}{:.20}", key, delim, mle)?;
		}
		Ok(())
	}

	/// Writes the textual model format atomically.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		write_atomic(&path, self.to_model_string().as_bytes())?;
		info!("saved order-{} model to {}", self.order(), path.as_ref().display());
		Ok(())
	}

	/// Writes a `postcard` snapshot of the whole model.
	pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		write_atomic(&path, &bytes)?;
		debug!("wrote {} byte snapshot to {}", bytes.len(), path.as_ref().display());
		Ok(())
	}

	/// Reads a snapshot written by `save_binary`.
	///
	/// # Errors
	/// - `HmmError::Binary` if the bytes do not decode
	/// - `HmmError::InconsistentModel` if the decoded tables refer to
	///   labels or symbols outside their vocabularies
	pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = fs::read(&path)?;
		let model: Self = postcard::from_bytes(&bytes)?;
		model.check_snapshot()?;
		Ok(model)
	}

	/// Structural checks on a decoded snapshot, so that lookups never
	/// index past a vocabulary.
	fn check_snapshot(&self) -> Result<()> {
		let inconsistent = |reason: &str| Err(HmmError::InconsistentModel(format!("snapshot {}", reason)));

		if self.smoothing.order() != self.order() {
			return inconsistent("order differs from its smoothing vector");
		}
		if self.labels.id(&self.config.sequence_beg) != Some(Label::BEGIN.0)
			|| self.labels.id(&self.config.sequence_end) != Some(Label::END.0)
		{
			return inconsistent("sentinels are not the first two labels");
		}
		let labels = self.labels.len();
		let known = |label: &Label| label.index() < labels;
		if !self.states.iter().all(|l| known(l) && !l.is_sentinel()) {
			return inconsistent("state vocabulary holds an unknown label");
		}
		let order = self.order();
		if !self.transitions.keys().all(|w| (1..=order).contains(&w.len()) && w.labels().iter().all(known)) {
			return inconsistent("transition key out of range");
		}
		let symbols = self.observations.len();
		if !self.emissions.keys().all(|(l, s)| known(l) && (s.0 as usize) < symbols) {
			return inconsistent("emission key out of range");
		}
		Ok(())
	}

	/// Opens a textual model, going through its binary snapshot.
	///
	/// If `<stem>.bin` exists next to `path` and is not older than it, the
	/// snapshot is loaded. Otherwise the text is parsed and the snapshot
	/// (re)written for the next call. Failing to write the snapshot only
	/// logs a warning.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		let binary_path = build_output_path(&path, "bin")?;
		if binary_path == path.as_ref() {
			return Self::load(&path);
		}
		if is_fresh(&binary_path, path.as_ref()) {
			debug!("using snapshot {}", binary_path.display());
			return Self::load_binary(binary_path);
		}
		let model = Self::load(&path)?;
		if let Err(e) = model.save_binary(&binary_path) {
			warn!("could not write snapshot {}: {}", binary_path.display(), e);
		}
		Ok(model)
	}
}

impl fmt::Display for HmmModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.write_model(f)
	}
}

fn sort_by_probability(records: &mut [(String, f64)]) {
	records.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Whether `cache` is an existing file modified no earlier than `source`.
fn is_fresh(cache: &Path, source: &Path) -> bool {
	let modified = |p: &Path| fs::metadata(p).ok().filter(|m| m.is_file()).and_then(|m| m.modified().ok());
	match (modified(cache), modified(source)) {
		(Some(cache), Some(source)) => cache >= source,
		(Some(_), None) => true,
		_ => false,
	}
}

/// Sequential access to model lines with 1-based positions for errors.
struct LineReader<'a, S> {
	lines: &'a [S],
	next: usize,
}

impl<'a, S: AsRef<str>> LineReader<'a, S> {
	/// Next line, trimmed, with its 1-based number.
	fn line(&mut self) -> Result<(usize, &'a str)> {
		let line = self
			.lines
			.get(self.next)
			.ok_or_else(|| HmmError::format(self.next + 1, "unexpected end of model"))?;
		self.next += 1;
		Ok((self.next, line.as_ref().trim()))
	}

	fn integer(&mut self) -> Result<usize> {
		let (line_no, line) = self.line()?;
		line.parse::<usize>().map_err(|e| HmmError::format(line_no, format!("bad integer {:?}: {}", line, e)))
	}

	/// A string enclosed in double quotes.
	fn quoted(&mut self) -> Result<String> {
		let (line_no, line) = self.line()?;
		line.strip_prefix('"')
			.and_then(|l| l.strip_suffix('"'))
			.map(str::to_owned)
			.ok_or_else(|| HmmError::format(line_no, format!("expected a quoted string, got {:?}", line)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MODEL: &str = "2
0.25 0.75 0.6 0.4
\"\t\"
\"*_*\"
\"<s>\"
\"</s>\"
4
<s> S\t1.00000000000000000000
S T\t0.50000000000000000000
S\t0.40000000000000000000
T\t0.10000000000000000000
3
T  \t0.50000000000000000000
S a\t1.00000000000000000000
T b\t0.50000000000000000000
";

	#[test]
	fn parses_every_section() {
		let model = HmmModel::parse(MODEL).unwrap();
		assert_eq!(model.order(), 2);
		assert_eq!(model.smoothing().as_slice(), &[0.25, 0.75, 0.6, 0.4]);
		assert_eq!(model.config().count_delim, "\t");
		assert_eq!(model.config().sequence_delim, "*_*");
		assert_eq!(model.states().collect::<Vec<_>>(), vec!["S", "T"]);
		assert_eq!(model.observations().collect::<Vec<_>>(), vec![" ", "a", "b"]);
		assert_eq!(model.transition(&["S", "T"]), 0.5);
		assert_eq!(model.transition(&["<s>", "S"]), 1.0);
		assert_eq!(model.transition(&["T", "S"]), 0.0);
		assert_eq!(model.emission("T", " "), 0.5);
		assert_eq!(model.emission("S", "zzz"), 0.0);
	}

	#[test]
	fn rendering_parses_back_identically() {
		let model = HmmModel::parse(MODEL).unwrap();
		let text = model.to_model_string();
		let again = HmmModel::parse(&text).unwrap();
		assert_eq!(again.to_model_string(), text);
		assert!(text.contains("S\t0.40000000000000002220\n"));
	}

	#[test]
	fn rejects_malformed_emission_fields() {
		let broken = MODEL.replace("S a\t1.0", "S a x\t1.0");
		let err = HmmModel::parse(&broken).unwrap_err();
		assert!(matches!(err, HmmError::ModelFormat { line: 14, .. }), "{err}");

		let broken = MODEL.replace("S a\t1.0", "Sa\t1.0");
		assert!(matches!(HmmModel::parse(&broken), Err(HmmError::ModelFormat { .. })));
	}

	#[test]
	fn rejects_truncated_and_garbled_models() {
		let truncated: String = MODEL.lines().take(10).map(|l| format!("{l}\n")).collect();
		assert!(matches!(
			HmmModel::parse(&truncated),
			Err(HmmError::ModelFormat { line: 11, .. })
		));

		let no_quotes = MODEL.replace("\"*_*\"", "*_*");
		assert!(matches!(HmmModel::parse(&no_quotes), Err(HmmError::ModelFormat { line: 4, .. })));

		let short_smoothing = MODEL.replace("0.25 0.75 0.6 0.4", "0.25 0.75 1.0");
		assert!(matches!(
			HmmModel::parse(&short_smoothing),
			Err(HmmError::ModelFormat { line: 2, .. })
		));

		let too_long = MODEL.replace("S T\t0.5", "S T S\t0.5");
		assert!(matches!(HmmModel::parse(&too_long), Err(HmmError::ModelFormat { line: 9, .. })));

		let bad_number = MODEL.replace("T\t0.1", "T\tabc");
		assert!(matches!(HmmModel::parse(&bad_number), Err(HmmError::ModelFormat { line: 11, .. })));
	}

	#[test]
	fn binary_snapshot_is_used_by_open() {
		let dir = tempfile::tempdir().unwrap();
		let text_path = dir.path().join("tok.mdl");
		HmmModel::parse(MODEL).unwrap().save(&text_path).unwrap();

		let opened = HmmModel::open(&text_path).unwrap();
		let binary_path = dir.path().join("tok.bin");
		assert!(binary_path.exists());

		let cached = HmmModel::open(&text_path).unwrap();
		assert_eq!(cached.to_model_string(), opened.to_model_string());
		assert_eq!(cached.states().collect::<Vec<_>>(), vec!["S", "T"]);
	}

	#[test]
	fn unwritable_snapshot_does_not_block_open() {
		let dir = tempfile::tempdir().unwrap();
		let text_path = dir.path().join("tok.mdl");
		// A directory where the snapshot would go
		fs::create_dir(dir.path().join("tok.bin")).unwrap();
		HmmModel::parse(MODEL).unwrap().save(&text_path).unwrap();

		let opened = HmmModel::open(&text_path).unwrap();
		assert_eq!(opened.states().collect::<Vec<_>>(), vec!["S", "T"]);
		assert!(dir.path().join("tok.bin").is_dir());
	}

	#[test]
	fn snapshots_with_dangling_ids_are_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tok.bin");
		let model = HmmModel::parse(MODEL).unwrap();

		let mut broken = model.clone();
		broken.transitions.insert(Context::unigram(Label(99)), 0.5);
		broken.save_binary(&path).unwrap();
		assert!(matches!(HmmModel::load_binary(&path), Err(HmmError::InconsistentModel(_))));

		let mut broken = model.clone();
		broken.emissions.insert((Label(2), Symbol(42)), 0.5);
		broken.save_binary(&path).unwrap();
		assert!(matches!(HmmModel::load_binary(&path), Err(HmmError::InconsistentModel(_))));

		let mut broken = model.clone();
		broken.states.push(Label(7));
		broken.save_binary(&path).unwrap();
		assert!(matches!(HmmModel::load_binary(&path), Err(HmmError::InconsistentModel(_))));

		model.save_binary(&path).unwrap();
		assert_eq!(HmmModel::load_binary(&path).unwrap().to_model_string(), model.to_model_string());
	}

	#[test]
	fn display_matches_the_model_string() {
		let model = HmmModel::parse(MODEL).unwrap();
		assert_eq!(format!("{model}"), model.to_model_string());
		assert!(model.to_model_string().starts_with("2\n0.25 0.75 0.6 0.4\n\"\t\"\n"));
	}

	#[test]
	fn new_model_is_empty() {
		let model = HmmModel::new(HmmConfig::with_order(2)).unwrap();
		assert_eq!(model.smoothing().as_slice(), &[0.0; 4]);
		assert_eq!(model.states().count(), 0);
		assert!(model.clone().with_smoothing(vec![1.0]).is_err());
		assert!(model.with_smoothing(vec![0.5, 0.5, 1.0, 0.0]).is_ok());
	}
}
