use std::io;

use thiserror::Error;

/// Errors raised while configuring, training, loading or decoding a model.
///
/// Parsing errors always carry the 1-based line number of the offending
/// record. Decoding has no error of its own: lookup misses are scored as
/// zero probability.
#[derive(Debug, Error)]
pub enum HmmError {
	/// Invalid delimiter or sentinel configuration.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Malformed persisted model.
	#[error("malformed model at line {line}: {reason}")]
	ModelFormat { line: usize, reason: String },

	/// Malformed training record.
	#[error("malformed training record at line {line}: {reason}")]
	TrainingData { line: usize, reason: String },

	/// The model cannot be used (wrong smoothing length, dangling ids in a snapshot).
	#[error("inconsistent model: {0}")]
	InconsistentModel(String),

	#[error(transparent)]
	Io(#[from] io::Error),

	/// Binary snapshot could not be encoded or decoded.
	#[error("binary snapshot: {0}")]
	Binary(#[from] postcard::Error),
}

impl HmmError {
	pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
		Self::ModelFormat { line, reason: reason.into() }
	}

	pub(crate) fn training(line: usize, reason: impl Into<String>) -> Self {
		Self::TrainingData { line, reason: reason.into() }
	}
}

pub type Result<T> = std::result::Result<T, HmmError>;
