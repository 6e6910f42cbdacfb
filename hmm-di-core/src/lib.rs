//! Statistical sequence labelling with an order-N hidden Markov model.
//!
//! This crate provides:
//! - Training from `observation<TAB>state` records with deleted-interpolation
//!   smoothing of transition and emission estimates
//! - A line-oriented textual model format, plus a compact binary snapshot
//! - Viterbi decoding of observation sequences into state labels
//!
//! ```no_run
//! use hmm_di_core::{HmmConfig, HmmModel};
//!
//! let model = HmmModel::train_file("corpus.txt", HmmConfig::with_order(3))?;
//! model.save("tok.mdl")?;
//! let labels = model.decode(&["LOW", "LOW", "SPC", "CAP"])?;
//! # Ok::<(), hmm_di_core::HmmError>(())
//! ```

/// Model order and delimiter/sentinel configuration.
pub mod config;

/// Error type shared by every operation.
pub mod error;

/// Core model, trainer and decoder.
pub mod model;

/// File helpers (line reading, atomic writes, sibling paths).
///
/// Not exposed
pub(crate) mod io;

pub use config::{HmmConfig, MAX_ORDER};
pub use error::{HmmError, Result};
pub use model::decoder::{Decoder, LOGZERO};
pub use model::store::HmmModel;
pub use model::trainer::Trainer;
