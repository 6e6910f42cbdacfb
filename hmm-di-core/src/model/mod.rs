//! Order-N hidden Markov model with deleted interpolation.
//!
//! - Interned labels, observations and context windows (`Label`, `Symbol`, `Context`)
//! - Interpolation weights (`Smoothing`)
//! - The model tables and their file formats (`HmmModel`)
//! - Training from labeled records (`Trainer`)
//! - Viterbi decoding (`Decoder`)

/// Fixed-capacity context windows used as transition keys.
pub mod context;

/// Most-likely state sequence search.
///
/// Order 1 picks the best state per position; higher orders run a
/// log-domain Viterbi search. Also decodes batches of sequences on
/// worker threads.
pub mod decoder;

/// Deleted-interpolation weight vector.
pub mod smoothing;

/// The model tables, textual load/save and binary snapshots.
pub mod store;

/// Count accumulation and maximum-likelihood / smoothing estimation.
pub mod trainer;

/// Insertion-ordered interners for labels and observations.
pub mod vocabulary;
