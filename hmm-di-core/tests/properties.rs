use hmm_di_core::{Decoder, HmmConfig, HmmModel};
use proptest::prelude::*;

const OBSERVATIONS: [&str; 4] = ["LOW", "CAP", "SPC", " "];
const STATES: [&str; 3] = ["S", "I", "O"];

/// Sentences of (observation index, state index) pairs.
fn corpus() -> impl Strategy<Value = Vec<Vec<(usize, usize)>>> {
	prop::collection::vec(prop::collection::vec((0..OBSERVATIONS.len(), 0..STATES.len()), 1..8), 1..6)
}

fn records(sentences: &[Vec<(usize, usize)>], close_last: bool) -> Vec<String> {
	let mut lines = Vec::new();
	for (i, sentence) in sentences.iter().enumerate() {
		for &(o, s) in sentence {
			lines.push(format!("{}\t{}", OBSERVATIONS[o], STATES[s]));
		}
		if close_last || i + 1 < sentences.len() {
			lines.push("*_*".to_owned());
		}
	}
	lines
}

/// Observations from the training alphabet mixed with unseen symbols.
fn observations() -> impl Strategy<Value = Vec<String>> {
	prop::collection::vec(
		prop_oneof![
			(0..OBSERVATIONS.len()).prop_map(|i| OBSERVATIONS[i].to_owned()),
			"[a-z]{1,3}",
		],
		0..10,
	)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn decoding_labels_every_position(
		sentences in corpus(),
		order in 1i64..=5,
		close_last in any::<bool>(),
		input in observations(),
	) {
		let model = HmmModel::train(records(&sentences, close_last), HmmConfig::with_order(order)).unwrap();
		let decoder = Decoder::new(&model).unwrap();

		let labels = decoder.decode(&input);
		prop_assert_eq!(labels.len(), input.len());
		for label in &labels {
			prop_assert!(STATES.contains(label));
		}
		prop_assert_eq!(decoder.decode(&input), labels);
	}

	#[test]
	fn smoothing_groups_sum_to_one(
		sentences in corpus(),
		order in 1i64..=5,
		close_last in any::<bool>(),
	) {
		let model = HmmModel::train(records(&sentences, close_last), HmmConfig::with_order(order)).unwrap();
		let smoothing = model.smoothing();
		prop_assert_eq!(smoothing.as_slice().len(), model.order() + 2);

		let transitions: f64 = smoothing.transitions().iter().sum();
		prop_assert!((transitions - 1.0).abs() < 1e-9, "transition weights sum to {}", transitions);
		let (emission, fallback) = smoothing.emission();
		prop_assert!((emission + fallback - 1.0).abs() < 1e-9);
		prop_assert!(smoothing.as_slice().iter().all(|&w| w >= 0.0));
	}

	#[test]
	fn saved_text_parses_back(sentences in corpus(), order in 1i64..=5) {
		let model = HmmModel::train(records(&sentences, true), HmmConfig::with_order(order)).unwrap();
		let text = model.to_model_string();
		let parsed = HmmModel::parse(&text).unwrap();
		prop_assert_eq!(parsed.to_model_string(), text);
	}

	#[test]
	fn transition_keys_never_exceed_the_order(sentences in corpus(), order in 1i64..=5) {
		let model = HmmModel::train(records(&sentences, true), HmmConfig::with_order(order)).unwrap();
		for (window, mle) in model.transitions() {
			prop_assert!((1..=model.order()).contains(&window.len()));
			prop_assert!(mle >= 0.0);
		}
		for state in model.states() {
			prop_assert!(state != "<s>" && state != "</s>");
		}
	}
}
