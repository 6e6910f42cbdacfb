use hmm_di_core::{HmmConfig, HmmError, HmmModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CLASSES: [&str; 5] = ["LOW", "CAP", "SPC", "SFL", " "];
const TAGS: [&str; 4] = ["S", "T", "I", "O"];

/// Random `observation<TAB>state` corpus with sentence delimiters.
fn random_corpus(seed: u64, sentences: usize) -> Vec<String> {
	let mut rng = StdRng::seed_from_u64(seed);
	let mut lines = Vec::new();
	for _ in 0..sentences {
		for _ in 0..rng.random_range(1..12) {
			let class = CLASSES[rng.random_range(0..CLASSES.len())];
			let tag = TAGS[rng.random_range(0..TAGS.len())];
			lines.push(format!("{}\t{}", class, tag));
		}
		lines.push("*_*".to_owned());
	}
	lines
}

fn assert_same_tables(a: &HmmModel, b: &HmmModel) {
	assert_eq!(a.order(), b.order());
	assert_eq!(a.config(), b.config());
	assert_eq!(a.smoothing().as_slice(), b.smoothing().as_slice());
	assert_eq!(a.transition_count(), b.transition_count());
	assert_eq!(a.emission_count(), b.emission_count());
	for (window, mle) in a.transitions() {
		let loaded = b.transition(&window);
		assert!((mle - loaded).abs() < 1e-15, "{:?}: {} != {}", window, mle, loaded);
	}
	for ((state, observation), mle) in a.emissions() {
		let loaded = b.emission(state, observation);
		assert!((mle - loaded).abs() < 1e-15, "{} {:?}: {} != {}", state, observation, mle, loaded);
	}
}

#[test]
fn saved_models_load_back_for_every_order() {
	let dir = tempfile::tempdir().unwrap();
	for order in 1..=5 {
		let corpus = random_corpus(order as u64, 40);
		let model = HmmModel::train(&corpus, HmmConfig::with_order(order)).unwrap();

		let path = dir.path().join(format!("order{}.mdl", order));
		model.save(&path).unwrap();
		let loaded = HmmModel::load(&path).unwrap();

		assert_same_tables(&model, &loaded);
		let mut states: Vec<&str> = model.states().collect();
		let mut loaded_states: Vec<&str> = loaded.states().collect();
		states.sort();
		loaded_states.sort();
		assert_eq!(states, loaded_states);
	}
}

#[test]
fn corpus_files_train_like_in_memory_records() {
	let dir = tempfile::tempdir().unwrap();
	let corpus = random_corpus(7, 25);
	let path = dir.path().join("corpus.txt");
	std::fs::write(&path, corpus.join("\n")).unwrap();

	let from_file = HmmModel::train_file(&path, HmmConfig::with_order(3)).unwrap();
	let in_memory = HmmModel::train(&corpus, HmmConfig::with_order(3)).unwrap();
	assert_eq!(from_file.to_model_string(), in_memory.to_model_string());
}

#[test]
fn binary_snapshot_matches_the_text_model() {
	let dir = tempfile::tempdir().unwrap();
	let model = HmmModel::train(random_corpus(3, 30), HmmConfig::with_order(2)).unwrap();

	let path = dir.path().join("model.bin");
	model.save_binary(&path).unwrap();
	let loaded = HmmModel::load_binary(&path).unwrap();

	assert_same_tables(&model, &loaded);
	assert_eq!(model.states().collect::<Vec<_>>(), loaded.states().collect::<Vec<_>>());
	let observations = ["LOW", "CAP", " ", "SFL", "SPC"];
	assert_eq!(model.decode(&observations).unwrap(), loaded.decode(&observations).unwrap());
}

#[test]
fn training_replaces_previous_content() {
	let first = HmmModel::train(["a\tX"], HmmConfig::with_order(2)).unwrap();
	let second = HmmModel::train(["b\tY"], HmmConfig::with_order(2)).unwrap();
	assert_eq!(first.states().collect::<Vec<_>>(), vec!["X"]);
	assert_eq!(second.states().collect::<Vec<_>>(), vec!["Y"]);
}

#[test]
fn missing_and_garbled_files_are_errors() {
	let dir = tempfile::tempdir().unwrap();
	assert!(matches!(HmmModel::load(dir.path().join("missing.mdl")), Err(HmmError::Io(_))));

	let path = dir.path().join("garbled.mdl");
	std::fs::write(&path, "three\n").unwrap();
	assert!(matches!(HmmModel::load(&path), Err(HmmError::ModelFormat { line: 1, .. })));

	std::fs::write(&path, b"\x00\x01garbage").unwrap();
	assert!(HmmModel::load_binary(&path).is_err());
}
