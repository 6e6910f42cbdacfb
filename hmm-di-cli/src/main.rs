use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hmm_di_core::{Decoder, HmmConfig, HmmModel};
use log::info;

/// Train and run order-N hidden Markov models.
#[derive(Parser, Debug)]
#[command(name = "hmm-di", version, about)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Train a model from `observation<delim>state` records
	Train(TrainArgs),

	/// Label observation sequences with a trained model
	Decode(DecodeArgs),

	/// Print a summary of a model
	Info(InfoArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
	/// Training corpus, one record per line
	corpus: PathBuf,

	/// Where to write the textual model
	model: PathBuf,

	/// Model order; values outside 1..=5 fall back to 1
	#[arg(long, default_value_t = 3, allow_negative_numbers = true)]
	order: i64,

	/// Separator between observation and state
	#[arg(long, default_value = "\t")]
	count_delim: String,

	/// Record closing a sequence
	#[arg(long, default_value = "*_*")]
	sequence_delim: String,

	/// Also write a binary snapshot next to the model
	#[arg(long)]
	binary: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
	/// Textual model (a fresh `.bin` snapshot next to it is preferred)
	model: PathBuf,

	/// Observations, one per line; sequence delimiter lines split sequences.
	/// Reads stdin when omitted.
	input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InfoArgs {
	model: PathBuf,
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match Cli::parse().command {
		Commands::Train(args) => train(args),
		Commands::Decode(args) => decode(args),
		Commands::Info(args) => print_info(args),
	}
}

fn train(args: TrainArgs) -> Result<()> {
	let mut config = HmmConfig::with_order(args.order);
	config.count_delim = args.count_delim;
	config.sequence_delim = args.sequence_delim;

	let model = HmmModel::train_file(&args.corpus, config)
		.with_context(|| format!("training on {}", args.corpus.display()))?;
	model.save(&args.model).with_context(|| format!("writing {}", args.model.display()))?;
	if args.binary {
		let binary = args.model.with_extension("bin");
		model.save_binary(&binary).with_context(|| format!("writing {}", binary.display()))?;
	}
	Ok(())
}

fn decode(args: DecodeArgs) -> Result<()> {
	let model = HmmModel::open(&args.model).with_context(|| format!("loading {}", args.model.display()))?;
	let decoder = Decoder::new(&model)?;

	let text = match &args.input {
		Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
		None => {
			let mut text = String::new();
			io::stdin().read_to_string(&mut text).context("reading stdin")?;
			text
		}
	};

	let delimiter = model.config().sequence_delim.as_str();
	let mut sequences: Vec<Vec<&str>> = vec![Vec::new()];
	for line in text.lines().filter(|l| !l.is_empty()) {
		if line.trim() == delimiter {
			sequences.push(Vec::new());
		} else if let Some(current) = sequences.last_mut() {
			current.push(line);
		}
	}
	let closed = sequences.len() - 1;
	info!("decoding {} sequences", sequences.len());

	let labelled = decoder.decode_many(&sequences);
	let mut out = BufWriter::new(io::stdout().lock());
	for (i, (sequence, labels)) in sequences.iter().zip(&labelled).enumerate() {
		for (observation, label) in sequence.iter().zip(labels) {
			writeln!(out, "{}{}{}", observation, model.config().count_delim, label)?;
		}
		if i < closed {
			writeln!(out, "{}", delimiter)?;
		}
	}
	out.flush()?;
	Ok(())
}

fn print_info(args: InfoArgs) -> Result<()> {
	let model = HmmModel::open(&args.model).with_context(|| format!("loading {}", args.model.display()))?;
	let weights: Vec<String> = model.smoothing().as_slice().iter().map(f64::to_string).collect();

	println!("order:        {}", model.order());
	println!("smoothing:    {}", weights.join(" "));
	println!("states:       {}", model.states().collect::<Vec<_>>().join(" "));
	println!("observations: {}", model.observations().count());
	println!("transitions:  {}", model.transition_count());
	println!("emissions:    {}", model.emission_count());
	Ok(())
}
