// Console front-end for the backpropagation trainer: loads the teaching
// and unknown data files, trains until convergence and prints the error
// trajectory plus the per-record outputs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use bpnnet::dataset::{read_examples, read_inputs, Example};
use bpnnet::feedforward::{Activations, Geometry, Net, TrainOutcome};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Training data file, one record of inputs then targets per line
    #[arg(long, default_value = "teaching_data.txt")]
    teach: PathBuf,

    /// Unknown data file, one record of inputs per line
    #[arg(long, default_value = "unknown_data.txt")]
    unknown: PathBuf,

    /// Number of input cells
    #[arg(long, default_value_t = 10)]
    inputs: usize,

    /// Number of hidden-layer cells
    #[arg(long, default_value_t = 10)]
    hidden: usize,

    /// Number of output cells
    #[arg(long, default_value_t = 2)]
    outputs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 5.0)]
    mu: f64,

    /// Convergence limit for the per-cycle cumulative squared error
    #[arg(long, default_value_t = 0.001)]
    limit: f64,

    /// Stop with an error after this many cycles instead of looping
    /// until convergence
    #[arg(long)]
    max_cycles: Option<usize>,

    /// Seed for weight initialization; omit for a fresh random net
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .init();

    let geometry = Geometry {
        inputs: args.inputs,
        hidden: args.hidden,
        outputs: args.outputs,
    };

    let coefficients = args.seed.map(|seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (
            Net::random_coeffs(&mut rng, geometry.hidden, geometry.inputs),
            Net::random_coeffs(&mut rng, geometry.outputs, geometry.hidden),
        )
    });
    let net = Net::new(geometry, coefficients)?;

    let examples = load_examples(&args.teach, &geometry)?;
    debug!(
        "{} training examples from {}",
        examples.len(),
        args.teach.display()
    );

    let mut trainer = net.build_trainer(args.mu);
    let outcome =
        trainer.train_to_convergence(&examples, args.limit, args.max_cycles, |cycle, err| {
            println!("{:<8}{:.6}", cycle, err);
        })?;

    if let TrainOutcome::CycleLimit { cycles, error } = outcome {
        bail!(
            "did not converge within {} cycles (error {:.6})",
            cycles,
            error
        );
    }

    let net = trainer.teardown();
    let mut acts = Activations::new(&geometry);

    println!("training examples: {}", examples.len());
    println!("--teaching_data--");
    for (i, example) in examples.iter().enumerate() {
        net.forward(example.inputs(), &mut acts)?;
        print_record(i, example.inputs(), &acts.output);
    }

    let unknowns = load_inputs(&args.unknown, &geometry)?;
    debug!(
        "{} unknown records from {}",
        unknowns.len(),
        args.unknown.display()
    );

    println!("unknown examples: {}", unknowns.len());
    println!("--unknown_data--");
    for (i, inputs) in unknowns.iter().enumerate() {
        net.forward(inputs, &mut acts)?;
        print_record(i, inputs, &acts.output);
    }

    Ok(())
}

fn load_examples(path: &Path, geometry: &Geometry) -> Result<Vec<Example>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let examples = read_examples(BufReader::new(file), geometry.inputs, geometry.outputs)
        .with_context(|| format!("bad training data in {}", path.display()))?;
    Ok(examples)
}

fn load_inputs(path: &Path, geometry: &Geometry) -> Result<Vec<Box<[f64]>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let records = read_inputs(BufReader::new(file), geometry.inputs)
        .with_context(|| format!("bad unknown data in {}", path.display()))?;
    Ok(records)
}

/// One result row: index, the inputs, a separator, then the outputs.
fn print_record(index: usize, inputs: &[f64], outputs: &[f64]) {
    print!("{:<5}", index);
    for v in inputs {
        print!("{:.6} ", v);
    }
    print!("| ");
    for v in outputs {
        print!("{:.6} ", v);
    }
    println!();
}
