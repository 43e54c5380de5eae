use clap::Parser;
use ndarray_rand::rand::thread_rng;
use std::{path::PathBuf, process::ExitCode};

mod backprop;
mod error;
mod math;
mod mnist;
mod network;
mod train;

const HIDDEN_NEURONS: usize = 16;
const OUTPUT_NEURONS: usize = 10;

/// Trains a multilayer perceptron to classify handwritten digits.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the IDX image file (optionally gzip-compressed)
    images: PathBuf,

    /// Path to the IDX label file (optionally gzip-compressed)
    labels: PathBuf,

    /// Number of passes over the full dataset
    #[arg(long, default_value_t = 5)]
    iterations: u32,

    /// Number of mini-batches per iteration
    #[arg(long, default_value_t = 20)]
    groups: usize,

    /// Initial gradient-descent step size
    #[arg(long, default_value_t = 0.1)]
    step_size: f64,
}

fn run(args: &Args) -> error::Result<()> {
    let mut rng = thread_rng();

    let mut dataset = mnist::Dataset::load(&args.images, &args.labels)?;
    println!(
        "Loaded {} samples of {} pixels each",
        dataset.samples.len(),
        dataset.dimensions
    );

    let sizes = [
        dataset.dimensions,
        HIDDEN_NEURONS,
        HIDDEN_NEURONS,
        OUTPUT_NEURONS,
    ];
    let mut network = network::Network::new(&sizes, 1.0, &mut rng)?;

    train::train(
        &mut network,
        &mut dataset,
        args.iterations,
        args.groups,
        args.step_size,
        &mut rng,
    )
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(error) = run(&args) {
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
