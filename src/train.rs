use crate::backprop::{self, GradientLayout};
use crate::error::{Error, Result};
use crate::math;
use crate::mnist::{Dataset, Sample};
use crate::network::Network;
use ndarray::Array1;
use ndarray_rand::rand::Rng;
use std::slice::ChunksExact;

/// Trains the network with mini-batch gradient descent. Every iteration
/// reshuffles the dataset, partitions it into `num_groups` mini-batches, and
/// runs one optimize step per batch. When an iteration's total cost fails to
/// drop below 90% of the previous iteration's, the step size is halved.
pub fn train<R: Rng + ?Sized>(
    network: &mut Network,
    dataset: &mut Dataset,
    iterations: u32,
    num_groups: usize,
    mut step_size: f64,
    rng: &mut R,
) -> Result<()> {
    if num_groups == 0 || num_groups > dataset.samples.len() {
        return Err(Error::InvalidGroupCount {
            groups: num_groups,
            samples: dataset.samples.len(),
        });
    }

    let layout = GradientLayout::of(network);

    // Infinity means the first iteration can never look like a regression.
    let mut previous_cost = f64::INFINITY;
    for iteration in 0..iterations {
        println!("\n--- Starting iteration {} of {iterations} ---", iteration + 1);
        dataset.shuffle(rng);

        let mut cost = 0.0;
        for batch in mini_batches(&dataset.samples, num_groups) {
            cost += optimize(network, &layout, batch, step_size)?;
        }

        step_size = adapt_step_size(step_size, cost, previous_cost);
        previous_cost = cost;
    }

    Ok(())
}

/// Splits the dataset into `num_groups` contiguous mini-batches of
/// `len / num_groups` samples each. Remainder samples get no batch; after the
/// per-iteration reshuffle a different remainder is left out each time.
fn mini_batches(samples: &[Sample], num_groups: usize) -> ChunksExact<'_, Sample> {
    samples.chunks_exact(samples.len() / num_groups)
}

/// One gradient-descent step over one mini-batch: run every sample forward,
/// backpropagate its gradient, sum the per-sample gradients, then move the
/// parameters by step_size / batch_size along the summed gradient. Returns
/// the batch's summed squared-error cost.
fn optimize(
    network: &mut Network,
    layout: &GradientLayout,
    batch: &[Sample],
    step_size: f64,
) -> Result<f64> {
    let mut sum_gradient = Array1::zeros(network.total_values());
    let mut sample_gradient = Array1::zeros(network.total_values());

    let mut cost = 0.0;
    let mut correct_guesses = 0;
    for sample in batch {
        let trace = network.forward(&sample.pixels)?;
        let expected = one_hot(sample.label, network.output_size());

        if math::max_index(trace.output()) == usize::from(sample.label) {
            correct_guesses += 1;
        }
        cost += math::squared_distance(&expected, trace.output())?;

        backprop::compute(network, &trace, &expected, layout, &mut sample_gradient)?;
        math::add_assign(&mut sum_gradient, &sample_gradient)?;
    }

    println!("Gradient magnitude: {:.6}", math::magnitude(&sum_gradient));
    println!("Batch cost: {cost:.6}");
    println!("Correct guesses: {correct_guesses} out of {}", batch.len());

    network.apply_gradient(&sum_gradient, layout, step_size / batch.len() as f64)?;

    Ok(cost)
}

/// The one-hot target for a label: 1.0 at the label's index, 0.0 elsewhere.
fn one_hot(label: u8, classes: usize) -> Array1<f64> {
    Array1::from_shape_fn(classes, |i| if i == usize::from(label) { 1.0 } else { 0.0 })
}

/// Halves the step size when an iteration's cost stays above 90% of the
/// previous iteration's, keeps it otherwise.
fn adapt_step_size(step_size: f64, cost: f64, previous_cost: f64) -> f64 {
    if cost > previous_cost * 0.9 {
        println!("\nHalving step size");
        step_size * 0.5
    } else {
        step_size
    }
}
