//! Backpropagation: the exact per-parameter gradient of the squared-error
//! cost for one sample, written into a flat vector whose layout is shared
//! with the parameter-update step.
//!
//! Notation, for one layer transition during the reverse pass:
//!   y_i  = expected value of destination node i
//!   a_i  = activation of destination node i
//!   z_i  = raw (pre-sigmoid) value of destination node i
//!   w_ij = weight from source node j to destination node i
//!   b_i  = bias of destination node i

use crate::error::{Error, Result};
use crate::math;
use crate::network::{ForwardTrace, Network};
use ndarray::Array1;
use std::ops::Range;

/// Index ranges of one transition's blocks inside the flat gradient vector:
/// the row-major flattened weight gradient, then the bias gradient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub weights: Range<usize>,
    pub biases: Range<usize>,
}

/// Where each transition's weight and bias gradients live inside the flat
/// gradient vector. The vector is packed from the last transition to the
/// first, weights before biases. Both the writer (backpropagation) and the
/// reader (the parameter update) address the vector through this one
/// description, so the two can never disagree on offsets.
pub struct GradientLayout {
    // Indexed by transition, front of the network first, even though the
    // offsets run back to front.
    segments: Vec<Segment>,
    total_values: usize,
}

impl GradientLayout {
    pub fn of(network: &Network) -> GradientLayout {
        let transitions = network.transitions();
        let mut segments = vec![
            Segment {
                weights: 0..0,
                biases: 0..0,
            };
            transitions
        ];

        let mut offset = 0;
        for l in (0..transitions).rev() {
            let weight_count = network.weights[l].len();
            let bias_count = network.biases[l].len();
            segments[l] = Segment {
                weights: offset..offset + weight_count,
                biases: offset + weight_count..offset + weight_count + bias_count,
            };
            offset += weight_count + bias_count;
        }

        GradientLayout {
            segments,
            total_values: offset,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_values(&self) -> usize {
        self.total_values
    }
}

/// Computes the gradient of one sample's squared-error cost with respect to
/// every weight and bias, writing it into `gradient` according to `layout`.
/// The gradient vector must have exactly `total_values` elements. Pure
/// function of the network, the forward trace, and the expected output.
pub fn compute(
    network: &Network,
    trace: &ForwardTrace,
    expected: &Array1<f64>,
    layout: &GradientLayout,
    gradient: &mut Array1<f64>,
) -> Result<()> {
    if gradient.len() != layout.total_values() {
        return Err(Error::DimensionMismatch {
            expected: layout.total_values(),
            actual: gradient.len(),
        });
    }
    if expected.len() != network.output_size() {
        return Err(Error::DimensionMismatch {
            expected: network.output_size(),
            actual: expected.len(),
        });
    }

    // Derivative of the cost C = Σ (a_i - y_i)² with respect to the output
    // activations: dC/da_i = 2 (a_i - y_i).
    let mut dc_da: Array1<f64> = trace.output().iter().zip(expected.iter())
        .map(|(a, y)| 2.0 * (a - y))
        .collect();

    // Walk the transitions from the last back to the first, reusing the
    // freshly propagated dC/da as the next iteration's starting point.
    for l in (0..network.transitions()).rev() {
        // da_i/dz_i for every destination node of this transition.
        let da_dz = trace.raws[l].mapv(math::sigmoid_derivative);

        // dC/db_i = da_i/dz_i · dC/da_i, and the weight gradient reuses it:
        // dC/dw_ij = a_j(prev) · dC/db_i. activations[l] is the transition's
        // source layer (the input sits at position 0 of the trace).
        let dc_db = &da_dz * &dc_da;
        let source = &trace.activations[l];
        let width = source.len();
        let dc_dw =
            Array1::from_shape_fn(dc_db.len() * width, |k| source[k % width] * dc_db[k / width]);

        // dC/da_j(prev) = Σ_i w_ij · da_i/dz_i · dC/da_i. Skipped on the
        // first transition; there is no earlier layer to propagate to.
        if l != 0 {
            dc_da = network.weights[l].t().dot(&dc_db);
        }

        let segment = &layout.segments[l];
        math::copy_into(gradient, &dc_dw, segment.weights.start)?;
        math::copy_into(gradient, &dc_db, segment.biases.start)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;
    use ndarray::{Array1, array};
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    fn one_hot(label: usize, len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |i| if i == label { 1.0 } else { 0.0 })
    }

    fn cost(network: &Network, input: &Array1<f64>, expected: &Array1<f64>) -> f64 {
        let trace = network.forward(input).unwrap();
        math::squared_distance(expected, trace.output()).unwrap()
    }

    #[test]
    fn layout_packs_last_transition_first() {
        let mut rng = StdRng::seed_from_u64(10);
        let network = Network::new(&[2, 3, 2], 1.0, &mut rng).unwrap();

        let layout = GradientLayout::of(&network);

        // Transition 1 (3 -> 2): 6 weights then 2 biases at the front.
        // Transition 0 (2 -> 3): 6 weights then 3 biases behind them.
        assert_eq!(layout.segments()[1].weights, 0..6);
        assert_eq!(layout.segments()[1].biases, 6..8);
        assert_eq!(layout.segments()[0].weights, 8..14);
        assert_eq!(layout.segments()[0].biases, 14..17);
        assert_eq!(layout.total_values(), 17);
        assert_eq!(layout.total_values(), network.total_values());
    }

    #[test]
    fn compute_rejects_a_wrongly_sized_gradient_vector() {
        let mut rng = StdRng::seed_from_u64(11);
        let network = Network::new(&[2, 3], 1.0, &mut rng).unwrap();
        let layout = GradientLayout::of(&network);
        let trace = network.forward(&array![0.1, 0.9]).unwrap();
        let mut gradient = Array1::zeros(network.total_values() + 1);

        let result = compute(&network, &trace, &one_hot(1, 3), &layout, &mut gradient);

        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn layout_round_trips_through_the_parameter_update() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut network = Network::new(&[2, 3, 2], 1.0, &mut rng).unwrap();
        let layout = GradientLayout::of(&network);

        // A unit gradient at the first index of transition 0's bias block
        // must move exactly bias 0 of transition 0 and nothing else.
        let mut gradient = Array1::zeros(layout.total_values());
        gradient[layout.segments()[0].biases.start] = 1.0;

        let before = network.clone();
        network.apply_gradient(&gradient, &layout, 0.25).unwrap();

        assert!((network.biases[0][0] - (before.biases[0][0] - 0.25)).abs() < 1e-12);
        assert_eq!(network.biases[0][1], before.biases[0][1]);
        assert_eq!(network.biases[1], before.biases[1]);
        assert_eq!(network.weights[0], before.weights[0]);
        assert_eq!(network.weights[1], before.weights[1]);
    }

    #[test]
    fn gradient_matches_finite_differences_on_a_single_transition() {
        let mut rng = StdRng::seed_from_u64(13);
        let network = Network::new(&[2, 3], 1.0, &mut rng).unwrap();
        let layout = GradientLayout::of(&network);
        let input = array![0.3, 0.7];
        let expected = one_hot(1, 3);

        let trace = network.forward(&input).unwrap();
        let mut gradient = Array1::zeros(layout.total_values());
        compute(&network, &trace, &expected, &layout, &mut gradient).unwrap();

        // Perturb one parameter at a time through the same layout the writer
        // used, so this also pins the write offsets to the read offsets.
        let eps = 1e-5;
        for k in 0..layout.total_values() {
            let mut unit = Array1::zeros(layout.total_values());
            unit[k] = 1.0;

            let mut plus = network.clone();
            plus.apply_gradient(&unit, &layout, -eps).unwrap();
            let mut minus = network.clone();
            minus.apply_gradient(&unit, &layout, eps).unwrap();

            let numeric =
                (cost(&plus, &input, &expected) - cost(&minus, &input, &expected)) / (2.0 * eps);
            assert!(
                (gradient[k] - numeric).abs() < 1e-6,
                "parameter {k}: analytic {} vs numeric {numeric}",
                gradient[k]
            );
        }
    }

    #[test]
    fn gradient_matches_finite_differences_with_a_hidden_layer() {
        let mut rng = StdRng::seed_from_u64(14);
        let network = Network::new(&[3, 4, 2], 1.0, &mut rng).unwrap();
        let layout = GradientLayout::of(&network);
        let input = array![0.9, 0.1, 0.4];
        let expected = one_hot(0, 2);

        let trace = network.forward(&input).unwrap();
        let mut gradient = Array1::zeros(layout.total_values());
        compute(&network, &trace, &expected, &layout, &mut gradient).unwrap();

        let eps = 1e-5;
        for k in 0..layout.total_values() {
            let mut unit = Array1::zeros(layout.total_values());
            unit[k] = 1.0;

            let mut plus = network.clone();
            plus.apply_gradient(&unit, &layout, -eps).unwrap();
            let mut minus = network.clone();
            minus.apply_gradient(&unit, &layout, eps).unwrap();

            let numeric =
                (cost(&plus, &input, &expected) - cost(&minus, &input, &expected)) / (2.0 * eps);
            assert!(
                (gradient[k] - numeric).abs() < 1e-6,
                "parameter {k}: analytic {} vs numeric {numeric}",
                gradient[k]
            );
        }
    }
}
