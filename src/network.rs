use crate::backprop::GradientLayout;
use crate::error::{Error, Result};
use crate::math;
use ndarray::{Array, Array1, Array2, s};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::Normal};

/// A fully-connected feedforward network. The network with neuron layers of
/// sizes [s0, s1, ..., sn] has n layer transitions; transition l owns an
/// [s(l+1) x s(l)] weight matrix and a bias vector of length s(l+1). Entry
/// (i, j) of a weight matrix is the weight from source neuron j to destination
/// neuron i.
#[derive(Clone)]
pub struct Network {
    sizes: Vec<usize>,
    pub(crate) weights: Vec<Array2<f64>>,
    pub(crate) biases: Vec<Array1<f64>>,
}

/// Everything one forward pass produces: the raw (pre-sigmoid) value vector of
/// every transition and the activation vector of every neuron layer, with the
/// input itself at position 0. Backpropagation needs the whole trace, not just
/// the final output.
pub struct ForwardTrace {
    pub raws: Vec<Array1<f64>>,
    pub activations: Vec<Array1<f64>>,
}

impl ForwardTrace {
    /// Activations of the output layer.
    pub fn output(&self) -> &Array1<f64> {
        &self.activations[self.activations.len() - 1]
    }
}

impl Network {
    /// Builds a network with the given neuron count per layer, with every
    /// weight and bias drawn independently from a normal distribution of mean
    /// 0 and the given standard deviation. At least two layers are required
    /// (anything less has no transition to train), and every layer needs at
    /// least one neuron.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], std_dev: f64, rng: &mut R) -> Result<Network> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(Error::InvalidNetworkShape);
        }
        if !(std_dev > 0.0 && std_dev.is_finite()) {
            return Err(Error::InvalidStandardDeviation(std_dev));
        }
        let normal =
            Normal::new(0.0, std_dev).map_err(|_| Error::InvalidStandardDeviation(std_dev))?;

        Ok(Network {
            weights: sizes
                // For each pair of adjacent layer sizes...
                .iter()
                .zip(sizes.iter().skip(1))
                // Make a [next_size x current_size] matrix of normal draws.
                .map(|(&current_size, &next_size)| {
                    Array::random_using((next_size, current_size), normal, rng)
                })
                .collect(),
            biases: sizes
                // For each layer size except the input layer's...
                .iter()
                .skip(1)
                // Make a vector of normal draws of that length.
                .map(|&size| Array::random_using(size, normal, rng))
                .collect(),
            sizes: sizes.to_vec(),
        })
    }

    /// Number of layer transitions (one less than the number of neuron layers).
    pub fn transitions(&self) -> usize {
        self.sizes.len() - 1
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// Total number of trainable values: every weight plus every bias. This is
    /// the length of the flat gradient vector.
    pub fn total_values(&self) -> usize {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(weights, biases)| weights.len() + biases.len())
            .sum()
    }

    /// Runs the network on one input, retaining the raw values and
    /// activations of every layer. The input length must match the input
    /// layer size.
    pub fn forward(&self, input: &Array1<f64>) -> Result<ForwardTrace> {
        if input.len() != self.input_size() {
            return Err(Error::DimensionMismatch {
                expected: self.input_size(),
                actual: input.len(),
            });
        }

        let mut raws = Vec::with_capacity(self.transitions());
        let mut activations = Vec::with_capacity(self.transitions() + 1);

        // Each transition computes raw = W·a + b, then a' = σ(raw). The
        // previous activation is pushed once the next raw value has been
        // computed from it, so the loop ends with the output activation still
        // in hand; it is pushed after the loop.
        let mut activation = input.clone();
        for (weights, biases) in self.weights.iter().zip(self.biases.iter()) {
            let mut raw = math::mat_vec_mul(weights, &activation)?;
            math::add_assign(&mut raw, biases)?;
            activations.push(activation);
            activation = raw.mapv(math::sigmoid);
            raws.push(raw);
        }
        activations.push(activation);

        Ok(ForwardTrace { raws, activations })
    }

    /// Moves every weight and bias down the gradient: value -= step · g. The
    /// gradient must be laid out according to `layout`, which both the
    /// backpropagation writer and this reader share.
    pub fn apply_gradient(
        &mut self,
        gradient: &Array1<f64>,
        layout: &GradientLayout,
        step: f64,
    ) -> Result<()> {
        if gradient.len() != layout.total_values() {
            return Err(Error::DimensionMismatch {
                expected: layout.total_values(),
                actual: gradient.len(),
            });
        }

        for (l, segment) in layout.segments().iter().enumerate() {
            // Row-major iteration over the weight matrix matches the
            // flattened layout of its gradient segment.
            for (weight, g) in self.weights[l]
                .iter_mut()
                .zip(gradient.slice(s![segment.weights.start..segment.weights.end]))
            {
                *weight -= g * step;
            }
            for (bias, g) in self.biases[l]
                .iter_mut()
                .zip(gradient.slice(s![segment.biases.start..segment.biases.end]))
            {
                *bias -= g * step;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn construction_rejects_degenerate_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            Network::new(&[5], 1.0, &mut rng),
            Err(Error::InvalidNetworkShape)
        ));
        assert!(matches!(
            Network::new(&[5, 0, 3], 1.0, &mut rng),
            Err(Error::InvalidNetworkShape)
        ));
        assert!(matches!(
            Network::new(&[5, 3], -1.0, &mut rng),
            Err(Error::InvalidStandardDeviation(_))
        ));
    }

    #[test]
    fn total_values_counts_every_weight_and_bias() {
        let mut rng = StdRng::seed_from_u64(1);
        let network = Network::new(&[3, 4, 2], 1.0, &mut rng).unwrap();

        // 4x3 weights + 4 biases, then 2x4 weights + 2 biases.
        assert_eq!(network.total_values(), 12 + 4 + 8 + 2);
        assert_eq!(network.transitions(), 2);
        assert_eq!(network.input_size(), 3);
        assert_eq!(network.output_size(), 2);
    }

    #[test]
    fn forward_retains_the_whole_trace() {
        let mut rng = StdRng::seed_from_u64(2);
        let network = Network::new(&[2, 3, 2], 1.0, &mut rng).unwrap();
        let input = array![0.25, 0.75];

        let trace = network.forward(&input).unwrap();

        assert_eq!(trace.raws.len(), 2);
        assert_eq!(trace.activations.len(), 3);
        assert_eq!(trace.activations[0], input);
        assert_eq!(trace.output().len(), 2);
    }

    #[test]
    fn forward_computes_raw_and_activation_per_layer() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut network = Network::new(&[2, 2], 1.0, &mut rng).unwrap();
        network.weights[0] = array![[1.0, -1.0], [0.5, 0.5]];
        network.biases[0] = array![0.0, 1.0];

        let trace = network.forward(&array![0.2, 0.6]).unwrap();

        let expected_raw = array![0.2 - 0.6, 0.5 * 0.2 + 0.5 * 0.6 + 1.0];
        for (raw, expected) in trace.raws[0].iter().zip(expected_raw.iter()) {
            assert!((raw - expected).abs() < 1e-12);
        }
        for (a, z) in trace.activations[1].iter().zip(trace.raws[0].iter()) {
            assert!((a - math::sigmoid(*z)).abs() < 1e-12);
        }
    }

    #[test]
    fn forward_rejects_wrong_input_length() {
        let mut rng = StdRng::seed_from_u64(4);
        let network = Network::new(&[3, 2], 1.0, &mut rng).unwrap();

        assert!(network.forward(&array![1.0, 2.0]).is_err());
    }
}
