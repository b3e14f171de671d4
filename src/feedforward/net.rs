use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use std::fmt;

use super::trainer::Trainer;

/// Cell counts of the network. Fixed at construction, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// The number of input cells.
    pub inputs: usize,
    /// The number of hidden-layer cells.
    pub hidden: usize,
    /// The number of output cells.
    pub outputs: usize,
}

impl Geometry {
    /// Length of the hidden-layer coefficient array:
    /// each hidden cell holds one weight per input plus a bias weight.
    pub(super) fn hidden_coeffs_len(&self) -> usize {
        self.hidden * (self.inputs + 1)
    }

    /// Length of the output-layer coefficient array.
    pub(super) fn output_coeffs_len(&self) -> usize {
        self.outputs * (self.hidden + 1)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}-{}", self.inputs, self.hidden, self.outputs)
    }
}

/// Activation buffers for one forward pass.
///
/// Transient scratch state: every call to `Net::forward` overwrites both
/// slices in full, so nothing carries over between examples.
pub struct Activations {
    /// Hidden-layer activations, one per hidden cell.
    pub hidden: Box<[f64]>,
    /// Output-layer activations, one per output cell.
    pub output: Box<[f64]>,
}

impl Activations {
    /// Returns zeroed buffers sized for the given geometry.
    pub fn new(geometry: &Geometry) -> Activations {
        Activations {
            hidden: vec![0.0; geometry.hidden].into_boxed_slice(),
            output: vec![0.0; geometry.outputs].into_boxed_slice(),
        }
    }
}

/// Neural network structure
#[derive(Debug)]
pub struct Net {
    /// The cell counts of the three layers.
    pub(super) geometry: Geometry,

    /// Hidden-layer coefficients (weights & biases).
    ///
    /// Stored flat, one row per hidden cell:
    /// `row = [weights]bias`
    /// so each row is `inputs + 1` long and the bias weight sits in the
    /// last column. The bias is subtracted from the weighted sum, not
    /// added; the matching weight update in `Trainer` flips the sign back.
    pub(super) hidden_coeffs: Box<[f64]>,

    /// Output-layer coefficients, same layout with `hidden + 1` columns.
    pub(super) output_coeffs: Box<[f64]>,
}

impl Net {
    /// Returns a network for the given geometry.
    /// Without explicit coefficients it gets random ones from the
    /// half-open range [-1,1).
    ///
    /// # Arguments
    /// * `geometry` - cell counts of the input, hidden and output layers;
    /// * `coefficients` - hidden and output coefficient arrays (optional).
    ///
    /// # Returns
    /// * `Ok(Net)` if the coefficient arrays match the geometry, or none
    ///   were provided;
    /// * `Err(NewNetError)` otherwise.
    ///
    /// # Examples
    /// * Using random coefficients
    /// ```
    /// # use bpnnet::feedforward::{Geometry, Net};
    /// let net = Net::new(Geometry { inputs: 10, hidden: 10, outputs: 2 }, None).unwrap();
    /// ```
    /// * Using given coefficients
    /// ```
    /// # use bpnnet::feedforward::{Geometry, Net};
    /// let hidden = vec![0.25; 6].into_boxed_slice();
    /// let output = vec![0.25; 4].into_boxed_slice();
    /// let net = Net::new(Geometry { inputs: 1, hidden: 3, outputs: 1 }, Some((hidden, output))).unwrap();
    /// ```
    pub fn new(
        geometry: Geometry,
        coefficients: Option<(Box<[f64]>, Box<[f64]>)>,
    ) -> Result<Net, NewNetError> {
        if geometry.inputs == 0 || geometry.hidden == 0 || geometry.outputs == 0 {
            return Err(NewNetError::BadGeometry(geometry));
        }

        let (hidden_coeffs, output_coeffs) = match coefficients {
            Some((hidden, output)) => {
                if hidden.len() != geometry.hidden_coeffs_len() {
                    return Err(NewNetError::BadHiddenCoeffs(SizeMismatch {
                        expected: geometry.hidden_coeffs_len(),
                        got: hidden.len(),
                    }));
                }
                if output.len() != geometry.output_coeffs_len() {
                    return Err(NewNetError::BadOutputCoeffs(SizeMismatch {
                        expected: geometry.output_coeffs_len(),
                        got: output.len(),
                    }));
                }
                (hidden, output)
            }
            None => {
                let mut rng = rand::thread_rng();
                (
                    Net::random_coeffs(&mut rng, geometry.hidden, geometry.inputs),
                    Net::random_coeffs(&mut rng, geometry.outputs, geometry.hidden),
                )
            }
        };

        Ok(Net {
            geometry,
            hidden_coeffs,
            output_coeffs,
        })
    }

    /// Draws coefficients for one layer of `cell_count` cells with
    /// `fan_in` inbound connections each. Every weight and every bias is
    /// an independent uniform draw from [-1,1).
    pub fn random_coeffs<R: Rng>(rng: &mut R, cell_count: usize, fan_in: usize) -> Box<[f64]> {
        let between = Uniform::from(-1.0..1.0);
        let coeffs: Vec<f64> = between
            .sample_iter(rng)
            .take(cell_count * (fan_in + 1))
            .collect();
        coeffs.into_boxed_slice()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Exports geometry and both coefficient arrays from the network.
    ///
    /// # Returns
    /// `(geometry, hidden coefficients, output coefficients)`.
    pub fn export(&self) -> (&Geometry, &[f64], &[f64]) {
        (&self.geometry, &self.hidden_coeffs, &self.output_coeffs)
    }

    /// Sigmoid function.
    /// Implements the formula:
    /// `1 / (1 + exp(-u))`.
    pub(super) fn sigmoid(u: f64) -> f64 {
        1.0 / (1.0 + (-u).exp())
    }

    /// Sigmoid derivative function, expressed in terms of sigmoid itself.
    /// Implements the formula:
    /// `s * (1 - s)`.
    pub(super) fn sigmoid_der_s(s: f64) -> f64 {
        s * (1.0 - s)
    }

    /// Cell activation function.
    ///
    /// Implements the formula:
    /// `sigmoid((prev_activations . weights) - bias)`,
    /// the bias weight being the last element of `coeffs`.
    fn calc_activation(prev_activations: &[f64], coeffs: &[f64]) -> f64 {
        let (weights, bias) = coeffs.split_at(coeffs.len() - 1);
        let u: f64 = prev_activations
            .iter()
            .zip(weights.iter())
            .map(|(&a, &w)| a * w)
            .sum();
        Net::sigmoid(u - bias[0])
    }

    /// Fills `activations` from the previous layer's activations and one
    /// layer's coefficient array.
    fn process_layer(prev_activations: &[f64], coeffs: &[f64], activations: &mut [f64]) {
        let stride = prev_activations.len() + 1;
        // For each cell in layer
        for (z, cell_coeffs) in activations.iter_mut().zip(coeffs.chunks_exact(stride)) {
            *z = Net::calc_activation(prev_activations, cell_coeffs);
        }
    }

    /// Calculates hidden and output activations for one input vector.
    ///
    /// Pure with respect to the network: identical weights and inputs
    /// always produce bit-identical activations. Large-magnitude weighted
    /// sums are left to saturate per IEEE-754 rather than clamped.
    ///
    /// # Arguments
    /// * `inputs` - slice that holds activations of input cells;
    /// * `activations` - buffers that will be filled with hidden-layer and
    ///   output-layer activations.
    ///
    /// # Returns
    /// * `Ok(())` if `inputs` and both buffers match the geometry;
    /// * `Err(ProcessError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::{Activations, Geometry, Net};
    /// let geometry = Geometry { inputs: 10, hidden: 20, outputs: 3 };
    /// let net = Net::new(geometry, None).unwrap();
    /// let mut acts = Activations::new(&geometry);
    /// net.forward(&[1.0; 10], &mut acts).unwrap();
    /// ```
    pub fn forward(
        &self,
        inputs: &[f64],
        activations: &mut Activations,
    ) -> Result<(), ProcessError> {
        if inputs.len() != self.geometry.inputs {
            return Err(ProcessError::BadInputs(SizeMismatch {
                expected: self.geometry.inputs,
                got: inputs.len(),
            }));
        }
        if activations.hidden.len() != self.geometry.hidden {
            return Err(ProcessError::BadHiddenBuffer(SizeMismatch {
                expected: self.geometry.hidden,
                got: activations.hidden.len(),
            }));
        }
        if activations.output.len() != self.geometry.outputs {
            return Err(ProcessError::BadOutputBuffer(SizeMismatch {
                expected: self.geometry.outputs,
                got: activations.output.len(),
            }));
        }

        Net::process_layer(inputs, &self.hidden_coeffs, &mut activations.hidden);
        Net::process_layer(&activations.hidden, &self.output_coeffs, &mut activations.output);
        Ok(())
    }

    /// Calculates the squared error of outputs against desired outputs.
    /// Implements the formula:
    /// `sum((outputs[i] - desired_outputs[i])^2)`
    ///
    /// # Arguments
    /// * `outputs` - slice that holds activations of output cells;
    /// * `desired_outputs` - slice that holds corresponding desired values.
    ///
    /// # Returns
    /// * `Ok(f64)` if `outputs` and `desired_outputs` have the same length;
    /// * `Err(SizeMismatch)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::Net;
    /// let outputs = [0.5; 8];
    /// let desired_outputs = [0.25; 8];
    /// let err = Net::calc_error(&outputs, &desired_outputs).unwrap();
    /// assert_eq!(err, 0.5);
    /// ```
    pub fn calc_error(outputs: &[f64], desired_outputs: &[f64]) -> Result<f64, SizeMismatch> {
        if outputs.len() != desired_outputs.len() {
            return Err(SizeMismatch {
                expected: outputs.len(),
                got: desired_outputs.len(),
            });
        };

        Ok(outputs
            .iter()
            .zip(desired_outputs.iter())
            .map(|(&a, &b)| (a - b) * (a - b))
            .sum())
    }

    /// Consumes `Net` and builds a `Trainer` object containing it.
    /// See `Trainer`'s documentation for details.
    pub fn build_trainer(self, learning_rate: f64) -> Trainer {
        Trainer::build(self, learning_rate)
    }
}

/// Error structure for `Net::new`
#[derive(Debug, Clone)]
pub enum NewNetError {
    BadGeometry(Geometry),
    BadHiddenCoeffs(SizeMismatch),
    BadOutputCoeffs(SizeMismatch),
}

impl fmt::Display for NewNetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            NewNetError::BadGeometry(geometry) => write!(
                f,
                "Every layer needs at least one cell, but got geometry {}!",
                geometry
            ),
            NewNetError::BadHiddenCoeffs(SizeMismatch { expected, got }) => write!(
                f,
                "Expected {} hidden-layer coefficients because of provided geometry, but got {}!",
                expected, got
            ),
            NewNetError::BadOutputCoeffs(SizeMismatch { expected, got }) => write!(
                f,
                "Expected {} output-layer coefficients because of provided geometry, but got {}!",
                expected, got
            ),
        }
    }
}

impl std::error::Error for NewNetError {}

/// Error structure for `Net::forward`
#[derive(Debug, Clone)]
pub enum ProcessError {
    BadInputs(SizeMismatch),
    BadHiddenBuffer(SizeMismatch),
    BadOutputBuffer(SizeMismatch),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            ProcessError::BadInputs(SizeMismatch { expected, got }) => {
                write!(f, "Expected {} input(s), but got {}!", expected, got)
            }
            ProcessError::BadHiddenBuffer(SizeMismatch { expected, got }) => write!(
                f,
                "Expected hidden buffer of {} value(s), but got {}!",
                expected, got
            ),
            ProcessError::BadOutputBuffer(SizeMismatch { expected, got }) => write!(
                f,
                "Expected output buffer of {} value(s), but got {}!",
                expected, got
            ),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Error structure for collections size mismatch
#[derive(Debug, Clone)]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Expected {} values, but got {}!",
            self.expected, self.got
        )
    }
}

impl std::error::Error for SizeMismatch {}
