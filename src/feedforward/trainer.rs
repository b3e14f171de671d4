use std::fmt;

use log::debug;

use super::net::{Activations, Net, SizeMismatch};
use crate::dataset::Example;

/// Net trainer structure.
///
/// Training needs per-example scratch buffers for activations and error
/// deltas; they live here so a sweep over the training set allocates
/// nothing. The training procedure looks like this:
/// * One builds a `Trainer` by calling `Net::build_trainer`, which consumes
/// the `Net` and fixes the learning rate.
/// (Consuming `Net` is needed to prevent one from building another
/// concurrent `Trainer`, so the weights have exactly one writer.)
/// * `Trainer::train_sample` performs one online update,
/// `Trainer::run_cycle` sweeps the whole training set once, and
/// `Trainer::train_to_convergence` repeats cycles until the cumulative
/// error falls to a limit. At any time `Trainer::net_ref` gives access to
/// `Net::forward`.
/// * Once finished training, `Trainer::teardown` frees the scratch buffers
/// and returns the `Net` object back.
pub struct Trainer {
    /// The network object trainer possesses.
    pub(crate) net: Net,

    /// Activation buffers, rewritten by every training step.
    acts: Activations,

    /// Output-layer deltas, one per output cell.
    ///
    /// Filled completely before any weight is written: the hidden-layer
    /// deltas must read the output weights as they were before this step's
    /// update, so both delta arrays are computed first and applied after.
    output_deltas: Box<[f64]>,

    /// Hidden-layer deltas, one per hidden cell.
    hidden_deltas: Box<[f64]>,

    /// Step size applied to every weight update.
    learning_rate: f64,
}

impl Trainer {
    /// Consumes `Net` and builds a `Trainer` object containing it.
    pub(super) fn build(net: Net, learning_rate: f64) -> Trainer {
        let acts = Activations::new(&net.geometry);
        let output_deltas = vec![0.0; net.geometry.outputs].into_boxed_slice();
        let hidden_deltas = vec![0.0; net.geometry.hidden].into_boxed_slice();

        Trainer {
            net,
            acts,
            output_deltas,
            hidden_deltas,
            learning_rate,
        }
    }

    /// Returns reference to contained `Net`, allowing the use of `Net::forward`.
    pub fn net_ref(&self) -> &Net {
        &self.net
    }

    /// Returns mutable reference to contained `Net`.
    pub fn net_mut(&mut self) -> &mut Net {
        &mut self.net
    }

    /// Performs one online training step on a given example: forward pass,
    /// error deltas for both layers, then in-place weight updates, output
    /// layer first.
    ///
    /// # Arguments
    /// * `example` - one labeled training record.
    ///
    /// # Returns
    /// * The squared error of the forward outputs against the example's
    ///   targets, taken before the weights moved.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::dataset::Example;
    /// # use bpnnet::feedforward::{Geometry, Net};
    /// let net = Net::new(Geometry { inputs: 2, hidden: 4, outputs: 1 }, None).unwrap();
    /// let mut trainer = net.build_trainer(0.5);
    /// let example = Example::from_parts(&[1.0, 0.0], &[1.0]);
    /// let err = trainer.train_sample(&example).unwrap();
    /// assert!(err >= 0.0);
    /// ```
    pub fn train_sample(&mut self, example: &Example) -> Result<f64, TrainError> {
        let geometry = self.net.geometry;
        let (inputs, targets) = (example.inputs(), example.targets());

        if inputs.len() != geometry.inputs {
            return Err(TrainError::BadInputs(SizeMismatch {
                expected: geometry.inputs,
                got: inputs.len(),
            }));
        }
        if targets.len() != geometry.outputs {
            return Err(TrainError::BadTargets(SizeMismatch {
                expected: geometry.outputs,
                got: targets.len(),
            }));
        }

        // Forward activations for this example
        self.net.forward(inputs, &mut self.acts).unwrap();
        let err = Net::calc_error(&self.acts.output, targets).unwrap();

        // Output-layer deltas
        for ((d, &zo), &t) in self
            .output_deltas
            .iter_mut()
            .zip(self.acts.output.iter())
            .zip(targets.iter())
        {
            *d = (zo - t) * Net::sigmoid_der_s(zo);
        }

        // Hidden-layer deltas, backpropagated through the output weights
        // while those still hold this step's pre-update values
        let output_stride = geometry.hidden + 1;
        for (i, (d, &zh)) in self
            .hidden_deltas
            .iter_mut()
            .zip(self.acts.hidden.iter())
            .enumerate()
        {
            let backprop: f64 = self
                .output_deltas
                .iter()
                .zip(self.net.output_coeffs.chunks_exact(output_stride))
                .map(|(&d_o, cell_coeffs)| d_o * cell_coeffs[i])
                .sum();
            *d = backprop * Net::sigmoid_der_s(zh);
        }

        // Output-layer update
        Trainer::apply_deltas(
            &mut self.net.output_coeffs,
            &self.output_deltas,
            &self.acts.hidden,
            self.learning_rate,
        );

        // Hidden-layer update
        Trainer::apply_deltas(
            &mut self.net.hidden_coeffs,
            &self.hidden_deltas,
            inputs,
            self.learning_rate,
        );

        Ok(err)
    }

    /// Applies one layer's delta-rule update in place.
    ///
    /// Weights move against the error gradient; the bias weight in the
    /// last column moves the other way, matching its subtraction in the
    /// forward pass.
    fn apply_deltas(
        coeffs: &mut [f64],
        deltas: &[f64],
        prev_activations: &[f64],
        learning_rate: f64,
    ) {
        let stride = prev_activations.len() + 1;
        // For each cell in layer
        for (cell_coeffs, &delta) in coeffs.chunks_exact_mut(stride).zip(deltas.iter()) {
            let (weights, bias) = cell_coeffs.split_at_mut(stride - 1);
            for (w, &a) in weights.iter_mut().zip(prev_activations.iter()) {
                *w -= learning_rate * delta * a;
            }
            bias[0] += learning_rate * delta;
        }
    }

    /// Runs one training cycle: a full sweep over the training set in load
    /// order, one online update per example.
    ///
    /// # Returns
    /// * The cycle's cumulative squared error.
    pub fn run_cycle(&mut self, examples: &[Example]) -> Result<f64, TrainError> {
        let mut err = 0.0;
        for example in examples {
            err += self.train_sample(example)?;
        }
        Ok(err)
    }

    /// Drives training cycles until the cumulative error falls to `limit`
    /// or below.
    ///
    /// Each finished cycle emits its `(cycle index, cumulative error)` pair
    /// through `on_cycle`; indices start at 1. With a `max_cycles` of
    /// `None` the loop has no upper bound, so a training set the network
    /// cannot fit keeps it running forever.
    ///
    /// # Arguments
    /// * `examples` - the training set, swept in the given order;
    /// * `limit` - convergence limit for the cumulative squared error;
    /// * `max_cycles` - optional safeguard bounding the number of cycles;
    /// * `on_cycle` - per-cycle reporting sink.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::dataset::Example;
    /// # use bpnnet::feedforward::{Geometry, Net};
    /// let net = Net::new(Geometry { inputs: 2, hidden: 2, outputs: 1 }, None).unwrap();
    /// let mut trainer = net.build_trainer(5.0);
    /// let examples = [Example::from_parts(&[0.0, 1.0], &[0.0])];
    /// let outcome = trainer
    ///     .train_to_convergence(&examples, 0.001, Some(10_000), |_, _| {})
    ///     .unwrap();
    /// assert!(outcome.is_converged());
    /// ```
    pub fn train_to_convergence(
        &mut self,
        examples: &[Example],
        limit: f64,
        max_cycles: Option<usize>,
        mut on_cycle: impl FnMut(usize, f64),
    ) -> Result<TrainOutcome, TrainError> {
        let mut err = f64::INFINITY;
        let mut cycles = 0;

        while err > limit {
            if let Some(max) = max_cycles {
                if cycles >= max {
                    debug!("cycle limit {} hit with error {}", max, err);
                    return Ok(TrainOutcome::CycleLimit { cycles, error: err });
                }
            }
            err = self.run_cycle(examples)?;
            cycles += 1;
            on_cycle(cycles, err);
        }

        debug!("converged after {} cycles with error {}", cycles, err);
        Ok(TrainOutcome::Converged { cycles, error: err })
    }

    /// Frees training buffers, consuming `Trainer` object, and returns
    /// contained `Net` back.
    pub fn teardown(self) -> Net {
        self.net
    }
}

/// Terminal state of a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// The cumulative error reached the convergence limit.
    Converged { cycles: usize, error: f64 },
    /// The cycle safeguard fired before the limit was reached.
    CycleLimit { cycles: usize, error: f64 },
}

impl TrainOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, TrainOutcome::Converged { .. })
    }

    /// The cumulative error of the last finished cycle.
    pub fn error(&self) -> f64 {
        match *self {
            TrainOutcome::Converged { error, .. } => error,
            TrainOutcome::CycleLimit { error, .. } => error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TrainError {
    BadInputs(SizeMismatch),
    BadTargets(SizeMismatch),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            TrainError::BadInputs(SizeMismatch { expected, got }) => {
                write!(f, "Expected {} input(s), but got {}!", expected, got)
            }
            TrainError::BadTargets(SizeMismatch { expected, got }) => {
                write!(f, "Expected {} target(s), but got {}!", expected, got)
            }
        }
    }
}

impl std::error::Error for TrainError {}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::feedforward::Geometry;

    fn seeded_coeffs(geometry: &Geometry, seed: u64) -> (Box<[f64]>, Box<[f64]>) {
        let mut rng = StdRng::seed_from_u64(seed);
        (
            Net::random_coeffs(&mut rng, geometry.hidden, geometry.inputs),
            Net::random_coeffs(&mut rng, geometry.outputs, geometry.hidden),
        )
    }

    #[test]
    fn one_step_moves_the_output_toward_the_target() {
        let geometry = Geometry {
            inputs: 2,
            hidden: 3,
            outputs: 1,
        };
        let net = Net::new(geometry, Some(seeded_coeffs(&geometry, 21))).unwrap();
        let mut trainer = net.build_trainer(0.1);
        let example = Example::from_parts(&[0.8, -0.4], &[1.0]);

        let before = trainer.train_sample(&example).unwrap();

        let mut acts = Activations::new(&geometry);
        trainer
            .net_ref()
            .forward(example.inputs(), &mut acts)
            .unwrap();
        let after = Net::calc_error(&acts.output, example.targets()).unwrap();

        assert!(after < before, "error went {} -> {}", before, after);
    }

    #[test]
    fn reported_error_is_taken_before_the_update() {
        let geometry = Geometry {
            inputs: 2,
            hidden: 3,
            outputs: 1,
        };
        let coefficients = seeded_coeffs(&geometry, 5);
        let untouched = Net::new(geometry, Some(coefficients.clone())).unwrap();
        let trained = Net::new(geometry, Some(coefficients)).unwrap();
        let example = Example::from_parts(&[0.5, 0.25], &[0.75]);

        let mut acts = Activations::new(&geometry);
        untouched.forward(example.inputs(), &mut acts).unwrap();
        let expected = Net::calc_error(&acts.output, example.targets()).unwrap();

        let mut trainer = trained.build_trainer(5.0);
        let reported = trainer.train_sample(&example).unwrap();

        assert_eq!(reported, expected);
    }

    #[test]
    fn matrix_shapes_survive_training() {
        let geometry = Geometry {
            inputs: 4,
            hidden: 5,
            outputs: 2,
        };
        let net = Net::new(geometry, Some(seeded_coeffs(&geometry, 9))).unwrap();
        let mut trainer = net.build_trainer(5.0);
        let examples = [
            Example::from_parts(&[0.1, 0.2, 0.3, 0.4], &[1.0, 0.0]),
            Example::from_parts(&[0.9, 0.8, 0.7, 0.6], &[0.0, 1.0]),
        ];
        trainer.run_cycle(&examples).unwrap();

        let (exported, hidden, output) = trainer.net_ref().export();
        assert_eq!(*exported, geometry);
        assert_eq!(hidden.len(), geometry.hidden * (geometry.inputs + 1));
        assert_eq!(output.len(), geometry.outputs * (geometry.hidden + 1));
    }

    #[test]
    fn empty_training_set_converges_immediately() {
        let geometry = Geometry {
            inputs: 2,
            hidden: 2,
            outputs: 1,
        };
        let net = Net::new(geometry, None).unwrap();
        let mut trainer = net.build_trainer(5.0);
        let outcome = trainer
            .train_to_convergence(&[], 0.001, None, |_, _| {})
            .unwrap();
        assert_eq!(
            outcome,
            TrainOutcome::Converged {
                cycles: 1,
                error: 0.0
            }
        );
    }

    #[test]
    fn cycle_limit_reports_instead_of_spinning() {
        let geometry = Geometry {
            inputs: 2,
            hidden: 2,
            outputs: 1,
        };
        let net = Net::new(geometry, Some(seeded_coeffs(&geometry, 2))).unwrap();
        let mut trainer = net.build_trainer(5.0);
        let examples = [Example::from_parts(&[1.0, 0.0], &[1.0])];

        let mut last_cycle = 0;
        let outcome = trainer
            .train_to_convergence(&examples, 0.0, Some(3), |cycle, err| {
                assert_eq!(cycle, last_cycle + 1);
                assert!(err >= 0.0);
                last_cycle = cycle;
            })
            .unwrap();

        assert!(matches!(outcome, TrainOutcome::CycleLimit { cycles: 3, .. }));
        assert_eq!(last_cycle, 3);
    }

    #[test]
    fn rejects_examples_that_do_not_match_the_geometry() {
        let geometry = Geometry {
            inputs: 2,
            hidden: 2,
            outputs: 1,
        };
        let net = Net::new(geometry, None).unwrap();
        let mut trainer = net.build_trainer(5.0);

        let err = trainer
            .train_sample(&Example::from_parts(&[1.0], &[1.0]))
            .unwrap_err();
        assert!(matches!(err, TrainError::BadInputs(_)));

        let err = trainer
            .train_sample(&Example::from_parts(&[1.0, 0.0], &[1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, TrainError::BadTargets(_)));
    }
}
