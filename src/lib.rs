//! Backpropagation training for a fixed-shape feedforward network.
//!
//! One hidden layer, sigmoid cells, online delta-rule weight updates:
//! training sweeps the whole example set each cycle and repeats until the
//! cumulative squared error falls to a limit. `feedforward` holds the
//! numeric engine, `dataset` the line-oriented record loaders the
//! `bptrain` binary feeds it with.

pub mod dataset;
pub mod feedforward;
