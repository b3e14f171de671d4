//! Feedforward network core: weight storage, forward propagation and
//! online backpropagation training

mod net;
mod trainer;

pub use net::*;
pub use trainer::*;
