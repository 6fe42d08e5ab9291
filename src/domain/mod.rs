// Domain layer: customer inputs, prediction results and the model ports.

pub mod model;
pub mod ports;
