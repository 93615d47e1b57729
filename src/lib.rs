pub mod error;

pub mod control {
    pub mod controller;
    pub mod feedback;
    pub mod gains;
    pub mod model;
    pub mod placement;
    pub mod polynomial;
    pub mod promote;
    pub mod riccati;
    pub mod transfer_function;
}

pub use control::controller::{lqg, lqgi, LqgController, LqgWeights};
pub use control::feedback::Feedback;
pub use control::model::{SampleTime, StateSpace, StateSpaceModel};
pub use error::{ControlError, Result};
