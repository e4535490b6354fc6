pub mod deployment;
pub mod error;
pub mod evm;
pub mod gateway;
pub mod metrics;
pub mod orchestrator;
pub mod reconciler;
pub mod round;
pub mod session;
pub mod state;
pub mod worker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{
    Error,
    Result,
};
