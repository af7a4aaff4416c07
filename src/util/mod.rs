//! Utility functions and helpers.

mod logging;
mod stop;

pub use logging::init_logging;
pub use stop::StopSignal;
