//! Logging setup and result files

mod output;

#[cfg(test)]
pub use output::log_layer;
pub use output::{setup_output, ResultsFile};
