//! Error types for the particle-interaction engine and its drivers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("lattice holds only {placed} of {requested} particles; decrease lattice_spacing or edge_margin")]
    LatticeOverflow { placed: usize, requested: usize },

    #[error("no Monte Carlo move was accepted in {trials} trials")]
    NoAcceptedSamples { trials: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("potential requires particle charges but none were supplied")]
    MissingCharges,

    #[error("buffer size mismatch: expected {expected} entries, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("compute device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Fail with [`SimError::SizeMismatch`] unless `found == expected`.
pub(crate) fn ensure_len(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SimError::SizeMismatch { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lattice_overflow() {
        let err = SimError::LatticeOverflow {
            placed: 27,
            requested: 64,
        };
        assert!(err.to_string().starts_with("lattice holds only 27 of 64"));
    }

    #[test]
    fn ensure_len_reports_both_sizes() {
        assert!(ensure_len(4, 4).is_ok());
        match ensure_len(4, 3) {
            Err(SimError::SizeMismatch { expected, found }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
