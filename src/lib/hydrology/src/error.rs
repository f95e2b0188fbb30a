use thiserror::Error;

/// Error taxonomy for the subglacial hydrology core.
///
/// `InvalidParameter` and `InvalidState` are fatal by convention: a caller
/// that cannot recover should log the rendered `Display` line and exit
/// with a non-zero status, mirroring the source model's abort-on-violation
/// behavior. `Cancelled` and `Io` are recoverable and meant to be surfaced
/// to the driver rather than treated as a crash.
#[derive(Debug, Error)]
pub enum HydrologyError {
    #[error("hydrology ERROR: invalid parameter {what} = {value} — ENDING")]
    InvalidParameter { what: String, value: f64 },

    #[error("hydrology ERROR: invalid state {what} at (i, j) = ({i}, {j}), value = {value} — ENDING")]
    InvalidState {
        what: String,
        i: usize,
        j: usize,
        value: f64,
    },

    #[error("hydrology ERROR: missing input variable '{name}' — ENDING")]
    MissingInput { name: &'static str },

    #[error("hydrology ERROR: io failure on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("hydrology: cancelled by graceful-stop sentinel")]
    Cancelled,
}

impl HydrologyError {
    pub fn invalid_parameter(what: impl Into<String>, value: f64) -> Self {
        HydrologyError::InvalidParameter {
            what: what.into(),
            value,
        }
    }

    pub fn invalid_state(what: impl Into<String>, i: usize, j: usize, value: f64) -> Self {
        HydrologyError::InvalidState {
            what: what.into(),
            i,
            j,
            value,
        }
    }

    /// True for the two kinds the propagation policy (spec §7) treats as
    /// recoverable; false for the two that are fatal by convention.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HydrologyError::Cancelled | HydrologyError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, HydrologyError>;
