//! Error module for the swta_snn library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SNNError {
    /// Error for invalid or inconsistent parameters, e.g., a negative time constant.
    InvalidParameter(String),
    /// Error for a configuration value with the wrong type, e.g., a string where a number is expected.
    TypeMismatch { key: String },
    /// Error for an unsupported receptor port. Only port 0 is accepted.
    UnknownReceptor { port: usize },
    /// Error for out of bounds access, e.g., neuron not found.
    OutOfBounds(String),
    /// Error for pre-synaptic spikes delivered out of order on the same connection.
    NonMonotoneDelivery { t1: f64, t2: f64 },
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SNNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SNNError::InvalidParameter(e) => write!(f, "Invalid parameter: {}", e),
            SNNError::TypeMismatch { key } => {
                write!(f, "Configuration value for '{}' has the wrong type", key)
            }
            SNNError::UnknownReceptor { port } => {
                write!(f, "Unsupported receptor port: {}", port)
            }
            SNNError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            SNNError::NonMonotoneDelivery { t1, t2 } => write!(
                f,
                "Pre-synaptic spike at {} delivered after spike at {}",
                t2, t1
            ),
            SNNError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SNNError {}
