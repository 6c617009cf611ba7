//! Error taxonomy for eroder construction and input resolution.
//!
//! Configuration and missing-dependency errors are raised while building a
//! [`crate::eroder::SedDepEroder`] or resolving its inputs, before any node is
//! swept. Numerical non-convergence is not an error: it is reported per node
//! as `error_in_sed_flux_fn`.

use thiserror::Error;

/// Errors raised while configuring or feeding the sediment-flux eroder.
#[derive(Error, Debug)]
pub enum SedFluxError {
    /// Closure family name not recognised.
    #[error(
        "unknown sediment dependency type '{name}' (expected one of: None, constant, \
         linear_decline, almost_parabolic, generalized_humped)"
    )]
    UnknownClosure {
        /// Name as supplied.
        name: String,
    },

    /// Erosion law name not recognised.
    #[error("unknown erosion law '{name}' (only 'power_law' is supported)")]
    UnknownErosionLaw {
        /// Name as supplied.
        name: String,
    },

    /// Transport law name not recognised.
    #[error("unknown transport law '{name}' (only 'power_law' is supported)")]
    UnknownTransportLaw {
        /// Name as supplied.
        name: String,
    },

    /// The flow router reported a method that does not yield one receiver per node.
    #[error(
        "flow routing method '{method}' is not supported: the eroder needs a single \
         receiver per node (D8, D4 or steepest descent)"
    )]
    UnsupportedRouting {
        /// Method reported by the router.
        method: String,
    },

    /// A required input field is absent from the field store.
    #[error("the sediment-flux eroder needs the field '{field}'; {hint}")]
    MissingField {
        /// Field name.
        field: String,
        /// Which upstream step produces it.
        hint: &'static str,
    },

    /// A field does not have one entry per node.
    #[error("field '{field}' has {actual} entries, expected {expected}")]
    FieldLength {
        /// Field name.
        field: String,
        /// Number of nodes in the store.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// A flooded-node field name that does not refer to a boolean field.
    #[error("no boolean field named '{name}' to read flooded nodes from")]
    UnknownFlagField {
        /// Name as supplied.
        name: String,
    },

    /// A node id outside the network.
    #[error("node id {node} is out of range for a network of {len} nodes")]
    NodeOutOfRange {
        /// Offending id.
        node: usize,
        /// Number of nodes.
        len: usize,
    },

    /// Receiver graph or visit order is inconsistent.
    #[error("invalid drainage network: {0}")]
    InvalidNetwork(String),

    /// A numeric parameter is outside its admissible range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be parsed.
    #[error("could not parse eroder configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SedFluxError>;
