// ABOUTME: Error types for placeholder interpolation
// ABOUTME: Defines resolution failures raised at step dispatch time

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Unresolved reference '${{{name}}}': no parameter or prior step output by that name")]
    UnresolvedReference { name: String },

    #[error("Payload serialization error: {0}")]
    PayloadError(String),
}

pub type Result<T> = std::result::Result<T, InterpError>;
