// ABOUTME: Interpolation module for dispatch-time placeholder resolution
// ABOUTME: Exports the interpolator, resolution scope, and error types

pub mod engine;
pub mod error;
pub mod scope;

pub use engine::Interpolator;
pub use error::{InterpError, Result};
pub use scope::Scope;
