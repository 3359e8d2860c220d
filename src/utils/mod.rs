//! Helpers shared across layers.
//!
//! - [`code_generator`] - Short code generation and custom code validation
//! - [`url_normalizer`] - Target URL normalization

pub mod code_generator;
pub mod url_normalizer;
