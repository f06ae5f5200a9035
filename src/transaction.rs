//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;
// validation is re-exported at function granularity
pub use validation::validate_for_pool;
