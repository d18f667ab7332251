//! Operation-specific types.

pub mod probe;
pub mod upper_case;

pub use probe::{Limits, ProbeRequest, ProbeResponse};
pub use upper_case::{UpperCaseRequest, UpperCaseResponse};

/// Known operation names.
pub mod names {
    pub const PROBE: &str = "probe";
    pub const UPPER_CASE_STRING: &str = "upper_case_string";
}
