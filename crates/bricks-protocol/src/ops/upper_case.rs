//! `upper_case_string` operation types.

use serde::{Deserialize, Serialize};

/// Request payload: the text to transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperCaseRequest {
    pub string: String,
}

/// Reply payload: the transformed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperCaseResponse {
    pub string: String,
}
