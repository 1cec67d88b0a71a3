//! Format adapters that turn result files into the canonical data model.
//! Each file is read once, fully, before any analysis runs.

use std::path::Path;

use crate::error::ValidationError;

pub mod json;
pub mod matrix;
pub mod xml;

pub(crate) fn read_input(path: &Path, what: &str) -> Result<String, ValidationError> {
    std::fs::read_to_string(path)
        .map_err(|e| ValidationError::io(format!("reading {what} '{}'", path.display()), e))
}
