use thiserror::Error;

/// Hard failures of a classification call.
///
/// Malformed balance data is not one of these; it comes back as an error
/// string on the parse result so a scan can carry on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
