//! Errors of the matching engine.
//!
//! The engine never errors on valid input: an impossible merge is simply an empty result.
//! The errors here cover caller precondition violations, with the file position of the
//! offending value where one exists.

use crate::types::{Filename, LineNumber};

/// An error raised for caller precondition violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// A posting without a computable weight was passed where a weight is required.
    PostingLacksWeight {
        filename: Option<Filename>,
        line: LineNumber,
    },
    /// A candidate without any used transactions was staged.
    CandidateWithoutSources,
}

impl std::error::Error for MatchError {}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostingLacksWeight { filename, line } => {
                write!(f, "Posting has no computable weight")?;
                if let Some(filename) = filename {
                    write!(f, " ({filename}:{line})")?;
                }
                Ok(())
            }
            Self::CandidateWithoutSources => {
                write!(f, "Candidate does not use any transactions")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Filename;

    #[test]
    fn test_error_messages() {
        let err = MatchError::PostingLacksWeight {
            filename: Some(Filename::new_dummy("import")),
            line: 7,
        };
        assert_eq!(
            err.to_string(),
            "Posting has no computable weight (<import>:7)"
        );
        let err = MatchError::PostingLacksWeight {
            filename: None,
            line: 0,
        };
        assert_eq!(err.to_string(), "Posting has no computable weight");
    }
}
