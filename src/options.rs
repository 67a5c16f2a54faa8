//! Options controlling the fuzziness and limits of the matcher.

use serde::{Deserialize, Serialize};

use crate::types::Decimal;

/// Options for the posting index and the merge searches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherOptions {
    /// The number of days by which the dates of two matched postings may differ.
    pub fuzzy_match_days: u16,
    /// The tolerance by which two matched weights may differ.
    pub fuzzy_match_amount: Decimal,
    /// Metadata keys (like a check number) that identify a posting exactly; matches on
    /// these bypass the date window.
    pub salient_meta_keys: Vec<String>,
    /// Upper bound on the number of aggregate postings enumerated per transaction.
    pub max_aggregate_postings: usize,
    /// Upper bound on the depth of the extender's search.
    pub max_extend_depth: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            fuzzy_match_days: 5,
            fuzzy_match_amount: Decimal::new(1, 2),
            salient_meta_keys: vec!["check".to_owned()],
            max_aggregate_postings: 30_000,
            max_extend_depth: 64,
        }
    }
}
