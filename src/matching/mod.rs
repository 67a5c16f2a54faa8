//! Transaction matching.
//!
//! This module implements a mechanism that, given a single candidate transaction and a
//! [`PostingIndex`] of other transactions, computes a set of merged transactions that
//! merge the candidate transaction with one or more transactions in the index.
//!
//! When importing transactions from external sources, the user is presented with the
//! possibly-empty set of merged transaction candidates, and has the option of accepting
//! one of them, or choosing the original unmerged transaction.
//!
//! Two transactions are merged by matching distinct and disjoint subsets of postings in
//! one with distinct and disjoint subsets of postings in the other. Each matched pair of
//! subsets must contain at least one subset of size one, the aggregate weights of the two
//! sides must be equal within a small tolerance, and the combined set of matches (plus at
//! most one removed unknown posting per transaction) must leave the merged transaction
//! balanced. The [`get_extended_transactions`] entry point drives a depth-first search
//! that repeatedly folds one more transaction into the current merged transaction,
//! deduplicates states that were already visited, and ranks the surviving candidates.

use std::rc::Rc;

use indexmap::IndexMap;
use thin_vec::ThinVec;

use crate::store::{PostingId, TransactionId, TransactionStore};
use crate::types::{Amount, Currency, Decimal, MetaValue, Posting, Transaction};
use crate::weights::posting_weight;

pub(crate) mod aggregate;
mod combine;
mod extend;
mod index;
mod mergeable;
mod pair;
#[cfg(test)]
mod tests;

pub use extend::{ExtendedTransactions, MergedTransaction, get_extended_transactions};
pub use index::{IndexedPosting, IsClearedFn, PostingIndex};
pub use pair::PostingMatchSet;

use aggregate::{AggregateCache, aggregate_posting_candidates};

/// Number of cleared posting matches that went into a merged transaction.
pub const NUM_CLEARED_POSTING_MATCHES_KEY: &str = "__num_cleared_posting_matches";
/// Number of uncleared posting matches that went into a merged transaction.
pub const NUM_UNCLEARED_POSTING_MATCHES_KEY: &str = "__num_uncleared_posting_matches";
/// Number of unknown postings removed while building a merged transaction.
pub const NUM_UNKNOWN_POSTINGS_REMOVED_KEY: &str = "__num_unknown_postings_removed";

/// The reserved metadata keys stamped onto intermediate merged transactions.
///
/// These are used to rank candidates and are stripped before results are surfaced.
pub(crate) const TRANSACTION_COUNT_KEYS: [&str; 3] = [
    NUM_CLEARED_POSTING_MATCHES_KEY,
    NUM_UNCLEARED_POSTING_MATCHES_KEY,
    NUM_UNKNOWN_POSTINGS_REMOVED_KEY,
];

/// Shared pieces of engine state that the searches need.
pub(crate) struct MatchContext<'a> {
    pub(crate) is_cleared: &'a IsClearedFn,
    pub(crate) aggregates: &'a AggregateCache,
    pub(crate) max_aggregate_postings: usize,
}

/// A singleton or aggregate view of one or more postings of a transaction, carrying the
/// combined weight.
#[derive(Clone, Debug)]
pub struct MatchablePosting {
    weight: Amount,
    sources: ThinVec<PostingId>,
    /// The synthesized posting, for aggregates of more than one source posting.
    aggregate: Option<Box<Posting>>,
}

/// A shared matchable posting; matches refer to the same instance from several places.
pub(crate) type Mp = Rc<MatchablePosting>;

impl MatchablePosting {
    pub(crate) fn singleton(source: PostingId, weight: Amount) -> Self {
        Self {
            weight,
            sources: std::iter::once(source).collect(),
            aggregate: None,
        }
    }

    pub(crate) fn aggregate(posting: Posting, sources: ThinVec<PostingId>) -> Self {
        let weight = posting
            .units
            .complete()
            .expect("aggregate posting has complete units");
        Self {
            weight,
            sources,
            aggregate: Some(Box::new(posting)),
        }
    }

    /// The combined weight of the underlying postings.
    #[must_use]
    pub fn weight(&self) -> &Amount {
        &self.weight
    }

    /// The ids of the underlying postings.
    #[must_use]
    pub fn sources(&self) -> &[PostingId] {
        &self.sources
    }

    /// Whether this stands for more than one underlying posting.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.sources.len() > 1
    }

    /// The posting this matchable posting presents: the source posting itself for
    /// singletons, the synthesized posting for aggregates.
    #[must_use]
    pub fn posting<'a>(&'a self, store: &'a TransactionStore) -> &'a Posting {
        match &self.aggregate {
            Some(posting) => posting,
            None => store.posting(self.sources[0]),
        }
    }

    /// The single underlying posting id. Only meaningful for singletons.
    pub(crate) fn source_posting_id(&self) -> PostingId {
        self.sources[0]
    }
}

/// Key grouping matchable postings by currency and weight sign.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MatchGroupKey {
    pub(crate) currency: Currency,
    pub(crate) is_positive: bool,
}

pub(crate) fn match_group_key(weight: &Amount) -> MatchGroupKey {
    MatchGroupKey {
        currency: weight.currency.clone(),
        is_positive: weight.number > Decimal::ZERO,
    }
}

/// The postings of a transaction together with their weights (where computable).
pub(crate) fn weighted_postings(
    store: &TransactionStore,
    transaction: TransactionId,
) -> Vec<(PostingId, Option<Amount>)> {
    store
        .postings(transaction)
        .map(|(id, posting)| (id, posting_weight(posting)))
        .collect()
}

/// All valid matchable postings for the given weighted postings.
///
/// This returns a singleton for every posting with a computable weight, plus the
/// admissible aggregates of two or more postings.
pub(crate) fn matchable_postings(
    store: &TransactionStore,
    weighted: &[(PostingId, Option<Amount>)],
    ctx: &MatchContext<'_>,
) -> Vec<MatchablePosting> {
    let mut result = Vec::new();
    for (id, weight) in weighted {
        if let Some(weight) = weight {
            result.push(MatchablePosting::singleton(*id, weight.clone()));
        }
    }
    let all_postings: Vec<PostingId> = weighted.iter().map(|(id, _)| *id).collect();
    let aggregates = aggregate_posting_candidates(
        store,
        &all_postings,
        ctx.is_cleared,
        ctx.aggregates,
        ctx.max_aggregate_postings,
    );
    for candidate in aggregates.iter() {
        result.push(MatchablePosting::aggregate(
            candidate.posting.clone(),
            candidate.sources.clone(),
        ));
    }
    result
}

/// All matchable postings of a transaction.
pub(crate) fn matchable_postings_of_transaction(
    store: &TransactionStore,
    transaction: TransactionId,
    ctx: &MatchContext<'_>,
) -> Vec<MatchablePosting> {
    matchable_postings(store, &weighted_postings(store, transaction), ctx)
}

/// Matchable postings grouped by currency and weight sign, in insertion order.
pub(crate) fn matchable_posting_groups(
    store: &TransactionStore,
    weighted: &[(PostingId, Option<Amount>)],
    ctx: &MatchContext<'_>,
) -> IndexMap<MatchGroupKey, Vec<Mp>> {
    let mut groups: IndexMap<MatchGroupKey, Vec<Mp>> = IndexMap::new();
    for mp in matchable_postings(store, weighted, ctx) {
        groups
            .entry(match_group_key(mp.weight()))
            .or_default()
            .push(Rc::new(mp));
    }
    groups
}

/// One of the reserved counter values of a merged transaction (zero when absent).
pub(crate) fn get_count(transaction: &Transaction, key: &str) -> i64 {
    use rust_decimal::prelude::ToPrimitive;

    match transaction.header.meta.get(key) {
        Some(MetaValue::Number(number)) => number.to_i64().unwrap_or(0),
        _ => 0,
    }
}

/// Sort key for a merged transaction.
///
/// Candidates are ordered by descending number of cleared posting matches, then
/// descending number of uncleared posting matches, then ascending number of removed
/// unknown postings.
pub(crate) fn merged_transaction_sort_key(transaction: &Transaction) -> (i64, i64, i64) {
    (
        -get_count(transaction, NUM_CLEARED_POSTING_MATCHES_KEY),
        -get_count(transaction, NUM_UNCLEARED_POSTING_MATCHES_KEY),
        get_count(transaction, NUM_UNKNOWN_POSTINGS_REMOVED_KEY),
    )
}

/// Remove the reserved counter metadata keys from a merged transaction.
pub(crate) fn normalize_transaction(store: &mut TransactionStore, transaction: TransactionId) {
    let meta = &mut store.transaction_mut(transaction).header.meta;
    for key in TRANSACTION_COUNT_KEYS {
        meta.remove(key);
    }
}
