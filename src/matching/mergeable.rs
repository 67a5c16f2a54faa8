//! Per-type compatibility rules for merging postings.

use hashbrown::HashMap;

use crate::store::TransactionStore;
use crate::types::{
    Cost, CostSpec, IncompleteAmount, Meta, MetaValue, Posting, PostingCost, accounts_mergeable,
};

use super::MatchablePosting;
use super::index::IsClearedFn;

/// Whether a sequence of metadata lists can be merged without conflicts.
///
/// A conflict is a key that appears with two different values.
pub(crate) fn metadata_mergeable<'a>(metas: impl IntoIterator<Item = &'a Meta>) -> bool {
    let mut combined: HashMap<&str, Option<&MetaValue>> = HashMap::new();
    for meta in metas {
        for pair in meta.iter() {
            match combined.entry(pair.key.as_str()) {
                hashbrown::hash_map::Entry::Occupied(entry) => {
                    if *entry.get() != pair.value.as_ref() {
                        return false;
                    }
                }
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(pair.value.as_ref());
                }
            }
        }
    }
    true
}

fn equal_or_none<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Whether two amounts may correspond, treating missing parts as wildcards.
pub(crate) fn amounts_mergeable(
    a: Option<&IncompleteAmount>,
    b: Option<&IncompleteAmount>,
) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return true;
    };
    if a.is_missing() || b.is_missing() {
        return true;
    }
    equal_or_none(a.currency.as_ref(), b.currency.as_ref())
        && equal_or_none(a.number, b.number)
}

fn costspecs_mergeable(a: &CostSpec, b: &CostSpec) -> bool {
    equal_or_none(a.number_per, b.number_per)
        && equal_or_none(a.number_total, b.number_total)
        && equal_or_none(a.currency.as_ref(), b.currency.as_ref())
        && equal_or_none(a.date, b.date)
        && equal_or_none(a.label.as_ref(), b.label.as_ref())
        && a.merge == b.merge
}

fn cost_and_costspec_mergeable(a: &Cost, b: &CostSpec, b_units: &IncompleteAmount) -> bool {
    if !equal_or_none(Some(&a.currency), b.currency.as_ref()) {
        return false;
    }
    if !equal_or_none(Some(a.number), b.number_per) {
        return false;
    }
    if !equal_or_none(a.date, b.date) {
        return false;
    }
    if !equal_or_none(a.label.as_ref(), b.label.as_ref()) {
        return false;
    }
    let Some(number_total) = b.number_total else {
        return true;
    };
    let Some(units_number) = b_units.number else {
        return false;
    };
    if units_number.is_zero() {
        return false;
    }
    a.number == number_total / units_number
}

/// Whether two costs may correspond.
///
/// Fully resolved costs must agree on number, currency and date (labels are
/// missing-tolerant); cost specs treat every missing field as a wildcard.
pub(crate) fn costs_mergeable(
    a: Option<&PostingCost>,
    a_units: &IncompleteAmount,
    b: Option<&PostingCost>,
    b_units: &IncompleteAmount,
) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return true;
    };
    match (a, b) {
        (PostingCost::Cost(a), PostingCost::Cost(b)) => {
            a.number == b.number
                && a.currency == b.currency
                && a.date == b.date
                && equal_or_none(a.label.as_ref(), b.label.as_ref())
        }
        (PostingCost::Spec(a), PostingCost::Spec(b)) => costspecs_mergeable(a, b),
        (PostingCost::Cost(a), PostingCost::Spec(b)) => {
            cost_and_costspec_mergeable(a, b, b_units)
        }
        (PostingCost::Spec(a), PostingCost::Cost(b)) => {
            cost_and_costspec_mergeable(b, a, a_units)
        }
    }
}

/// Check if two matchable postings can be merged together.
///
/// This does not check the posting weights, because it is only called for postings with
/// equal weights.
pub(crate) fn postings_mergeable(
    store: &TransactionStore,
    a: &MatchablePosting,
    b: &MatchablePosting,
    is_cleared: &IsClearedFn,
) -> bool {
    if a.is_aggregate() && b.is_aggregate() {
        return false;
    }

    if !accounts_mergeable(&a.posting(store).account, &b.posting(store).account) {
        return false;
    }

    let (a, b) = if a.is_aggregate() { (b, a) } else { (a, b) };
    // `a` is now the singleton side.

    let a_posting = a.posting(store);
    let a_cleared = is_cleared(a_posting);
    let b_cleared = is_cleared(b.posting(store));
    if a_cleared && b_cleared {
        return false;
    }

    if a_cleared {
        // The combined transaction will merge all of the source postings of `b` into the
        // single source posting of `a`, so the metadata must all be compatible.
        metadata_mergeable(
            std::iter::once(&a_posting.meta)
                .chain(b.sources().iter().map(|&id| &store.posting(id).meta)),
        )
    } else {
        // The combined transaction will merge the single source posting of `a` with each
        // of the source postings of `b` in turn, so the metadata of `a` must be
        // individually compatible with each of them.
        b.sources().iter().all(|&id| {
            metadata_mergeable([&a_posting.meta, &store.posting(id).meta])
        })
    }
}

/// Check if a posting without a computable weight can pair up with a matchable posting.
pub(crate) fn unweighted_postings_mergeable(
    store: &TransactionStore,
    unweighted: &Posting,
    matchable: &MatchablePosting,
    is_cleared: &IsClearedFn,
) -> bool {
    if matchable.is_aggregate() {
        return false;
    }
    let other = matchable.posting(store);
    if !accounts_mergeable(&unweighted.account, &other.account) {
        return false;
    }
    if is_cleared(unweighted) && is_cleared(other) {
        return false;
    }
    if !amounts_mergeable(Some(&unweighted.units), Some(&other.units)) {
        return false;
    }
    if !amounts_mergeable(unweighted.price.as_ref(), other.price.as_ref()) {
        return false;
    }
    if !costs_mergeable(
        unweighted.cost.as_ref(),
        &unweighted.units,
        other.cost.as_ref(),
        &other.units,
    ) {
        return false;
    }
    metadata_mergeable([&unweighted.meta, &other.meta])
}

/// Whether a matchable posting may be dropped from a merge entirely.
///
/// Removal candidates are unknown-account singleton postings with no cost or price and
/// no metadata.
pub(crate) fn is_removal_candidate(store: &TransactionStore, mp: &MatchablePosting) -> bool {
    if mp.is_aggregate() {
        return false;
    }
    let posting = mp.posting(store);
    posting.account.is_unknown()
        && posting.price.is_none()
        && posting.cost.is_none()
        && posting.meta.is_empty()
}
