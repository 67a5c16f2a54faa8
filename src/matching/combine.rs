//! Construction of merged transactions from a match set.

use hashbrown::{HashMap, HashSet};
use thin_vec::ThinVec;

use crate::store::{PostingId, TransactionId, TransactionStore};
use crate::types::{
    EntryHeader, Filename, IncompleteAmount, LineNumber, Posting, Transaction,
};

use super::index::IsClearedFn;
use super::pair::PostingMatchSet;
use super::{
    Mp, NUM_CLEARED_POSTING_MATCHES_KEY, NUM_UNCLEARED_POSTING_MATCHES_KEY,
    NUM_UNKNOWN_POSTINGS_REMOVED_KEY, get_count,
};

/// Running counters for a merged transaction under construction.
struct MergeCounters {
    cleared_matches: i64,
    uncleared_matches: i64,
    unknown_removed: i64,
}

impl MergeCounters {
    fn from_transactions(a: &Transaction, b: &Transaction) -> Self {
        Self {
            cleared_matches: get_count(a, NUM_CLEARED_POSTING_MATCHES_KEY)
                + get_count(b, NUM_CLEARED_POSTING_MATCHES_KEY),
            uncleared_matches: get_count(a, NUM_UNCLEARED_POSTING_MATCHES_KEY)
                + get_count(b, NUM_UNCLEARED_POSTING_MATCHES_KEY),
            unknown_removed: get_count(a, NUM_UNKNOWN_POSTINGS_REMOVED_KEY)
                + get_count(b, NUM_UNKNOWN_POSTINGS_REMOVED_KEY),
        }
    }
}

fn file_position(posting: &Posting) -> (Option<Filename>, LineNumber) {
    (posting.filename.clone(), posting.line)
}

/// Merge a posting with a matching posting.
///
/// The known account wins over an unknown one, and a suffixed unknown account over a
/// bare one. The side that carries a cost or price keeps its units; flags and metadata
/// are unioned with the primary posting first.
fn combined_posting(
    posting: &Posting,
    matched: &Posting,
    counters: &mut MergeCounters,
    is_cleared: &IsClearedFn,
) -> Posting {
    if is_cleared(matched) {
        counters.cleared_matches += 1;
    } else {
        counters.uncleared_matches += 1;
    }

    let mut account = posting.account.clone();
    if account.is_unknown()
        && (!matched.account.is_unknown()
            || (!account.is_suffixed_unknown() && matched.account.is_suffixed_unknown()))
    {
        account = matched.account.clone();
    }

    let (price, units) = if posting.price.is_some() || posting.cost.is_some() {
        (posting.price.clone(), posting.units.clone())
    } else if matched.price.is_some() || matched.cost.is_some() {
        (matched.price.clone(), matched.units.clone())
    } else {
        (None, posting.units.clone())
    };
    let cost = posting.cost.clone().or_else(|| matched.cost.clone());
    let flag = posting.flag.or(matched.flag);
    let meta = posting.meta.union(&matched.meta);
    let (filename, line) = if matched.filename.is_some() {
        file_position(matched)
    } else {
        file_position(posting)
    };

    Posting {
        filename,
        line,
        meta,
        account,
        flag,
        units,
        price,
        cost,
    }
}

/// A copy of the posting with its units, cost and price removed.
fn stripped(posting: &Posting) -> Posting {
    let mut stripped = posting.clone();
    stripped.units = IncompleteAmount::missing();
    stripped.cost = None;
    stripped.price = None;
    stripped
}

/// Combine two transactions according to the given match set.
///
/// The transaction that comes from the journal is preferred as the base of the merge;
/// its date, flag, payee and narration survive. Matched postings are merged, removals
/// are dropped, untouched postings are kept as they are, and the reserved counter
/// metadata keys record what happened for the later ranking.
pub(crate) fn combine_transactions_using_match_set(
    store: &mut TransactionStore,
    txns: (TransactionId, TransactionId),
    is_cleared: &IsClearedFn,
    match_set: &PostingMatchSet,
) -> TransactionId {
    let (first, second) = txns;
    let (first, second) = if store.transaction(second).is_from_journal()
        && !store.transaction(first).is_from_journal()
    {
        (second, first)
    } else {
        (first, second)
    };

    let mut counters =
        MergeCounters::from_transactions(store.transaction(first), store.transaction(second));

    let removal_ids: HashSet<PostingId> = match_set
        .removals
        .iter()
        .map(|mp| mp.source_posting_id())
        .collect();
    let mut match_ids: HashMap<PostingId, (Mp, Mp)> = HashMap::new();
    for (a, b) in &match_set.matches {
        for (mp, other) in [(a, b), (b, a)] {
            for &source in mp.sources() {
                match_ids.insert(source, (mp.clone(), other.clone()));
            }
        }
    }

    let mut seen_matched: HashSet<PostingId> = HashSet::new();
    let mut new_postings: ThinVec<PostingId> = ThinVec::new();

    let first_posting_ids: Vec<PostingId> =
        store.transaction(first).postings.iter().copied().collect();
    for posting_id in first_posting_ids {
        if removal_ids.contains(&posting_id) {
            counters.unknown_removed += 1;
            continue;
        }
        let Some((mp, other)) = match_ids.get(&posting_id).cloned() else {
            new_postings.push(posting_id);
            continue;
        };

        if other.sources().len() == 1 {
            let matched_id = other.source_posting_id();
            let mut matched = store.posting(matched_id).clone();
            if mp.sources().len() != 1 {
                // This posting is one of several matched to the other side's singleton.
                if seen_matched.contains(&matched_id) {
                    continue;
                }
                if is_cleared(&matched) {
                    // Fold all source postings into the single cleared posting.
                    seen_matched.insert(matched_id);
                    let mut result = matched;
                    for &source in mp.sources() {
                        let mut base = store.posting(source).clone();
                        base.units = result.units.clone();
                        base.cost = result.cost.clone();
                        base.price = result.price.clone();
                        result = combined_posting(&base, &result, &mut counters, is_cleared);
                    }
                    let id = store.add_posting(result);
                    new_postings.push(id);
                    continue;
                }
                // The uncleared singleton merges into each source posting in turn;
                // ignore its units, cost and price.
                matched = stripped(&matched);
            }
            let combined =
                combined_posting(store.posting(posting_id), &matched, &mut counters, is_cleared);
            let id = store.add_posting(combined);
            new_postings.push(id);
            continue;
        }

        // This posting is matched to an aggregate of the other transaction.
        let posting = store.posting(posting_id).clone();
        if is_cleared(&posting) {
            let mut result = posting.clone();
            for &source in other.sources() {
                let matched = stripped(store.posting(source));
                result = combined_posting(&posting, &matched, &mut counters, is_cleared);
            }
            let id = store.add_posting(result);
            new_postings.push(id);
            continue;
        }
        // Distribute the units, cost and price of each source posting onto this one.
        for &source in other.sources() {
            let matched = store.posting(source).clone();
            let mut base = posting.clone();
            base.units = matched.units.clone();
            base.cost = matched.cost.clone();
            base.price = matched.price.clone();
            let combined = combined_posting(&base, &matched, &mut counters, is_cleared);
            let id = store.add_posting(combined);
            new_postings.push(id);
        }
    }

    let second_posting_ids: Vec<PostingId> =
        store.transaction(second).postings.iter().copied().collect();
    for posting_id in second_posting_ids {
        if removal_ids.contains(&posting_id) {
            counters.unknown_removed += 1;
            continue;
        }
        if match_ids.contains_key(&posting_id) {
            continue;
        }
        new_postings.push(posting_id);
    }

    let first_txn = store.transaction(first);
    let second_txn = store.transaction(second);
    let mut meta = first_txn.header.meta.union(&second_txn.header.meta);
    meta.set(NUM_CLEARED_POSTING_MATCHES_KEY, counters.cleared_matches);
    meta.set(NUM_UNCLEARED_POSTING_MATCHES_KEY, counters.uncleared_matches);
    meta.set(NUM_UNKNOWN_POSTINGS_REMOVED_KEY, counters.unknown_removed);
    let (filename, line) = if second_txn.header.filename.is_some() {
        (second_txn.header.filename.clone(), second_txn.header.line)
    } else {
        (first_txn.header.filename.clone(), first_txn.header.line)
    };
    let header = EntryHeader {
        date: first_txn.header.date,
        meta,
        tags: first_txn.header.tags.union(&second_txn.header.tags),
        links: first_txn.header.links.union(&second_txn.header.links),
        filename,
        line,
    };
    let merged = Transaction {
        header,
        flag: first_txn.flag,
        payee: first_txn.payee.clone(),
        narration: first_txn.narration.clone(),
        postings: new_postings,
    };
    store.add_transaction(merged)
}

/// Combine a transaction with a matching one by only removing a pair of unknown
/// postings of opposite weight.
pub(crate) fn combine_with_removals(
    store: &mut TransactionStore,
    txns: (TransactionId, TransactionId),
    is_cleared: &IsClearedFn,
    removals: [Mp; 2],
) -> TransactionId {
    let match_set = PostingMatchSet {
        matches: Vec::new(),
        removals: removals.into_iter().collect(),
    };
    combine_transactions_using_match_set(store, txns, is_cleared, &match_set)
}
