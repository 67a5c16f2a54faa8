//! The extender: a depth-first search over the space of merged transactions.

use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use hashbrown::HashSet;
use indexmap::IndexSet;
use log::{debug, trace};

use crate::store::{PostingId, TransactionId, TransactionStore};
use crate::types::{
    Account, IncompleteAmount, Posting, PostingCost, accounts_mergeable,
};
use crate::util::timer::SimpleTimer;
use crate::weights::exact_posting_date;

use super::combine::combine_with_removals;
use super::index::{IndexedPosting, PostingIndex};
use super::mergeable::{is_removal_candidate, metadata_mergeable};
use super::pair::combined_transactions;
use super::{matchable_postings_of_transaction, merged_transaction_sort_key,
            normalize_transaction};

/// A merged transaction together with the transactions that went into it.
#[derive(Clone, Debug)]
pub struct MergedTransaction {
    /// The merged transaction.
    pub transaction: TransactionId,
    /// The transactions the merge used, in the order they were folded in.
    pub used_transactions: Vec<TransactionId>,
}

/// The result of an extender search.
#[derive(Debug)]
pub struct ExtendedTransactions {
    /// The merge candidates, ranked best-first.
    pub candidates: Vec<MergedTransaction>,
    /// Whether the search was cut short by its budget; the candidates are then a
    /// partial result.
    pub budget_exhausted: bool,
}

/// Signature of a posting's units, cost and price for the opposite-posting check.
type PostingSpec = (
    Account,
    IncompleteAmount,
    Option<PostingCost>,
    Option<IncompleteAmount>,
);

/// Predicate that determines if a transaction can be merged with the current one.
///
/// Two transactions may be merged if they do not contain any conflicting metadata
/// fields, and there is no posting in one with a known account that is exactly opposite
/// (same account, cost and price, negated units) to a posting in the other. The
/// opposite-posting constraint is a heuristic: a transaction containing two postings
/// that cancel each other out is unlikely to be correct.
struct TransactionMergeable {
    transaction: TransactionId,
    posting_specs: HashSet<PostingSpec>,
}

impl TransactionMergeable {
    fn new(store: &TransactionStore, transaction: TransactionId) -> Self {
        let posting_specs = store
            .postings(transaction)
            .filter(|(_, posting)| !posting.account.is_unknown())
            .map(|(_, posting)| {
                (
                    posting.account.clone(),
                    posting.units.clone(),
                    posting.cost.clone(),
                    posting.price.clone(),
                )
            })
            .collect();
        Self {
            transaction,
            posting_specs,
        }
    }

    fn has_opposite_posting(&self, store: &TransactionStore, other: TransactionId) -> bool {
        store.postings(other).any(|(_, posting)| {
            if posting.units.is_missing() {
                return false;
            }
            let opposite = (
                posting.account.clone(),
                -&posting.units,
                posting.cost.clone(),
                posting.price.clone(),
            );
            self.posting_specs.contains(&opposite)
        })
    }

    fn check(&self, store: &TransactionStore, other: TransactionId) -> bool {
        let a = store.transaction(self.transaction);
        let b = store.transaction(other);
        metadata_mergeable([&a.header.meta, &b.header.meta])
            && !self.has_opposite_posting(store, other)
    }
}

/// Key identifying a visited search state: the used transactions and the posting
/// contents of the current merged transaction (with file positions normalized away).
type StateKey = (Box<[TransactionId]>, Box<[u64]>);

struct Search<'a> {
    index: &'a PostingIndex,
    hasher: ahash::RandomState,
    max_depth: usize,
    used_ids: HashSet<TransactionId>,
    used_list: Vec<TransactionId>,
    seen_states: HashSet<StateKey>,
    results: Vec<(TransactionId, Vec<TransactionId>)>,
    budget_exhausted: bool,
}

impl Search<'_> {
    /// A content fingerprint of a posting, ignoring its file position. Metadata is
    /// hashed order-insensitively so that merges reached along different paths compare
    /// equal.
    fn posting_fingerprint(&self, posting: &Posting) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        posting.account.hash(&mut hasher);
        posting.flag.hash(&mut hasher);
        posting.units.hash(&mut hasher);
        posting.cost.hash(&mut hasher);
        posting.price.hash(&mut hasher);
        let mut meta_hash = 0u64;
        for pair in posting.meta.iter() {
            let mut pair_hasher = self.hasher.build_hasher();
            pair.hash(&mut pair_hasher);
            meta_hash = meta_hash.wrapping_add(pair_hasher.finish());
        }
        meta_hash.hash(&mut hasher);
        hasher.finish()
    }

    fn state_key(&self, store: &TransactionStore, transaction: TransactionId) -> StateKey {
        let mut used: Vec<TransactionId> = self.used_ids.iter().copied().collect();
        used.sort_unstable();
        let mut postings: Vec<u64> = store
            .postings(transaction)
            .map(|(_, posting)| self.posting_fingerprint(posting))
            .collect();
        postings.sort_unstable();
        postings.dedup();
        (used.into_boxed_slice(), postings.into_boxed_slice())
    }

    fn maybe_extend(
        &mut self,
        store: &mut TransactionStore,
        transaction: TransactionId,
        reference: Option<TransactionId>,
        depth: usize,
    ) {
        if let Some(reference) = reference {
            self.used_ids.insert(reference);
            self.used_list.push(reference);
        }

        let state = self.state_key(store, transaction);
        if self.seen_states.insert(state) {
            if reference.is_some() && self.used_list.len() > 1 {
                self.results.push((transaction, self.used_list.clone()));
            }
            if depth >= self.max_depth {
                self.budget_exhausted = true;
            } else {
                self.extend(store, transaction, depth);
            }
        }

        if let Some(reference) = reference {
            self.used_ids.remove(&reference);
            self.used_list.pop();
        }
    }

    fn extend(&mut self, store: &mut TransactionStore, transaction: TransactionId, depth: usize) {
        let children = single_step_extended_transactions(
            store,
            transaction,
            self.index,
            &self.used_ids,
        );
        trace!(
            "extending candidate at depth {depth}: {} children",
            children.len()
        );
        for (merged, matched) in children {
            self.maybe_extend(store, merged, Some(matched), depth + 1);
        }
    }
}

/// Find all valid merges of `transaction` with a single additional transaction.
///
/// Returns the merged transactions paired with the matched transaction each merge used.
fn single_step_extended_transactions(
    store: &mut TransactionStore,
    transaction: TransactionId,
    index: &PostingIndex,
    excluded: &HashSet<TransactionId>,
) -> Vec<(TransactionId, TransactionId)> {
    let ctx = index.context();
    let matchable = matchable_postings_of_transaction(store, transaction, &ctx);
    let constraint = TransactionMergeable::new(store, transaction);

    let mut matching_transactions: IndexSet<TransactionId> = IndexSet::new();
    {
        let store_ref: &TransactionStore = store;
        let filter = |probe: &Posting, entry: &IndexedPosting| -> bool {
            if excluded.contains(&entry.transaction) {
                return false;
            }
            if !constraint.check(store_ref, entry.transaction) {
                return false;
            }
            let candidate = entry.matchable.posting(store_ref);
            if !accounts_mergeable(&candidate.account, &probe.account) {
                return false;
            }
            match (exact_posting_date(probe), exact_posting_date(candidate)) {
                (Some(probe_date), Some(candidate_date)) => probe_date == candidate_date,
                _ => true,
            }
        };
        for entry in index.search_matches(store_ref, transaction, &matchable, filter) {
            matching_transactions.insert(entry.transaction);
        }
    }

    let mut postings_matched: HashSet<PostingId> = HashSet::new();
    let mut results = Vec::new();
    for matched in matching_transactions {
        let (merged, new_matched) =
            combined_transactions(store, (transaction, matched), &ctx);
        postings_matched.extend(new_matched);
        for txn in merged {
            results.push((txn, matched));
        }
    }

    // Unmatched unknown postings may still pair up with an unknown posting of opposite
    // weight in another transaction; both are then removed.
    for mp in &matchable {
        if !is_removal_candidate(store, mp) {
            continue;
        }
        if postings_matched.contains(&mp.source_posting_id()) {
            continue;
        }
        let probe = mp.posting(store).clone();
        let matches = index.posting_matches(store, transaction, &probe, true);
        for (matched, other_mp) in matches {
            if excluded.contains(&matched) {
                continue;
            }
            if !constraint.check(store, matched) {
                continue;
            }
            if !is_removal_candidate(store, &other_mp) {
                continue;
            }
            let merged = combine_with_removals(
                store,
                (transaction, matched),
                ctx.is_cleared,
                [Rc::new(mp.clone()), Rc::new(other_mp)],
            );
            results.push((merged, matched));
        }
    }

    results
}

/// Find all valid merges of the given seed transaction with transactions in the index.
///
/// Performs a depth-first search over the space of merged transactions: the child
/// states, corresponding to merging a single additional transaction into the current
/// one, are found via the posting index and the pair merger. States are deduplicated on
/// the set of used transactions and the resulting posting contents.
///
/// The returned candidates are ordered by descending number of cleared posting matches,
/// then descending number of uncleared posting matches, then ascending number of
/// removed unknown postings; the reserved counter metadata keys are stripped.
#[must_use]
pub fn get_extended_transactions(
    store: &mut TransactionStore,
    seed: TransactionId,
    index: &PostingIndex,
) -> ExtendedTransactions {
    let mut timer = SimpleTimer::new();
    let mut search = Search {
        index,
        hasher: ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        ),
        max_depth: index.options().max_extend_depth,
        used_ids: HashSet::new(),
        used_list: Vec::new(),
        seen_states: HashSet::new(),
        results: Vec::new(),
        budget_exhausted: false,
    };

    search.maybe_extend(store, seed, Some(seed), 0);

    let mut results = search.results;
    results.sort_by_key(|(transaction, _)| merged_transaction_sort_key(store.transaction(*transaction)));
    let candidates: Vec<MergedTransaction> = results
        .into_iter()
        .map(|(transaction, used_transactions)| {
            normalize_transaction(store, transaction);
            MergedTransaction {
                transaction,
                used_transactions,
            }
        })
        .collect();
    debug!(
        "extender found {} candidates for seed transaction",
        candidates.len()
    );
    timer.log_elapsed("extend");
    ExtendedTransactions {
        candidates,
        budget_exhausted: search.budget_exhausted,
    }
}
