//! Enumeration of aggregate posting candidates.
//!
//! An aggregate posting stands for a subset of two or more postings of one transaction
//! that may correspond to a single posting of another transaction (e.g. several invoice
//! items covered by one credit-card charge). The subsets that may be used are restricted
//! to keep the search tractable and meaningful:
//!
//! 1. All postings in a subset share the same account (string equality; `Expenses:FIXME`
//!    is distinct from `Expenses:FIXME:A`) and the same units currency.
//! 2. Cleared postings and postings with a cost, a price or missing units are excluded.
//! 3. Subsets must not sum to zero and must not contain a sub-subset that sums to zero.
//! 4. Subsets have at most four elements, except that the maximal same-sign subsets are
//!    also emitted for buckets of more than four postings.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use thin_vec::ThinVec;

use crate::store::{PostingId, TransactionStore};
use crate::types::{Account, Amount, Currency, Decimal, IncompleteAmount, Meta, Posting};

use super::index::IsClearedFn;

/// Maximum number of postings in an aggregate subset.
const MAX_SUBSET_SIZE: usize = 4;

/// Number of memoized enumerations kept per engine.
const CACHE_CAPACITY: usize = 1024;

/// An admissible aggregate: the synthesized posting and its source postings.
#[derive(Clone, Debug)]
pub(crate) struct AggregateCandidate {
    pub(crate) posting: Posting,
    pub(crate) sources: ThinVec<PostingId>,
}

struct CacheEntry {
    uses: u64,
    value: Rc<Vec<AggregateCandidate>>,
}

/// A least-frequently-used cache of aggregate enumerations, keyed by the identities of
/// the eligible postings.
///
/// The cache is owned by a single engine (it lives in the [`PostingIndex`]); enumeration
/// results are shared via `Rc`, so this is not `Sync` by design.
///
/// [`PostingIndex`]: super::PostingIndex
pub(crate) struct AggregateCache {
    entries: RefCell<HashMap<Box<[PostingId]>, CacheEntry>>,
}

impl AggregateCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    fn get_or_insert_with(
        &self,
        key: &[PostingId],
        compute: impl FnOnce() -> Vec<AggregateCandidate>,
    ) -> Rc<Vec<AggregateCandidate>> {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(key) {
            entry.uses += 1;
            return entry.value.clone();
        }
        if entries.len() >= CACHE_CAPACITY {
            // Evict the least frequently used entry.
            if let Some(lfu_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.uses)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&lfu_key);
            }
        }
        let value = Rc::new(compute());
        entries.insert(
            key.into(),
            CacheEntry {
                uses: 1,
                value: value.clone(),
            },
        );
        value
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Compute the admissible aggregates over the given postings of one transaction.
///
/// The result is memoized per set of eligible posting ids; once the cumulative number of
/// emitted aggregates would exceed `max_aggregates`, the per-bucket subset-size loop is
/// aborted and the partial result is returned.
pub(crate) fn aggregate_posting_candidates(
    store: &TransactionStore,
    postings: &[PostingId],
    is_cleared: &IsClearedFn,
    cache: &AggregateCache,
    max_aggregates: usize,
) -> Rc<Vec<AggregateCandidate>> {
    let eligible: Vec<PostingId> = postings
        .iter()
        .copied()
        .filter(|&id| {
            let posting = store.posting(id);
            posting.price.is_none()
                && posting.cost.is_none()
                && posting.units.number.is_some()
                && posting.units.currency.is_some()
                && !is_cleared(posting)
        })
        .collect();
    cache.get_or_insert_with(&eligible, || {
        enumerate_aggregates(store, &eligible, max_aggregates)
    })
}

fn units_number(store: &TransactionStore, id: PostingId) -> Decimal {
    store
        .posting(id)
        .units
        .number
        .expect("eligible aggregate posting has units")
}

fn enumerate_aggregates(
    store: &TransactionStore,
    postings: &[PostingId],
    max_aggregates: usize,
) -> Vec<AggregateCandidate> {
    let mut buckets: indexmap::IndexMap<(Account, Currency), Vec<PostingId>> =
        indexmap::IndexMap::new();
    for &id in postings {
        let posting = store.posting(id);
        let currency = posting
            .units
            .currency
            .clone()
            .expect("eligible aggregate posting has a currency");
        buckets
            .entry((posting.account.clone(), currency))
            .or_default()
            .push(id);
    }

    let mut results = Vec::new();
    let mut sum_to_zero: HashSet<Box<[PostingId]>> = HashSet::new();

    for ((account, currency), bucket) in &buckets {
        if bucket.len() == 1 {
            continue;
        }
        if bucket.len() > MAX_SUBSET_SIZE {
            let (positive, negative): (Vec<PostingId>, Vec<PostingId>) = bucket
                .iter()
                .copied()
                .partition(|&id| units_number(store, id) > Decimal::ZERO);
            for same_sign in [positive, negative] {
                if same_sign.len() > MAX_SUBSET_SIZE {
                    add_subset(
                        store,
                        &mut results,
                        account,
                        currency,
                        &same_sign,
                        false,
                        &mut sum_to_zero,
                    );
                }
            }
        }
        for subset_size in 2..=bucket.len().min(MAX_SUBSET_SIZE) {
            let mut potential = Vec::new();
            for subset in bucket.iter().copied().combinations(subset_size) {
                add_subset(
                    store,
                    &mut potential,
                    account,
                    currency,
                    &subset,
                    true,
                    &mut sum_to_zero,
                );
            }
            if results.len() + potential.len() > max_aggregates {
                break;
            }
            results.append(&mut potential);
        }
    }

    results
}

fn add_subset(
    store: &TransactionStore,
    results: &mut Vec<AggregateCandidate>,
    account: &Account,
    currency: &Currency,
    subset: &[PostingId],
    check_zero: bool,
    sum_to_zero: &mut HashSet<Box<[PostingId]>>,
) {
    let total: Decimal = subset.iter().map(|&id| units_number(store, id)).sum();
    if check_zero {
        if total == Decimal::ZERO {
            sum_to_zero.insert(subset.into());
            return;
        }
        for sub_size in 2..subset.len() {
            for sub in subset.iter().copied().combinations(sub_size) {
                if sum_to_zero.contains(sub.as_slice()) {
                    return;
                }
            }
        }
    }
    let posting = Posting {
        filename: None,
        line: 0,
        meta: Meta::default(),
        account: account.clone(),
        flag: None,
        units: IncompleteAmount::from(Amount::new(total, currency.clone())),
        price: None,
        cost: None,
    };
    results.push(AggregateCandidate {
        posting,
        sources: subset.iter().copied().collect(),
    });
}
