//! The posting index.
//!
//! The index holds every matchable posting of the transactions added to it, keyed two
//! ways: a primary table bucketed by `(date, currency)` for fuzzy weight lookups across
//! the date window, and a secondary table keyed by `(account, metadata key, value)` for
//! salient metadata like check numbers, where a match bypasses the date window entirely.
//!
//! Buckets are kept sorted by weight number; they are marked dirty on insert and
//! re-sorted lazily on the next query.

use std::cell::RefCell;
use std::collections::VecDeque;

use hashbrown::HashMap;
use indexmap::IndexMap;
use thin_vec::ThinVec;

use crate::options::MatcherOptions;
use crate::store::{PostingId, TransactionId, TransactionStore};
use crate::types::{Currency, Date, Decimal, MetaValue, Posting, accounts_mergeable};
use crate::weights::{exact_posting_date, posting_date, posting_weight};

use super::aggregate::AggregateCache;
use super::{MatchContext, MatchablePosting, matchable_postings_of_transaction};

/// The opaque predicate deciding whether a posting is cleared.
///
/// Typically "the posting has a metadata key from a registered set".
pub type IsClearedFn = dyn Fn(&Posting) -> bool;

/// Identity of an indexed matchable posting: the owning transaction and the source
/// posting ids.
pub(crate) type SourceKey = (TransactionId, ThinVec<PostingId>);

/// An entry of the posting index.
#[derive(Clone, Debug)]
pub struct IndexedPosting {
    /// The weight number, which the buckets are sorted by.
    pub(crate) number: Decimal,
    pub(crate) key: SourceKey,
    /// The transaction this posting belongs to.
    pub transaction: TransactionId,
    /// The indexed matchable posting.
    pub matchable: MatchablePosting,
}

#[derive(Debug, Default)]
struct Bucket {
    postings: Vec<IndexedPosting>,
    dirty: bool,
}

type SalientKey = (crate::types::Account, String, MetaValue);

/// The posting index.
pub struct PostingIndex {
    options: MatcherOptions,
    is_cleared: Box<IsClearedFn>,
    by_date_currency: HashMap<(Date, Currency), RefCell<Bucket>>,
    by_salient_meta: HashMap<SalientKey, IndexMap<SourceKey, IndexedPosting>>,
    aggregates: AggregateCache,
}

impl PostingIndex {
    #[must_use]
    pub fn new(options: MatcherOptions, is_cleared: Box<IsClearedFn>) -> Self {
        Self {
            options,
            is_cleared,
            by_date_currency: HashMap::new(),
            by_salient_meta: HashMap::new(),
            aggregates: AggregateCache::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Whether the given posting is cleared.
    #[must_use]
    pub fn is_cleared(&self, posting: &Posting) -> bool {
        (self.is_cleared)(posting)
    }

    pub(crate) fn context(&self) -> MatchContext<'_> {
        MatchContext {
            is_cleared: &*self.is_cleared,
            aggregates: &self.aggregates,
            max_aggregate_postings: self.options.max_aggregate_postings,
        }
    }

    /// Add all matchable postings of a transaction to the index.
    pub fn add_transaction(&mut self, store: &TransactionStore, transaction: TransactionId) {
        let mps = {
            let ctx = self.context();
            matchable_postings_of_transaction(store, transaction, &ctx)
        };
        for mp in mps {
            self.add_posting(store, transaction, mp);
        }
    }

    /// Remove all matchable postings of a transaction from the index.
    pub fn remove_transaction(&mut self, store: &TransactionStore, transaction: TransactionId) {
        let mps = {
            let ctx = self.context();
            matchable_postings_of_transaction(store, transaction, &ctx)
        };
        for mp in mps {
            self.remove_posting(store, transaction, &mp);
        }
    }

    fn source_key(transaction: TransactionId, mp: &MatchablePosting) -> SourceKey {
        (transaction, mp.sources().iter().copied().collect())
    }

    fn salient_keys_of(&self, posting: &Posting) -> Vec<SalientKey> {
        if posting.account.is_unknown() || posting.meta.is_empty() {
            return Vec::new();
        }
        self.options
            .salient_meta_keys
            .iter()
            .filter_map(|key| {
                posting
                    .meta
                    .get(key)
                    .map(|value| (posting.account.clone(), key.clone(), value.clone()))
            })
            .collect()
    }

    fn date_window(&self, date: Date) -> impl Iterator<Item = Date> + use<> {
        let days = i32::from(self.options.fuzzy_match_days);
        (-days..=days).map(move |offset| date.offset_days(offset))
    }

    fn add_posting(
        &mut self,
        store: &TransactionStore,
        transaction: TransactionId,
        mp: MatchablePosting,
    ) {
        let source_key = Self::source_key(transaction, &mp);
        let entry = IndexedPosting {
            number: mp.weight().number,
            key: source_key.clone(),
            transaction,
            matchable: mp,
        };

        let posting = entry.matchable.posting(store);
        for salient_key in self.salient_keys_of(posting) {
            self.by_salient_meta
                .entry(salient_key)
                .or_default()
                .insert(source_key.clone(), entry.clone());
        }

        let date = posting_date(store.transaction(transaction), posting);
        let currency = entry.matchable.weight().currency.clone();
        for day in self.date_window(date) {
            let bucket = self
                .by_date_currency
                .entry((day, currency.clone()))
                .or_default()
                .get_mut();
            bucket.postings.push(entry.clone());
            bucket.dirty = true;
        }
    }

    fn remove_posting(
        &mut self,
        store: &TransactionStore,
        transaction: TransactionId,
        mp: &MatchablePosting,
    ) {
        let source_key = Self::source_key(transaction, mp);

        let posting = mp.posting(store);
        for salient_key in self.salient_keys_of(posting) {
            if let Some(group) = self.by_salient_meta.get_mut(&salient_key) {
                group.shift_remove(&source_key);
            }
        }

        let date = posting_date(store.transaction(transaction), posting);
        let currency = mp.weight().currency.clone();
        for day in self.date_window(date) {
            if let Some(bucket) = self.by_date_currency.get_mut(&(day, currency.clone()))
                && let Some(position) = bucket
                    .get_mut()
                    .postings
                    .iter()
                    .position(|entry| entry.key == source_key)
            {
                bucket.get_mut().postings.remove(position);
            }
        }
    }

    /// The sorted entries of a bucket whose weight number is in `[lower, upper]`.
    fn bucket_range(
        &self,
        key: &(Date, Currency),
        lower: Decimal,
        upper: Decimal,
    ) -> Vec<IndexedPosting> {
        let Some(bucket) = self.by_date_currency.get(key) else {
            return Vec::new();
        };
        let mut bucket = bucket.borrow_mut();
        if bucket.dirty {
            bucket
                .postings
                .sort_by(|x, y| x.number.cmp(&y.number).then_with(|| x.key.cmp(&y.key)));
            bucket.dirty = false;
        }
        let start = bucket.postings.partition_point(|entry| entry.number < lower);
        let end = bucket.postings.partition_point(|entry| entry.number <= upper);
        bucket.postings[start..end].to_vec()
    }

    /// Entries of a salient-metadata group whose weight is within tolerance of `weight`.
    fn weight_matches(
        &self,
        salient_key: &SalientKey,
        weight: &crate::types::Amount,
    ) -> Vec<IndexedPosting> {
        let Some(group) = self.by_salient_meta.get(salient_key) else {
            return Vec::new();
        };
        group
            .values()
            .filter(|entry| {
                entry.matchable.weight().currency == weight.currency
                    && (entry.matchable.weight().number - weight.number).abs()
                        <= self.options.fuzzy_match_amount
            })
            .cloned()
            .collect()
    }

    /// Search the index with the given probe postings.
    ///
    /// For each probe, a salient-metadata lookup is tried first; when it yields entries
    /// that pass the filter, the weight-range scan is skipped for that probe. The
    /// returned iterator is lazy per probe and yields entries in probe order.
    pub fn search_matches<'a, F>(
        &'a self,
        store: &'a TransactionStore,
        probe: TransactionId,
        probes: &'a [MatchablePosting],
        filter: F,
    ) -> SearchMatches<'a, F>
    where
        F: Fn(&Posting, &IndexedPosting) -> bool,
    {
        let probe_txn = store.transaction(probe);
        let mut groups: std::collections::BTreeMap<(Date, Currency), Vec<(Decimal, usize)>> =
            std::collections::BTreeMap::new();
        for (index, mp) in probes.iter().enumerate() {
            let date = posting_date(probe_txn, mp.posting(store));
            let weight = mp.weight();
            groups
                .entry((date, weight.currency.clone()))
                .or_default()
                .push((weight.number, index));
        }
        let mut groups: Vec<((Date, Currency), Vec<(Decimal, usize)>)> =
            groups.into_iter().collect();
        for (_, items) in &mut groups {
            items.sort_unstable();
        }
        SearchMatches {
            index: self,
            store,
            probes,
            filter,
            groups,
            group_index: 0,
            item_index: 0,
            buffer: VecDeque::new(),
        }
    }

    /// All indexed postings whose weight is within tolerance of the given posting's
    /// weight (negated when `negate` is set), within the fuzzy date window, with a
    /// mergeable account, and with matching exact date metadata where both sides carry
    /// it. Salient-metadata matches are included for non-negated known-account probes.
    ///
    /// Results are ordered by posting date.
    #[must_use]
    pub fn posting_matches(
        &self,
        store: &TransactionStore,
        transaction: TransactionId,
        posting: &Posting,
        negate: bool,
    ) -> Vec<(TransactionId, MatchablePosting)> {
        let exact_date = exact_posting_date(posting);
        let date = posting_date(store.transaction(transaction), posting);
        let Some(weight) = posting_weight(posting) else {
            return Vec::new();
        };
        let weight = if negate { -weight } else { weight };

        let mut matches: IndexMap<SourceKey, (TransactionId, MatchablePosting)> = IndexMap::new();
        let lower = weight.number - self.options.fuzzy_match_amount;
        let upper = weight.number + self.options.fuzzy_match_amount;
        for entry in self.bucket_range(&(date, weight.currency.clone()), lower, upper) {
            let candidate = entry.matchable.posting(store);
            if !accounts_mergeable(&posting.account, &candidate.account) {
                continue;
            }
            if exact_date.is_some() {
                let candidate_date = exact_posting_date(candidate);
                if candidate_date.is_some() && candidate_date != exact_date {
                    continue;
                }
            }
            matches.insert(entry.key.clone(), (entry.transaction, entry.matchable));
        }

        if !negate {
            for salient_key in self.salient_keys_of(posting) {
                for entry in self.weight_matches(&salient_key, &weight) {
                    matches.insert(entry.key.clone(), (entry.transaction, entry.matchable));
                }
            }
        }

        let mut result: Vec<(TransactionId, MatchablePosting)> =
            matches.into_values().collect();
        result.sort_by_key(|(txn, mp)| posting_date(store.transaction(*txn), mp.posting(store)));
        result
    }
}

/// Iterator over index entries matching a sequence of probe postings.
///
/// Probes are processed grouped by `(date, currency)` in sorted order, and by ascending
/// weight within a group; results for the current probe are buffered.
pub struct SearchMatches<'a, F> {
    index: &'a PostingIndex,
    store: &'a TransactionStore,
    probes: &'a [MatchablePosting],
    filter: F,
    groups: Vec<((Date, Currency), Vec<(Decimal, usize)>)>,
    group_index: usize,
    item_index: usize,
    buffer: VecDeque<IndexedPosting>,
}

impl<F> Iterator for SearchMatches<'_, F>
where
    F: Fn(&Posting, &IndexedPosting) -> bool,
{
    type Item = IndexedPosting;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }
            let (key, items) = self.groups.get(self.group_index)?;
            let Some(&(number, probe_index)) = items.get(self.item_index) else {
                self.group_index += 1;
                self.item_index = 0;
                continue;
            };
            self.item_index += 1;

            let mp = &self.probes[probe_index];
            let posting = mp.posting(self.store);

            let mut yielded = false;
            for salient_key in self.index.salient_keys_of(posting) {
                for entry in self.index.weight_matches(&salient_key, mp.weight()) {
                    if (self.filter)(posting, &entry) {
                        self.buffer.push_back(entry);
                        yielded = true;
                    }
                }
            }
            if yielded {
                continue;
            }

            let lower = number - self.index.options.fuzzy_match_amount;
            let upper = number + self.index.options.fuzzy_match_amount;
            for entry in self.index.bucket_range(key, lower, upper) {
                if (self.filter)(posting, &entry) {
                    self.buffer.push_back(entry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        a, cleared, d, date, is_cleared_meta, posting, test_index, transaction, with_meta,
    };

    fn search_all(
        index: &PostingIndex,
        store: &TransactionStore,
        probe: TransactionId,
    ) -> Vec<TransactionId> {
        let ctx = index.context();
        let probes = matchable_postings_of_transaction(store, probe, &ctx);
        index
            .search_matches(store, probe, &probes, |_, _| true)
            .map(|entry| entry.transaction)
            .collect()
    }

    #[test]
    fn test_add_search_remove_roundtrip() {
        let mut store = TransactionStore::new();
        let mut index = test_index(3);
        let in_db = transaction(
            &mut store,
            "2016-01-02",
            "In database",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let probe = transaction(
            &mut store,
            "2016-01-01",
            "Probe",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );

        assert!(search_all(&index, &store, probe).is_empty());
        index.add_transaction(&store, in_db);
        let found = search_all(&index, &store, probe);
        assert!(found.contains(&in_db));
        index.remove_transaction(&store, in_db);
        assert!(search_all(&index, &store, probe).is_empty());
    }

    #[test]
    fn test_fuzzy_date_window() {
        let mut store = TransactionStore::new();
        let mut index = test_index(3);
        let in_db = transaction(
            &mut store,
            "2016-01-01",
            "In database",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        index.add_transaction(&store, in_db);

        let within = transaction(
            &mut store,
            "2016-01-04",
            "Within window",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        assert!(!search_all(&index, &store, within).is_empty());

        let outside = transaction(
            &mut store,
            "2016-01-05",
            "Outside window",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        assert!(search_all(&index, &store, outside).is_empty());
    }

    #[test]
    fn test_fuzzy_amount_tolerance() {
        let mut store = TransactionStore::new();
        let mut index = test_index(3);
        let in_db = transaction(
            &mut store,
            "2016-01-01",
            "In database",
            vec![posting("Assets:A", "-1.004 USD")],
        );
        index.add_transaction(&store, in_db);

        let probe_posting = posting("Assets:A", "-1 USD");
        let probe = transaction(
            &mut store,
            "2016-01-01",
            "Probe",
            vec![probe_posting.clone()],
        );
        let matches = index.posting_matches(&store, probe, &probe_posting, false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, in_db);
    }

    #[test]
    fn test_salient_meta_bypasses_date_window() {
        let mut store = TransactionStore::new();
        let mut index = test_index(5);
        let in_db = transaction(
            &mut store,
            "2016-01-01",
            "Wrote check",
            vec![
                with_meta(posting("Assets:A", "-1 USD"), "check", d("5")),
                posting("Assets:B", "1 USD"),
            ],
        );
        index.add_transaction(&store, in_db);

        // Sixty days later, far outside the window, but the check number matches.
        let probe_posting = cleared(with_meta(posting("Assets:A", "-1 USD"), "check", d("5")));
        let probe = transaction(
            &mut store,
            "2016-03-01",
            "Probe",
            vec![probe_posting.clone(), posting("Assets:B", "1 USD")],
        );
        let ctx = index.context();
        let probes = matchable_postings_of_transaction(&store, probe, &ctx);
        let found: Vec<TransactionId> = index
            .search_matches(&store, probe, &probes, |_, _| true)
            .map(|entry| entry.transaction)
            .collect();
        assert!(found.contains(&in_db));
    }

    #[test]
    fn test_posting_matches_negated_weight() {
        let mut store = TransactionStore::new();
        let mut index = test_index(3);
        let in_db = transaction(
            &mut store,
            "2016-01-01",
            "In database",
            vec![
                posting("Assets:A", "5 USD"),
                posting("Expenses:FIXME", "-10 USD"),
            ],
        );
        index.add_transaction(&store, in_db);

        let probe_posting = posting("Expenses:FIXME", "10 USD");
        let probe = transaction(
            &mut store,
            "2016-01-01",
            "Probe",
            vec![probe_posting.clone()],
        );
        let matches = index.posting_matches(&store, probe, &probe_posting, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].1.weight(), &a("-10 USD"));
    }

    #[test]
    fn test_exact_posting_date_must_agree() {
        let mut store = TransactionStore::new();
        let mut index = test_index(3);
        let in_db = transaction(
            &mut store,
            "2016-01-01",
            "In database",
            vec![with_meta(
                posting("Assets:A", "-1 USD"),
                "date",
                date("2016-01-02"),
            )],
        );
        index.add_transaction(&store, in_db);

        let same_date = with_meta(posting("Assets:A", "-1 USD"), "date", date("2016-01-02"));
        let probe = transaction(&mut store, "2016-01-01", "Probe", vec![same_date.clone()]);
        assert_eq!(index.posting_matches(&store, probe, &same_date, false).len(), 1);

        let other_date = with_meta(posting("Assets:A", "-1 USD"), "date", date("2016-01-03"));
        let probe = transaction(&mut store, "2016-01-01", "Probe", vec![other_date.clone()]);
        assert!(index.posting_matches(&store, probe, &other_date, false).is_empty());
    }

    #[test]
    fn test_is_cleared_predicate_is_opaque() {
        let index = PostingIndex::new(MatcherOptions::default(), Box::new(is_cleared_meta));
        let plain = posting("Assets:A", "1 USD");
        assert!(!index.is_cleared(&plain));
        assert!(index.is_cleared(&cleared(plain)));
    }
}
