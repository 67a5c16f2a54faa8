//! The pairwise merge search.
//!
//! Given two transactions, this enumerates every valid [`PostingMatchSet`]: a set of
//! non-conflicting matches between matchable postings of the two transactions, plus at
//! most one removed unknown posting per transaction, such that the signed weights cancel
//! within tolerance per currency. Each surviving match set is then turned into a merged
//! transaction.

use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexSet;
use itertools::Itertools;
use thin_vec::ThinVec;

use crate::inventory::SimpleInventory;
use crate::store::{PostingId, TransactionId, TransactionStore};
use crate::types::{Amount, Currency, Decimal};

use super::combine::combine_transactions_using_match_set;
use super::mergeable::{is_removal_candidate, postings_mergeable, unweighted_postings_mergeable};
use super::{MatchContext, MatchGroupKey, MatchablePosting, Mp, matchable_posting_groups,
            weighted_postings};

/// A set of posting matches plus bilateral removals that together balance.
#[derive(Clone, Debug, Default)]
pub struct PostingMatchSet {
    /// Pairs of matchable postings, one from each transaction.
    pub(crate) matches: Vec<(Mp, Mp)>,
    /// Unknown singleton postings dropped entirely.
    pub(crate) removals: ThinVec<Mp>,
}

impl PostingMatchSet {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    fn combined_with(&self, other: &Self) -> Self {
        let mut matches = self.matches.clone();
        matches.extend(other.matches.iter().cloned());
        let mut removals = self.removals.clone();
        removals.extend(other.removals.iter().cloned());
        Self { matches, removals }
    }
}

/// Identity of a matchable posting within one pair-merge invocation.
fn mp_id(mp: &Mp) -> usize {
    Rc::as_ptr(mp) as usize
}

pub(crate) fn posting_ids_in_match(m: &(Mp, Mp)) -> Vec<PostingId> {
    m.0.sources()
        .iter()
        .chain(m.1.sources().iter())
        .copied()
        .collect()
}

/// Match sets of one weight sign, grouped by how many postings are removed.
///
/// `single_removals[i]` holds the sets removing one posting from transaction `i`.
#[derive(Default)]
struct SingleSignMatchGroups {
    no_removals: Vec<(Decimal, PostingMatchSet)>,
    single_removals: [Vec<(Decimal, PostingMatchSet)>; 2],
    double_removals: Vec<(Decimal, PostingMatchSet)>,
}

/// A list of values keyed by a decimal, ordered by key, for range lookups.
struct SortedByNumber<T>(Vec<(Decimal, T)>);

impl<T> SortedByNumber<T> {
    fn new(mut entries: Vec<(Decimal, T)>) -> Self {
        entries.sort_by(|x, y| x.0.cmp(&y.0));
        Self(entries)
    }

    fn find(&self, lower: Decimal, upper: Decimal) -> &[(Decimal, T)] {
        let start = self.0.partition_point(|(number, _)| *number < lower);
        let end = self.0.partition_point(|(number, _)| *number <= upper);
        &self.0[start..end]
    }
}

struct GroupSearchInputs {
    possible_matches: Vec<(Mp, Mp)>,
    possible_matches_for: HashMap<usize, Vec<Mp>>,
    removal_candidates: [Vec<Mp>; 2],
}

impl GroupSearchInputs {
    /// Whether the removal candidate could instead take part in a match that does not
    /// conflict with the used postings.
    fn can_match_instead(&self, candidate: &Mp, used: &HashSet<PostingId>) -> bool {
        self.possible_matches_for
            .get(&mp_id(candidate))
            .is_some_and(|partners| {
                partners.iter().any(|partner| {
                    partner.sources().iter().all(|id| !used.contains(id))
                })
            })
    }

    /// Extend the current partial match set with removals.
    fn removal_extensions(
        &self,
        used: &mut HashSet<PostingId>,
        result: &mut SingleSignMatchGroups,
        current_sum: Decimal,
        matches: &[(Mp, Mp)],
    ) {
        for (side, candidates) in self.removal_candidates.iter().enumerate() {
            for candidate in candidates {
                if used.contains(&candidate.source_posting_id()) {
                    continue;
                }
                if self.can_match_instead(candidate, used) {
                    continue;
                }
                result.single_removals[side].push((
                    current_sum + candidate.weight().number,
                    PostingMatchSet {
                        matches: matches.to_vec(),
                        removals: std::iter::once(candidate.clone()).collect(),
                    },
                ));
            }
        }

        for a in &self.removal_candidates[0] {
            if used.contains(&a.source_posting_id()) {
                continue;
            }
            used.insert(a.source_posting_id());
            for b in &self.removal_candidates[1] {
                if used.contains(&b.source_posting_id()) {
                    continue;
                }
                used.insert(b.source_posting_id());
                if !self.can_match_instead(a, used) && !self.can_match_instead(b, used) {
                    result.double_removals.push((
                        current_sum + a.weight().number + b.weight().number,
                        PostingMatchSet {
                            matches: matches.to_vec(),
                            removals: [a.clone(), b.clone()].into_iter().collect(),
                        },
                    ));
                }
                used.remove(&b.source_posting_id());
            }
            used.remove(&a.source_posting_id());
        }
    }

    /// The bounded take/skip recursion over the possible matches.
    ///
    /// At each level, the first possible match (from `next` onwards) that does not
    /// conflict with the used postings is either skipped or taken; every take is
    /// recorded as a match set of its own. Removal extensions are considered at the
    /// leaves of non-empty partial sets.
    fn match_extensions(
        &self,
        used: &mut HashSet<PostingId>,
        result: &mut SingleSignMatchGroups,
        current_sum: Decimal,
        matches: &[(Mp, Mp)],
        next: usize,
    ) {
        for index in next..self.possible_matches.len() {
            let m = self.possible_matches[index].clone();
            let posting_ids = posting_ids_in_match(&m);
            if posting_ids.iter().any(|id| used.contains(id)) {
                continue;
            }
            // The skip branch.
            self.match_extensions(used, result, current_sum, matches, index + 1);
            // The take branch.
            for &id in &posting_ids {
                used.insert(id);
            }
            let new_sum = current_sum + m.0.weight().number;
            let mut new_matches = matches.to_vec();
            new_matches.push(m);
            result.no_removals.push((
                new_sum,
                PostingMatchSet {
                    matches: new_matches.clone(),
                    removals: ThinVec::new(),
                },
            ));
            self.match_extensions(used, result, new_sum, &new_matches, index + 1);
            for id in &posting_ids {
                used.remove(id);
            }
            return;
        }
        if next != 0 {
            self.removal_extensions(used, result, current_sum, matches);
        }
    }
}

/// Compute the valid match sets of one weight sign.
///
/// `matchable` holds the matchable postings of this sign for the two transactions;
/// `unweighted` the postings without a computable weight, which may pair with singleton
/// matchable postings of the other transaction via the wildcard rules.
fn compute_single_sign_match_groups(
    store: &TransactionStore,
    matchable: [&[Mp]; 2],
    unweighted: [&[PostingId]; 2],
    ctx: &MatchContext<'_>,
    max_residual: Decimal,
) -> SingleSignMatchGroups {
    let b_lookup = SortedByNumber::new(
        matchable[1]
            .iter()
            .map(|mp| (mp.weight().number, mp.clone()))
            .collect(),
    );

    let mut possible_matches: Vec<(Mp, Mp)> = Vec::new();
    for a in matchable[0] {
        let weight = a.weight().number;
        for (_, b) in b_lookup.find(weight - max_residual, weight + max_residual) {
            if postings_mergeable(store, a, b, ctx.is_cleared) {
                possible_matches.push((a.clone(), b.clone()));
            }
        }
    }
    for &unweighted_id in unweighted[0] {
        let posting = store.posting(unweighted_id);
        for b in matchable[1] {
            if unweighted_postings_mergeable(store, posting, b, ctx.is_cleared) {
                possible_matches.push((
                    Rc::new(MatchablePosting::singleton(unweighted_id, b.weight().clone())),
                    b.clone(),
                ));
            }
        }
    }
    for &unweighted_id in unweighted[1] {
        let posting = store.posting(unweighted_id);
        for a in matchable[0] {
            if unweighted_postings_mergeable(store, posting, a, ctx.is_cleared) {
                possible_matches.push((
                    a.clone(),
                    Rc::new(MatchablePosting::singleton(unweighted_id, a.weight().clone())),
                ));
            }
        }
    }

    let mut possible_matches_for: HashMap<usize, Vec<Mp>> = HashMap::new();
    for (a, b) in &possible_matches {
        possible_matches_for
            .entry(mp_id(a))
            .or_default()
            .push(b.clone());
        possible_matches_for
            .entry(mp_id(b))
            .or_default()
            .push(a.clone());
    }

    let removal_candidates: [Vec<Mp>; 2] = [
        matchable[0]
            .iter()
            .filter(|mp| is_removal_candidate(store, mp))
            .cloned()
            .collect(),
        matchable[1]
            .iter()
            .filter(|mp| is_removal_candidate(store, mp))
            .cloned()
            .collect(),
    ];

    let inputs = GroupSearchInputs {
        possible_matches,
        possible_matches_for,
        removal_candidates,
    };

    let mut used = HashSet::new();
    let mut result = SingleSignMatchGroups::default();
    inputs.match_extensions(&mut used, &mut result, Decimal::ZERO, &[], 0);
    inputs.removal_extensions(&mut used, &mut result, Decimal::ZERO, &[]);
    result
}

/// The valid pairings of a negative-sign match group with a positive-sign match group.
///
/// Valid pairings keep the removal count at one per transaction; the positive groups are
/// converted to their sorted representation for the range lookups.
fn single_sign_group_combinations(
    negative: &SingleSignMatchGroups,
    positive: &SingleSignMatchGroups,
) -> Vec<(Vec<(Decimal, PostingMatchSet)>, SortedByNumber<PostingMatchSet>)> {
    let pos_no_removals = || SortedByNumber::new(positive.no_removals.clone());
    let pos_single = |i: usize| SortedByNumber::new(positive.single_removals[i].clone());
    let pos_double = || SortedByNumber::new(positive.double_removals.clone());

    vec![
        (negative.no_removals.clone(), pos_no_removals()),
        (negative.no_removals.clone(), pos_single(0)),
        (negative.no_removals.clone(), pos_single(1)),
        (negative.no_removals.clone(), pos_double()),
        (negative.single_removals[0].clone(), pos_no_removals()),
        (negative.single_removals[0].clone(), pos_single(1)),
        (negative.single_removals[1].clone(), pos_no_removals()),
        (negative.single_removals[1].clone(), pos_single(0)),
        (negative.double_removals.clone(), pos_no_removals()),
    ]
}

/// Drop match sets whose matches are contained in another emitted set's matches.
///
/// Removals are not part of the comparison.
fn filter_dominated_match_sets(mut match_sets: Vec<PostingMatchSet>) -> Vec<PostingMatchSet> {
    match_sets.sort_by_key(|set| std::cmp::Reverse(set.matches.len()));
    let mut kept = Vec::new();
    let mut kept_match_ids: Vec<HashSet<(usize, usize)>> = Vec::new();
    for match_set in match_sets {
        let pairs: Vec<(usize, usize)> = match_set
            .matches
            .iter()
            .map(|(a, b)| (mp_id(a), mp_id(b)))
            .collect();
        if kept_match_ids
            .iter()
            .any(|existing| pairs.iter().all(|pair| existing.contains(pair)))
        {
            continue;
        }
        kept_match_ids.push(pairs.into_iter().collect());
        kept.push(match_set);
    }
    kept
}

/// Compute the balanced match sets for a single currency.
///
/// `matchable[sign][i]` holds the matchable postings of transaction `i` with the given
/// weight sign (`sign` 0 is negative). When either sign has no matchable postings in
/// both transactions, nothing can balance and the result is empty.
fn compute_balanced_match_group(
    store: &TransactionStore,
    matchable: &[[Vec<Mp>; 2]; 2],
    unweighted: [&[PostingId]; 2],
    max_residual: Decimal,
    ctx: &MatchContext<'_>,
) -> Vec<PostingMatchSet> {
    if matchable
        .iter()
        .any(|sign_group| sign_group.iter().all(Vec::is_empty))
    {
        return Vec::new();
    }

    let negative = compute_single_sign_match_groups(
        store,
        [matchable[0][0].as_slice(), matchable[0][1].as_slice()],
        unweighted,
        ctx,
        max_residual,
    );
    let positive = compute_single_sign_match_groups(
        store,
        [matchable[1][0].as_slice(), matchable[1][1].as_slice()],
        unweighted,
        ctx,
        max_residual,
    );

    let mut results = vec![PostingMatchSet::empty()];
    for (negative_group, positive_table) in single_sign_group_combinations(&negative, &positive) {
        for (total, negative_set) in &negative_group {
            for (_, positive_set) in
                positive_table.find(-total - max_residual, -total + max_residual)
            {
                results.push(negative_set.combined_with(positive_set));
            }
        }
    }
    filter_dominated_match_sets(results)
}

/// The per-currency tolerances for a merge of two transactions.
///
/// The tolerance for a currency is the maximum absolute residual of the first
/// transaction, the second transaction, or their combination. When any posting has no
/// computable weight, all tolerances are zero.
fn max_residuals_from_weights(
    a_weights: &[Option<Amount>],
    b_weights: &[Option<Amount>],
) -> SimpleInventory {
    let mut combined = SimpleInventory::new();
    if a_weights.iter().chain(b_weights).any(Option::is_none) {
        return combined;
    }

    for weight in a_weights.iter().flatten() {
        combined.add(weight);
    }
    let a_residuals = combined.clone();
    for weight in b_weights.iter().flatten() {
        combined.add(weight);
    }

    let mut result = a_residuals.clone();
    for (currency, combined_value) in combined.iter() {
        let a_value = a_residuals.get(currency);
        let b_value = *combined_value - a_value;
        result.insert(
            currency.clone(),
            a_value.abs().max(b_value.abs()).max(combined_value.abs()),
        );
    }
    result.map_values(|value| value.abs());
    result
}

/// Compute all merged transactions for a pair of transactions.
///
/// Returns the merged transaction ids together with the set of source posting ids that
/// took part in any match.
pub(crate) fn combined_transactions(
    store: &mut TransactionStore,
    txns: (TransactionId, TransactionId),
    ctx: &MatchContext<'_>,
) -> (Vec<TransactionId>, HashSet<PostingId>) {
    let weighted = [
        weighted_postings(store, txns.0),
        weighted_postings(store, txns.1),
    ];
    let groups = [
        matchable_posting_groups(store, &weighted[0], ctx),
        matchable_posting_groups(store, &weighted[1], ctx),
    ];
    let unweighted: [Vec<PostingId>; 2] = [
        weighted[0]
            .iter()
            .filter(|(_, weight)| weight.is_none())
            .map(|(id, _)| *id)
            .collect(),
        weighted[1]
            .iter()
            .filter(|(_, weight)| weight.is_none())
            .map(|(id, _)| *id)
            .collect(),
    ];

    let currencies: IndexSet<Currency> = groups
        .iter()
        .flat_map(|group| group.keys().map(|key| key.currency.clone()))
        .collect();

    let max_residuals = max_residuals_from_weights(
        &weighted[0].iter().map(|(_, w)| w.clone()).collect::<Vec<_>>(),
        &weighted[1].iter().map(|(_, w)| w.clone()).collect::<Vec<_>>(),
    );

    let mut match_groups: Vec<Vec<PostingMatchSet>> = Vec::new();
    for currency in &currencies {
        let matchable: [[Vec<Mp>; 2]; 2] = [false, true].map(|is_positive| {
            [0, 1].map(|txn_index| {
                groups[txn_index]
                    .get(&MatchGroupKey {
                        currency: currency.clone(),
                        is_positive,
                    })
                    .cloned()
                    .unwrap_or_default()
            })
        });
        match_groups.push(compute_balanced_match_group(
            store,
            &matchable,
            [unweighted[0].as_slice(), unweighted[1].as_slice()],
            max_residuals.get(currency),
            ctx,
        ));
    }

    let mut results = Vec::new();
    let mut postings_matched = HashSet::new();
    for combination in match_groups
        .iter()
        .map(|sets| sets.iter())
        .multi_cartesian_product()
    {
        let mut combined = PostingMatchSet::empty();
        for match_set in combination {
            combined = combined.combined_with(match_set);
        }
        if combined.matches.is_empty() {
            continue;
        }
        for m in &combined.matches {
            postings_matched.extend(posting_ids_in_match(m));
        }
        results.push(combine_transactions_using_match_set(
            store,
            txns,
            ctx.is_cleared,
            &combined,
        ));
    }
    (results, postings_matched)
}
