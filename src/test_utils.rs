use std::str::FromStr;

use crate::matching::PostingIndex;
use crate::options::MatcherOptions;
use crate::store::{TransactionId, TransactionStore};
use crate::types::{
    Amount, Currency, Date, Decimal, EntryHeader, Filename, Flag, MetaValue, Posting, Transaction,
};

/// Test helper to create a Currency from a string like `EUR`
pub fn c(cur: &str) -> Currency {
    cur.into()
}

/// Test helper to create a Decimal from a string like `4.00`
pub fn d(dec: &str) -> Decimal {
    Decimal::from_str_exact(dec).unwrap()
}

/// Test helper to create an Amount from a string like `4.00 USD`
pub fn a(amt: &str) -> Amount {
    Amount::from_str(amt).unwrap()
}

/// Test helper to create a Date from a string like `2016-01-01`
pub fn date(s: &str) -> Date {
    Date::try_from_str(s).unwrap()
}

/// Create a posting with the given account and units.
pub fn posting(account: &str, units: &str) -> Posting {
    Posting::new_simple(account.into(), a(units))
}

/// Create a posting held at cost, like `posting_with_cost("Assets:Stock", "4 STOCK", "100 USD")`.
pub fn posting_with_cost(account: &str, units: &str, cost: &str) -> Posting {
    let mut posting = posting(account, units);
    let cost_amount = a(cost);
    posting.cost = Some(crate::types::Cost::new(cost_amount.number, cost_amount.currency).into());
    posting
}

/// Add a metadata key-value pair to a posting.
pub fn with_meta(mut posting: Posting, key: &str, value: impl Into<MetaValue>) -> Posting {
    posting.meta.add(key, value);
    posting
}

/// Mark a posting as cleared via the `cleared` metadata key.
pub fn cleared(posting: Posting) -> Posting {
    with_meta(posting, "cleared", true)
}

/// The is-cleared oracle used throughout the tests: a `cleared: TRUE` metadata entry.
pub fn is_cleared_meta(posting: &Posting) -> bool {
    posting.meta.get("cleared") == Some(&MetaValue::Bool(true))
}

/// Add a transaction with the given postings to the store.
pub fn transaction(
    store: &mut TransactionStore,
    txn_date: &str,
    narration: &str,
    postings: Vec<Posting>,
) -> TransactionId {
    let posting_ids = store.add_postings(postings);
    store.add_transaction(Transaction {
        header: EntryHeader::new(date(txn_date), None, 0),
        flag: Flag::OKAY,
        payee: None,
        narration: Some(narration.into()),
        postings: posting_ids,
    })
}

/// Add a transaction that counts as coming from a journal file.
pub fn journal_transaction(
    store: &mut TransactionStore,
    txn_date: &str,
    narration: &str,
    postings: Vec<Posting>,
) -> TransactionId {
    let postings: Vec<Posting> = postings
        .into_iter()
        .map(|mut posting| {
            posting.filename = Some(Filename::new_dummy("journal"));
            posting
        })
        .collect();
    let posting_ids = store.add_postings(postings);
    store.add_transaction(Transaction {
        header: EntryHeader::new(date(txn_date), Some(Filename::new_dummy("journal")), 1),
        flag: Flag::OKAY,
        payee: None,
        narration: Some(narration.into()),
        postings: posting_ids,
    })
}

/// A posting index over the metadata-based cleared oracle with the given date window.
pub fn test_index(fuzzy_match_days: u16) -> PostingIndex {
    let options = MatcherOptions {
        fuzzy_match_days,
        ..MatcherOptions::default()
    };
    PostingIndex::new(options, Box::new(is_cleared_meta))
}
