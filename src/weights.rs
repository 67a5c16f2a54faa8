//! Posting weights and posting dates.

use crate::errors::MatchError;
use crate::types::{Amount, Date, MetaValue, Posting, Transaction};

/// Metadata key giving the exact date of an individual posting.
pub const POSTING_DATE_KEY: &str = "date";

/// Metadata key giving the date the posting settled at the institution.
pub const POSTING_TRANSACTION_DATE_KEY: &str = "transaction_date";

/// Get the weight of a posting, i.e. the signed amount it contributes to balancing.
///
/// The weight of the posting is the following:
/// - if the posting has a cost with a known currency, multiply the units by the per-unit
///   cost (resolving a total-cost spec first)
/// - if the posting has a price, multiply the units by the price
/// - units otherwise
///
/// Returns `None` when the posting has missing units (or a cost or price that cannot be
/// resolved); such postings are ineligible for weight-based matching.
#[must_use]
pub fn posting_weight(posting: &Posting) -> Option<Amount> {
    let units_number = posting.units.number?;

    if let Some(cost) = &posting.cost
        && let Some(currency) = cost.currency()
    {
        let per_unit = cost.number_per_unit(units_number)?;
        return Some(Amount::new(per_unit * units_number, currency.clone()));
    }
    if let Some(price) = &posting.price
        && let Some(price_number) = price.number
        && let Some(currency) = &price.currency
    {
        return Some(Amount::new(price_number * units_number, currency.clone()));
    }
    let currency = posting.units.currency.clone()?;
    Some(Amount::new(units_number, currency))
}

/// Like [`posting_weight`], for callers that require a weight to be present.
///
/// # Errors
///
/// Returns [`MatchError::PostingLacksWeight`] when no weight can be computed.
pub fn require_posting_weight(posting: &Posting) -> Result<Amount, MatchError> {
    posting_weight(posting).ok_or_else(|| MatchError::PostingLacksWeight {
        filename: posting.filename.clone(),
        line: posting.line,
    })
}

/// The date associated with a posting.
///
/// This is the posting's `date` metadata if present, else its `transaction_date`
/// metadata, else the date of the transaction it belongs to.
#[must_use]
pub fn posting_date(transaction: &Transaction, posting: &Posting) -> Date {
    posting
        .meta
        .get(POSTING_DATE_KEY)
        .and_then(MetaValue::as_date)
        .or_else(|| {
            posting
                .meta
                .get(POSTING_TRANSACTION_DATE_KEY)
                .and_then(MetaValue::as_date)
        })
        .unwrap_or(transaction.header.date)
}

/// The exact posting date, i.e. only the `date` metadata if present.
#[must_use]
pub(crate) fn exact_posting_date(posting: &Posting) -> Option<Date> {
    posting.meta.get(POSTING_DATE_KEY).and_then(MetaValue::as_date)
}
