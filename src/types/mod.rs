//! The data types that are used for handling ledger data.
//!
//! To be able to apply various optimisations and properly distinguish between them, basic
//! string-like types like [`Currency`] and [`Account`] each have their own wrapper type. With
//! their help, we can use string interners and easily make specific methods (like getting the
//! parent for an account) available.
//!
//! All of these data types can be serialised with `serde`.

pub use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

mod account;
mod amount;
mod box_str;
mod cost;
mod currency;
mod date;
mod flag;
mod metadata;
mod paths;
pub(crate) mod repr;
mod tags_links;

pub use account::{Account, UNKNOWN_ACCOUNT, UNKNOWN_ACCOUNT_PREFIX, accounts_mergeable};
pub use amount::{Amount, IncompleteAmount};
pub use box_str::BoxStr;
pub use cost::{Cost, CostLabel, CostSpec, PostingCost};
pub use currency::Currency;
pub use date::Date;
pub use flag::Flag;
pub use metadata::{EntryHeader, Meta, MetaKeyValuePair, MetaValue};
pub use paths::{Filename, FilenameError};
pub use tags_links::TagsLinks;

use crate::store::PostingId;

/// The type to use for line numbers in file positions.
pub type LineNumber = u32;

/// One leg of a transaction.
///
/// Units (and the parts of the price and cost) may be missing; such postings are
/// ineligible for weight-based matching but can still pair up via the wildcard rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    /// The filename, absent for postings that do not come from a journal file.
    pub filename: Option<Filename>,
    /// The 1-based line number.
    pub line: LineNumber,
    pub meta: Meta,

    pub account: Account,
    pub flag: Option<Flag>,
    pub units: IncompleteAmount,
    pub price: Option<IncompleteAmount>,
    pub cost: Option<PostingCost>,
}

impl Posting {
    #[must_use]
    pub fn new_simple(account: Account, units: Amount) -> Self {
        Self {
            filename: None,
            line: 0,
            meta: Meta::default(),
            account,
            flag: None,
            units: units.into(),
            price: None,
            cost: None,
        }
    }
}

/// A transaction.
///
/// The postings are stored in the owning [`TransactionStore`](crate::store::TransactionStore)
/// and referenced by id, so that postings keep a stable identity when transactions are
/// merged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub header: EntryHeader,
    pub flag: Flag,
    pub payee: Option<BoxStr>,
    pub narration: Option<BoxStr>,
    pub postings: ThinVec<PostingId>,
}

impl Transaction {
    /// The transaction date.
    #[must_use]
    pub fn date(&self) -> Date {
        self.header.date
    }

    /// Whether this transaction was read from a journal file.
    #[must_use]
    pub fn is_from_journal(&self) -> bool {
        self.header.filename.is_some()
    }
}
