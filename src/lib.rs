#![doc = include_str!("../README.md")]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod errors;
pub mod inventory;
pub mod matching;
pub mod options;
pub mod staging;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod types;
mod util;
pub mod weights;

pub use matching::{ExtendedTransactions, MergedTransaction, PostingIndex, get_extended_transactions};
pub use options::MatcherOptions;
pub use store::{PostingId, TransactionId, TransactionStore};
