//! The append-only store owning all transactions and postings.
//!
//! Matching works with identities a lot: a posting may appear untouched in many merged
//! transactions, the extender deduplicates on sets of used transactions, and the posting
//! index refers to postings of transactions it does not own. Instead of pointers, every
//! [`Transaction`] and [`Posting`] lives in a [`TransactionStore`] and is referred to by a
//! 32-bit id. Merged transactions and combined postings are freshly allocated into the
//! same store; nothing is ever removed.

use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use crate::types::{Posting, Transaction};

/// Identifier of a transaction in a [`TransactionStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u32);

/// Identifier of a posting in a [`TransactionStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostingId(u32);

/// The arena holding all transactions and postings of one engine instance.
#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: Vec<Transaction>,
    postings: Vec<Posting>,
}

impl TransactionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of transactions in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Add a posting, returning its id.
    pub fn add_posting(&mut self, posting: Posting) -> PostingId {
        let id = PostingId(u32::try_from(self.postings.len()).expect("store size within u32"));
        self.postings.push(posting);
        id
    }

    /// Add a list of postings, returning their ids.
    pub fn add_postings(&mut self, postings: impl IntoIterator<Item = Posting>) -> ThinVec<PostingId> {
        postings.into_iter().map(|p| self.add_posting(p)).collect()
    }

    /// Add a transaction whose postings have already been added.
    pub fn add_transaction(&mut self, transaction: Transaction) -> TransactionId {
        let id =
            TransactionId(u32::try_from(self.transactions.len()).expect("store size within u32"));
        self.transactions.push(transaction);
        id
    }

    #[must_use]
    pub fn transaction(&self, id: TransactionId) -> &Transaction {
        &self.transactions[id.0 as usize]
    }

    pub(crate) fn transaction_mut(&mut self, id: TransactionId) -> &mut Transaction {
        &mut self.transactions[id.0 as usize]
    }

    #[must_use]
    pub fn posting(&self, id: PostingId) -> &Posting {
        &self.postings[id.0 as usize]
    }

    /// Iterate over the postings of a transaction.
    pub fn postings(&self, id: TransactionId) -> impl Iterator<Item = (PostingId, &Posting)> {
        self.transaction(id)
            .postings
            .iter()
            .map(|&pid| (pid, self.posting(pid)))
    }

    /// Render a transaction in a compact journal-like form, for logs and tests.
    #[must_use]
    pub fn render_transaction(&self, id: TransactionId) -> String {
        use crate::types::repr::Repr;

        let txn = self.transaction(id);
        let mut out = format!("{} {}", txn.header.date, txn.flag);
        if let Some(payee) = &txn.payee {
            out.push_str(&format!(" \"{payee}\""));
        }
        if let Some(narration) = &txn.narration {
            out.push_str(&format!(" \"{narration}\""));
        }
        for tag in txn.header.tags.iter() {
            out.push_str(&format!(" #{tag}"));
        }
        for link in txn.header.links.iter() {
            out.push_str(&format!(" ^{link}"));
        }
        out.push('\n');
        for meta_line in txn.header.meta.repr().lines() {
            out.push_str("  ");
            out.push_str(meta_line);
            out.push('\n');
        }
        for (_, posting) in self.postings(id) {
            for line in posting.repr().lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
