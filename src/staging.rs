//! Staged journal edits.
//!
//! The engine does not touch the ledger files itself. When the user accepts a merge
//! candidate, the engine produces a [`StagedChanges`] value describing the edits, and
//! the host's [`JournalEditor`] applies them while preserving the surrounding file
//! layout.

use crate::errors::MatchError;
use crate::matching::MergedTransaction;
use crate::store::{TransactionId, TransactionStore};
use crate::types::Filename;

/// A single staged edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StagedChange {
    /// Insert a new entry into the given output file.
    AddEntry {
        transaction: TransactionId,
        output_file: Filename,
    },
    /// Remove an existing on-disk entry.
    RemoveEntry { transaction: TransactionId },
    /// Replace an existing on-disk entry with a new one.
    ChangeEntry {
        old: TransactionId,
        new: TransactionId,
    },
}

/// An ordered set of staged edits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedChanges {
    changes: Vec<StagedChange>,
}

impl StagedChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn add_entry(&mut self, transaction: TransactionId, output_file: Filename) {
        self.changes.push(StagedChange::AddEntry {
            transaction,
            output_file,
        });
    }

    pub fn remove_entry(&mut self, transaction: TransactionId) {
        self.changes.push(StagedChange::RemoveEntry { transaction });
    }

    pub fn change_entry(&mut self, old: TransactionId, new: TransactionId) {
        self.changes.push(StagedChange::ChangeEntry { old, new });
    }

    /// The staged edits in order.
    pub fn iter(&self) -> impl Iterator<Item = &StagedChange> {
        self.changes.iter()
    }
}

/// The host-side editor applying staged changes to the journal files.
///
/// Implementations are expected to preserve the untouched parts of each file and to
/// return the resulting per-file contents.
pub trait JournalEditor {
    type Error;

    /// Apply the staged changes, returning the new contents of each touched file.
    ///
    /// # Errors
    ///
    /// Implementation-defined; e.g. a file was modified concurrently.
    fn apply(
        &mut self,
        store: &TransactionStore,
        changes: &StagedChanges,
    ) -> Result<Vec<(Filename, String)>, Self::Error>;
}

/// Build the staged changes for an accepted merge candidate.
///
/// The first used transaction that lives in a journal file is replaced by the merged
/// transaction and any further on-disk used transactions are removed. When no used
/// transaction is on disk yet, the merged transaction is added to the default output
/// file (unless the merged transaction itself is already on disk).
///
/// # Errors
///
/// Returns [`MatchError::CandidateWithoutSources`] if the candidate used no
/// transactions.
pub fn stage_candidate(
    store: &TransactionStore,
    candidate: &MergedTransaction,
    output_file: &Filename,
) -> Result<StagedChanges, MatchError> {
    if candidate.used_transactions.is_empty() {
        return Err(MatchError::CandidateWithoutSources);
    }

    let mut stage = StagedChanges::new();
    let mut on_disk = candidate
        .used_transactions
        .iter()
        .copied()
        .filter(|&used| store.transaction(used).is_from_journal());
    match on_disk.next() {
        Some(first) => {
            stage.change_entry(first, candidate.transaction);
            for used in on_disk {
                stage.remove_entry(used);
            }
        }
        None => {
            if !store.transaction(candidate.transaction).is_from_journal() {
                stage.add_entry(candidate.transaction, output_file.clone());
            }
        }
    }
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{journal_transaction, posting, transaction};

    fn merged(
        store: &mut TransactionStore,
        used: Vec<TransactionId>,
    ) -> MergedTransaction {
        let transaction = transaction(
            store,
            "2016-01-01",
            "Merged",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        MergedTransaction {
            transaction,
            used_transactions: used,
        }
    }

    #[test]
    fn test_stage_with_on_disk_transactions() {
        let mut store = TransactionStore::new();
        let pending = transaction(
            &mut store,
            "2016-01-01",
            "Pending",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let on_disk_a = journal_transaction(
            &mut store,
            "2016-01-01",
            "First",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let on_disk_b = journal_transaction(
            &mut store,
            "2016-01-02",
            "Second",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let candidate = merged(&mut store, vec![pending, on_disk_a, on_disk_b]);
        let output = Filename::new_dummy("out");
        let stage = stage_candidate(&store, &candidate, &output).unwrap();
        let changes: Vec<&StagedChange> = stage.iter().collect();
        assert_eq!(
            changes,
            vec![
                &StagedChange::ChangeEntry {
                    old: on_disk_a,
                    new: candidate.transaction
                },
                &StagedChange::RemoveEntry {
                    transaction: on_disk_b
                },
            ]
        );
    }

    #[test]
    fn test_stage_all_pending() {
        let mut store = TransactionStore::new();
        let pending_a = transaction(
            &mut store,
            "2016-01-01",
            "First",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let pending_b = transaction(
            &mut store,
            "2016-01-01",
            "Second",
            vec![posting("Assets:A", "-1 USD"), posting("Assets:B", "1 USD")],
        );
        let candidate = merged(&mut store, vec![pending_a, pending_b]);
        let output = Filename::new_dummy("out");
        let stage = stage_candidate(&store, &candidate, &output).unwrap();
        let changes: Vec<&StagedChange> = stage.iter().collect();
        assert_eq!(
            changes,
            vec![&StagedChange::AddEntry {
                transaction: candidate.transaction,
                output_file: output
            }]
        );
    }

    #[test]
    fn test_stage_without_sources_is_an_error() {
        let mut store = TransactionStore::new();
        let candidate = merged(&mut store, vec![]);
        let output = Filename::new_dummy("out");
        assert!(matches!(
            stage_candidate(&store, &candidate, &output),
            Err(MatchError::CandidateWithoutSources)
        ));
    }
}
