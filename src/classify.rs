//! The unknown-account classifier interface.
//!
//! Postings with an unknown account are filled in by a classifier that the host
//! supplies. The engine's side of the contract is feature extraction: walking a
//! transaction, running the registered per-metadata-key extractors, grouping the
//! unknown postings, and normalizing the resulting key-value pairs into boolean
//! `key:value` features. Training is append-only over confirmed transactions and
//! prediction is a pure function.

use hashbrown::HashMap;
use indexmap::IndexMap;
use regex::Regex;

use crate::store::{TransactionId, TransactionStore};
use crate::types::{Account, Date, IncompleteAmount, MetaValue, Posting, Transaction};
use crate::weights::posting_date;

/// Accounts matching this pattern carry no signal for classification (e.g. capital
/// gains legs of a sale).
pub const DEFAULT_IGNORE_ACCOUNT_PATTERN: &str = "^Income.*:Capital-Gains(?::|$)";

/// Key-value pairs extracted from a transaction for one prediction or example.
pub type KeyValuePairs = IndexMap<String, Vec<String>>;

/// A function called with a metadata value to contribute key-value pairs.
pub type KeyExtractor = Box<dyn Fn(&MetaValue, &mut KeyValuePairs)>;

/// The input to one account prediction.
#[derive(Debug, Clone)]
pub struct PredictionInput {
    /// The account of the posting the features were derived from, when the features
    /// come from a sibling posting rather than the unknown posting itself.
    pub source_account: Option<Account>,
    pub amount: IncompleteAmount,
    pub date: Date,
    pub key_value_pairs: KeyValuePairs,
}

/// A source of key-value pairs for postings of the accounts it manages.
///
/// This is implemented by the host's importers, which know how to derive descriptive
/// pairs from the entries they generated.
pub trait FeatureSource {
    fn example_key_value_pairs(
        &self,
        store: &TransactionStore,
        transaction: &Transaction,
        posting: &Posting,
    ) -> KeyValuePairs;
}

/// The classifier itself. Prediction must be pure.
pub trait AccountClassifier {
    /// Predict the account for the given input, or `None` when the classifier has no
    /// opinion (e.g. it has not been trained yet).
    fn predict_account(&self, input: &PredictionInput) -> Option<Account>;
}

fn meta_value_text(value: &MetaValue) -> Option<String> {
    match value {
        MetaValue::String(text) | MetaValue::Tag(text) => Some(text.clone()),
        MetaValue::Account(account) => Some(account.to_string()),
        MetaValue::Currency(currency) => Some(currency.to_string()),
        MetaValue::Number(number) => Some(number.to_string()),
        MetaValue::Date(_) | MetaValue::Bool(_) | MetaValue::Amount(_) => None,
    }
}

/// The boolean feature names for a prediction input.
///
/// Values are lowercased, stripped of `-` and `.`, split on whitespace, and every
/// contiguous word n-gram is emitted as a `key:words` feature.
#[must_use]
pub fn features(input: &PredictionInput) -> Vec<String> {
    let mut features = Vec::new();
    features.push(format!(
        "account:{}",
        input
            .source_account
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    ));

    // The amount and the date carry no features for now.

    for (key, values) in &input.key_value_pairs {
        for value in values {
            let words: Vec<String> = value
                .split_whitespace()
                .map(|word| word.trim_matches(['-', '.']).to_lowercase())
                .filter(|word| !word.is_empty())
                .collect();
            for start in 0..words.len() {
                for end in start + 1..=words.len() {
                    features.push(format!("{key}:{}", words[start..end].join(" ")));
                }
            }
        }
    }
    features
}

/// The append-only set of training examples.
#[derive(Default)]
pub struct TrainingExamples {
    examples: Vec<(Vec<String>, Account)>,
}

impl TrainingExamples {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one confirmed example.
    pub fn add(&mut self, input: &PredictionInput, target_account: Account) {
        self.examples.push((features(input), target_account));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// The accumulated `(features, target account)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(Vec<String>, Account)> {
        self.examples.iter()
    }
}

/// The unknown postings of a transaction.
pub fn unknown_account_postings<'a>(
    store: &'a TransactionStore,
    transaction: TransactionId,
) -> impl Iterator<Item = &'a Posting> {
    store
        .postings(transaction)
        .map(|(_, posting)| posting)
        .filter(|posting| posting.account.is_unknown())
}

/// The group number of each unknown posting, in posting order.
///
/// Unknown postings sharing the same suffixed account (`Expenses:FIXME:X`) form one
/// group that must be classified together; each bare `Expenses:FIXME` posting is a
/// group of its own.
#[must_use]
pub fn unknown_account_group_numbers(
    store: &TransactionStore,
    transaction: TransactionId,
) -> Vec<usize> {
    let mut group_count = 0;
    let mut group_numbers = Vec::new();
    let mut existing_groups: HashMap<Account, usize> = HashMap::new();
    for (_, posting) in store.postings(transaction) {
        if !posting.account.is_unknown() {
            continue;
        }
        let group_number = if posting.account.is_suffixed_unknown() {
            *existing_groups
                .entry(posting.account.clone())
                .or_insert(group_count)
        } else {
            group_count
        };
        if group_number == group_count {
            group_count += 1;
        }
        group_numbers.push(group_number);
    }
    group_numbers
}

/// Extracts features from transactions via the registered per-metadata-key extractors.
pub struct FeatureExtractor<'s> {
    account_sources: HashMap<Account, &'s dyn FeatureSource>,
    posting_key_extractors: HashMap<String, KeyExtractor>,
    transaction_key_extractors: HashMap<String, KeyExtractor>,
    ignore_account_pattern: Regex,
}

/// An extractor that collects the metadata value verbatim under its key.
fn default_extractor(key: String) -> KeyExtractor {
    Box::new(move |value, pairs| {
        if let Some(text) = meta_value_text(value) {
            pairs.entry(key.clone()).or_default().push(text);
        }
    })
}

impl<'s> FeatureExtractor<'s> {
    /// Create an extractor over the given per-account sources and metadata keys.
    ///
    /// `posting_keys` and `transaction_keys` name the metadata keys to extract, each
    /// with an optional custom extractor (the default collects the value verbatim).
    ///
    /// # Panics
    ///
    /// Panics if `ignore_account_pattern` is not a valid regular expression.
    #[must_use]
    pub fn new(
        account_sources: HashMap<Account, &'s dyn FeatureSource>,
        posting_keys: impl IntoIterator<Item = (String, Option<KeyExtractor>)>,
        transaction_keys: impl IntoIterator<Item = (String, Option<KeyExtractor>)>,
        ignore_account_pattern: Option<&str>,
    ) -> Self {
        let build = |keys: &mut HashMap<String, KeyExtractor>,
                     entries: &mut dyn Iterator<Item = (String, Option<KeyExtractor>)>| {
            for (key, extractor) in entries {
                let extractor = extractor.unwrap_or_else(|| default_extractor(key.clone()));
                keys.insert(key, extractor);
            }
        };
        let mut posting_key_extractors = HashMap::new();
        build(&mut posting_key_extractors, &mut posting_keys.into_iter());
        let mut transaction_key_extractors = HashMap::new();
        build(
            &mut transaction_key_extractors,
            &mut transaction_keys.into_iter(),
        );
        Self {
            account_sources,
            posting_key_extractors,
            transaction_key_extractors,
            ignore_account_pattern: Regex::new(
                ignore_account_pattern.unwrap_or(DEFAULT_IGNORE_ACCOUNT_PATTERN),
            )
            .expect("ignore pattern is a valid regex"),
        }
    }

    fn ignored_for_classification(&self, posting: &Posting) -> bool {
        self.ignore_account_pattern
            .is_match(posting.account.as_str())
    }

    fn transaction_pairs(&self, transaction: &Transaction) -> KeyValuePairs {
        let mut pairs = KeyValuePairs::new();
        for entry in transaction.header.meta.iter() {
            if let Some(extractor) = self.transaction_key_extractors.get(&entry.key)
                && let Some(value) = &entry.value
            {
                extractor(value, &mut pairs);
            }
        }
        pairs
    }

    fn posting_pairs(&self, posting: &Posting) -> KeyValuePairs {
        let mut pairs = KeyValuePairs::new();
        for entry in posting.meta.iter() {
            if let Some(extractor) = self.posting_key_extractors.get(&entry.key)
                && let Some(value) = &entry.value
            {
                extractor(value, &mut pairs);
            }
        }
        pairs
    }

    fn merged_pairs(base: &KeyValuePairs, extra: KeyValuePairs) -> KeyValuePairs {
        let mut merged = base.clone();
        for (key, mut values) in extra {
            merged.entry(key).or_default().append(&mut values);
        }
        merged
    }

    /// Extract training examples from confirmed transactions.
    ///
    /// Postings with extractable metadata contribute direct examples; simple
    /// two-posting transactions without any contribute an indirect example derived
    /// from the sibling posting's source.
    pub fn extract_examples(
        &self,
        store: &TransactionStore,
        transactions: impl IntoIterator<Item = TransactionId>,
        examples: &mut TrainingExamples,
    ) {
        for transaction_id in transactions {
            let transaction = store.transaction(transaction_id);
            let transaction_pairs = self.transaction_pairs(transaction);

            let mut got_example = false;
            for (_, posting) in store.postings(transaction_id) {
                if posting.account.is_unknown() {
                    continue;
                }
                let pairs = self.posting_pairs(posting);
                if pairs.is_empty() {
                    continue;
                }
                got_example = true;
                examples.add(
                    &PredictionInput {
                        source_account: None,
                        amount: posting.units.clone(),
                        date: transaction.header.date,
                        key_value_pairs: Self::merged_pairs(&transaction_pairs, pairs),
                    },
                    posting.account.clone(),
                );
            }
            if got_example {
                continue;
            }

            let considered: Vec<&Posting> = store
                .postings(transaction_id)
                .map(|(_, posting)| posting)
                .filter(|posting| !self.ignored_for_classification(posting))
                .collect();
            if considered.len() != 2 {
                continue;
            }
            for (posting_index, posting) in considered.iter().enumerate() {
                let target_account = &considered[1 - posting_index].account;
                if target_account.is_unknown() {
                    continue;
                }
                let Some(source) = self.account_sources.get(&posting.account) else {
                    continue;
                };
                let pairs = source.example_key_value_pairs(store, transaction, posting);
                if pairs.is_empty() {
                    continue;
                }
                examples.add(
                    &PredictionInput {
                        source_account: Some(posting.account.clone()),
                        amount: posting.units.clone(),
                        date: posting_date(transaction, posting),
                        key_value_pairs: Self::merged_pairs(&transaction_pairs, pairs),
                    },
                    target_account.clone(),
                );
            }
        }
    }

    /// The prediction input for each unknown-account group of a transaction.
    ///
    /// Groups without extractable posting metadata yield `None`, except that a simple
    /// transaction with a single unknown group falls back to features derived from the
    /// one known posting's source.
    #[must_use]
    pub fn unknown_account_group_features(
        &self,
        store: &TransactionStore,
        transaction_id: TransactionId,
    ) -> Vec<Option<PredictionInput>> {
        let transaction = store.transaction(transaction_id);
        let group_numbers = unknown_account_group_numbers(store, transaction_id);
        let transaction_pairs = self.transaction_pairs(transaction);

        let group_count = group_numbers.iter().max().map_or(0, |max| max + 1);
        let mut group_postings: Vec<Vec<&Posting>> = vec![Vec::new(); group_count];
        for (posting, &group_number) in
            unknown_account_postings(store, transaction_id).zip(&group_numbers)
        {
            group_postings[group_number].push(posting);
        }

        let mut predictions: Vec<Option<PredictionInput>> = group_postings
            .iter()
            .map(|postings| self.direct_posting_prediction(transaction, &transaction_pairs, postings))
            .collect();

        if group_numbers == [0] && predictions == [None] {
            predictions[0] = self.indirect_posting_prediction(store, transaction_id);
        }
        predictions
    }

    fn direct_posting_prediction(
        &self,
        transaction: &Transaction,
        transaction_pairs: &KeyValuePairs,
        postings: &[&Posting],
    ) -> Option<PredictionInput> {
        let mut pairs = KeyValuePairs::new();
        for posting in postings {
            for (key, mut values) in self.posting_pairs(posting) {
                pairs.entry(key).or_default().append(&mut values);
            }
        }
        if pairs.is_empty() {
            return None;
        }
        Some(PredictionInput {
            source_account: None,
            amount: postings
                .last()
                .map(|posting| posting.units.clone())
                .unwrap_or_default(),
            date: transaction.header.date,
            key_value_pairs: Self::merged_pairs(transaction_pairs, pairs),
        })
    }

    fn indirect_posting_prediction(
        &self,
        store: &TransactionStore,
        transaction_id: TransactionId,
    ) -> Option<PredictionInput> {
        let transaction = store.transaction(transaction_id);
        let considered: Vec<&Posting> = store
            .postings(transaction_id)
            .map(|(_, posting)| posting)
            .filter(|posting| !self.ignored_for_classification(posting))
            .collect();
        if considered.len() != 2 {
            return None;
        }
        let source_posting = if considered[1].account.is_unknown() {
            considered[0]
        } else {
            considered[1]
        };
        let source = self.account_sources.get(&source_posting.account)?;
        let pairs = source.example_key_value_pairs(store, transaction, source_posting);
        Some(PredictionInput {
            source_account: Some(source_posting.account.clone()),
            amount: source_posting.units.clone(),
            date: posting_date(transaction, source_posting),
            key_value_pairs: pairs,
        })
    }
}

impl PartialEq for PredictionInput {
    fn eq(&self, other: &Self) -> bool {
        self.source_account == other.source_account
            && self.amount == other.amount
            && self.date == other.date
            && self.key_value_pairs == other.key_value_pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{date, posting, transaction, with_meta};

    fn input_with(pairs: &[(&str, &[&str])]) -> PredictionInput {
        PredictionInput {
            source_account: Some("Assets:Checking".into()),
            amount: IncompleteAmount::missing(),
            date: date("2016-01-01"),
            key_value_pairs: pairs
                .iter()
                .map(|(key, values)| {
                    ((*key).to_owned(), values.iter().map(|v| (*v).to_owned()).collect())
                })
                .collect(),
        }
    }

    #[test]
    fn test_features_ngrams() {
        let input = input_with(&[("desc", &["Big-. Grocery Store"])]);
        let features = features(&input);
        assert_eq!(
            features,
            vec![
                "account:Assets:Checking",
                "desc:big",
                "desc:big grocery",
                "desc:big grocery store",
                "desc:grocery",
                "desc:grocery store",
                "desc:store",
            ]
        );
    }

    #[test]
    fn test_training_examples_append_only() {
        let mut examples = TrainingExamples::new();
        assert!(examples.is_empty());
        let input = input_with(&[("desc", &["coffee"])]);
        examples.add(&input, "Expenses:Coffee".into());
        examples.add(&input, "Expenses:Coffee".into());
        assert_eq!(examples.len(), 2);
        let collected: Vec<_> = examples.iter().collect();
        assert_eq!(collected[0].1, "Expenses:Coffee".into());
    }

    #[test]
    fn test_unknown_account_groups() {
        let mut store = TransactionStore::new();
        let txn = transaction(
            &mut store,
            "2016-01-01",
            "Narration",
            vec![
                posting("Assets:A", "-10 USD"),
                posting("Expenses:FIXME:A", "4 USD"),
                posting("Expenses:FIXME", "2 USD"),
                posting("Expenses:FIXME:A", "3 USD"),
                posting("Expenses:FIXME", "1 USD"),
            ],
        );
        assert_eq!(unknown_account_group_numbers(&store, txn), vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_direct_group_features() {
        let mut store = TransactionStore::new();
        let txn = transaction(
            &mut store,
            "2016-01-01",
            "Narration",
            vec![
                posting("Assets:A", "-10 USD"),
                with_meta(posting("Expenses:FIXME", "10 USD"), "desc", "corner shop"),
            ],
        );
        let extractor = FeatureExtractor::new(
            HashMap::new(),
            [("desc".to_owned(), None)],
            [],
            None,
        );
        let predictions = extractor.unknown_account_group_features(&store, txn);
        assert_eq!(predictions.len(), 1);
        let input = predictions[0].as_ref().unwrap();
        assert_eq!(input.source_account, None);
        assert_eq!(
            input.key_value_pairs.get("desc"),
            Some(&vec!["corner shop".to_owned()])
        );
    }

    #[test]
    fn test_indirect_group_features() {
        struct CheckingSource;
        impl FeatureSource for CheckingSource {
            fn example_key_value_pairs(
                &self,
                _store: &TransactionStore,
                _transaction: &Transaction,
                _posting: &Posting,
            ) -> KeyValuePairs {
                [("desc".to_owned(), vec!["atm withdrawal".to_owned()])]
                    .into_iter()
                    .collect()
            }
        }

        let mut store = TransactionStore::new();
        let txn = transaction(
            &mut store,
            "2016-01-01",
            "Narration",
            vec![
                posting("Assets:Checking", "-10 USD"),
                posting("Expenses:FIXME", "10 USD"),
            ],
        );
        let source = CheckingSource;
        let mut sources: HashMap<Account, &dyn FeatureSource> = HashMap::new();
        sources.insert("Assets:Checking".into(), &source);
        let extractor = FeatureExtractor::new(sources, [], [], None);
        let predictions = extractor.unknown_account_group_features(&store, txn);
        assert_eq!(predictions.len(), 1);
        let input = predictions[0].as_ref().unwrap();
        assert_eq!(input.source_account, Some("Assets:Checking".into()));
    }

    #[test]
    fn test_extract_examples_direct() {
        let mut store = TransactionStore::new();
        let txn = transaction(
            &mut store,
            "2016-01-01",
            "Narration",
            vec![
                with_meta(posting("Expenses:Coffee", "4 USD"), "desc", "espresso bar"),
                posting("Assets:Cash", "-4 USD"),
            ],
        );
        let extractor = FeatureExtractor::new(
            HashMap::new(),
            [("desc".to_owned(), None)],
            [],
            None,
        );
        let mut examples = TrainingExamples::new();
        extractor.extract_examples(&store, [txn], &mut examples);
        assert_eq!(examples.len(), 1);
        let (features, target) = &examples.iter().next().unwrap();
        assert_eq!(*target, "Expenses:Coffee".into());
        assert!(features.contains(&"desc:espresso bar".to_owned()));
    }
}
