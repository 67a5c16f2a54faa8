//! Compact text rendering of ledger values.
//!
//! This is used for debug logging and in tests; it is not a journal printer.

use crate::types::{IncompleteAmount, Meta, MetaValue, Posting, PostingCost};

pub(crate) trait Repr {
    /// Build a compact string representation of the value.
    fn repr(&self) -> String;
}

impl Repr for MetaValue {
    fn repr(&self) -> String {
        match self {
            Self::String(v) => format!("\"{v}\""),
            Self::Tag(v) => format!("#{v}"),
            Self::Date(v) => v.to_string(),
            Self::Account(v) => v.to_string(),
            Self::Bool(v) => (if *v { "TRUE" } else { "FALSE" }).to_string(),
            Self::Amount(v) => v.to_string(),
            Self::Currency(v) => v.to_string(),
            Self::Number(v) => v.to_string(),
        }
    }
}

impl Repr for Meta {
    fn repr(&self) -> String {
        let mut out = String::new();
        for pair in self.iter() {
            // Reserved double-underscore keys are internal bookkeeping.
            if pair.key.starts_with("__") {
                continue;
            }
            out.push_str(&pair.key);
            out.push(':');
            if let Some(value) = &pair.value {
                out.push(' ');
                out.push_str(&value.repr());
            }
            out.push('\n');
        }
        out
    }
}

impl Repr for PostingCost {
    fn repr(&self) -> String {
        match self {
            Self::Cost(cost) => {
                let mut out = format!("{{{} {}", cost.number, cost.currency);
                if let Some(date) = cost.date {
                    out.push_str(&format!(", {date}"));
                }
                if let Some(label) = &cost.label {
                    out.push_str(&format!(", \"{label}\""));
                }
                out.push('}');
                out
            }
            Self::Spec(spec) => {
                let mut parts = Vec::new();
                match (spec.number_per, spec.number_total) {
                    (Some(per), Some(total)) => parts.push(format!("{per} # {total}")),
                    (Some(per), None) => parts.push(per.to_string()),
                    (None, Some(total)) => parts.push(format!("# {total}")),
                    (None, None) => {}
                }
                if let Some(currency) = &spec.currency {
                    parts.push(currency.to_string());
                }
                if let Some(date) = spec.date {
                    parts.push(date.to_string());
                }
                if let Some(label) = &spec.label {
                    parts.push(format!("\"{label}\""));
                }
                format!("{{{}}}", parts.join(", "))
            }
        }
    }
}

impl Repr for Posting {
    fn repr(&self) -> String {
        let mut line = format!("{}", self.account);
        if !matches!(self.units, IncompleteAmount { number: None, currency: None }) {
            line.push_str(&format!(" {}", self.units));
        }
        if let Some(cost) = &self.cost {
            line.push_str(&format!(" {}", cost.repr()));
        }
        if let Some(price) = &self.price {
            line.push_str(&format!(" @ {price}"));
        }
        if let Some(flag) = self.flag {
            line.push_str(&format!(" {flag}"));
        }
        let mut out = line;
        out.push('\n');
        for meta_line in self.meta.repr().lines() {
            out.push_str("  ");
            out.push_str(meta_line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{c, d, posting};
    use crate::types::{Cost, CostSpec};

    #[test]
    fn test_meta_value_repr() {
        insta::assert_snapshot!(MetaValue::from("hello").repr(), @r#""hello""#);
        insta::assert_snapshot!(MetaValue::from(true).repr(), @"TRUE");
        insta::assert_snapshot!(MetaValue::from(d("5")).repr(), @"5");
    }

    #[test]
    fn test_cost_repr() {
        let cost = PostingCost::from(Cost::new(d("2"), c("USD")));
        insta::assert_snapshot!(cost.repr(), @"{2 USD}");
        let spec = PostingCost::from(CostSpec {
            number_total: Some(d("10")),
            currency: Some(c("USD")),
            ..CostSpec::default()
        });
        insta::assert_snapshot!(spec.repr(), @"{# 10, USD}");
    }

    #[test]
    fn test_posting_repr() {
        let mut posting = posting("Assets:Cash", "2.50 USD");
        posting.meta.add("note", "A");
        insta::assert_snapshot!(posting.repr(), @r#"
        Assets:Cash 2.50 USD
          note: "A"
        "#);
    }
}
