use std::fmt::{Debug, Display};
use std::ops::Neg;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Cost, Currency, Decimal};

/// An amount.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The number of units in this amount.
    pub number: Decimal,
    /// The currency of the units in this amount.
    pub currency: Currency,
}

impl Amount {
    /// Create an amount from a number and currency.
    #[must_use]
    pub fn new(number: Decimal, currency: Currency) -> Self {
        Self { number, currency }
    }

    #[must_use]
    pub fn from_cost(cost: &Cost) -> Self {
        Self {
            number: cost.number,
            currency: cost.currency.clone(),
        }
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            number: -self.number,
            currency: self.currency,
        }
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount {
            number: -self.number,
            currency: self.currency.clone(),
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

impl FromStr for Amount {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let raw_number = parts.next().ok_or(())?;
        let raw_currency = parts.next().ok_or(())?;
        if parts.next().is_some() {
            return Err(());
        }
        Ok(Self {
            number: Decimal::from_str_exact(raw_number).map_err(|_| ())?,
            currency: raw_currency.into(),
        })
    }
}

/// An amount, where one or both of number and currency might still be missing.
///
/// A value with both fields empty is the fully missing amount. During matching a missing
/// field acts as a wildcard.
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct IncompleteAmount {
    pub number: Option<Decimal>,
    pub currency: Option<Currency>,
}

impl IncompleteAmount {
    /// The fully missing amount.
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// Whether both number and currency are missing.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.number.is_none() && self.currency.is_none()
    }

    /// Convert to a complete amount if neither part is missing.
    #[must_use]
    pub fn complete(&self) -> Option<Amount> {
        Some(Amount {
            number: self.number?,
            currency: self.currency.clone()?,
        })
    }
}

impl Neg for IncompleteAmount {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            number: self.number.map(Neg::neg),
            currency: self.currency,
        }
    }
}

impl Neg for &IncompleteAmount {
    type Output = IncompleteAmount;

    fn neg(self) -> IncompleteAmount {
        IncompleteAmount {
            number: self.number.map(Neg::neg),
            currency: self.currency.clone(),
        }
    }
}

impl Display for IncompleteAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self {
                number: Some(n),
                currency: Some(c),
            } => write!(f, "{n} {c}"),
            Self {
                number: None,
                currency: Some(c),
            } => write!(f, "{c}"),
            Self {
                number: Some(n),
                currency: None,
            } => write!(f, "{n}"),
            Self {
                number: None,
                currency: None,
            } => write!(f, ""),
        }
    }
}

impl From<Amount> for IncompleteAmount {
    fn from(amount: Amount) -> Self {
        Self {
            number: Some(amount.number),
            currency: Some(amount.currency),
        }
    }
}

impl FromStr for IncompleteAmount {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_str(s).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_from_string() {
        let one = Decimal::ONE;
        let eur = Currency::from("EUR");
        assert_eq!(Amount::from_str("1 EUR"), Ok(Amount::new(one, eur.clone())));
        assert_eq!(
            Amount::from_str("1    EUR"),
            Ok(Amount::new(one, eur.clone()))
        );
        assert_eq!(Amount::from_str("1    EUR   asdf"), Err(()));
        assert_eq!(Amount::from_str("1"), Err(()));
        assert_eq!(Amount::from_str("EUR"), Err(()));
    }

    #[test]
    fn test_amount_neg() {
        let amount = Amount::from_str("1.50 EUR").unwrap();
        assert_eq!(-(&amount), Amount::from_str("-1.50 EUR").unwrap());
    }

    #[test]
    fn test_incomplete_amount() {
        let missing = IncompleteAmount::missing();
        assert!(missing.is_missing());
        assert_eq!(missing.complete(), None);

        let complete = IncompleteAmount::from(Amount::from_str("2 USD").unwrap());
        assert!(!complete.is_missing());
        assert_eq!(complete.complete(), Some(Amount::from_str("2 USD").unwrap()));

        let partial = IncompleteAmount {
            number: None,
            currency: Some("USD".into()),
        };
        assert!(!partial.is_missing());
        assert_eq!(partial.complete(), None);
    }
}
