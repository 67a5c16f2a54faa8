use serde::{Deserialize, Serialize};

use super::{BoxStr, Currency, Date, Decimal};

/// A label identifying a position, attached to a cost.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostLabel(BoxStr);

impl From<&str> for CostLabel {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for CostLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully resolved cost (basically an Amount + optional date and label).
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// The per-unit cost.
    pub number: Decimal,
    /// The currency.
    pub currency: Currency,
    /// The date that this lot was created.
    pub date: Option<Date>,
    /// An optional label to identify a position.
    pub label: Option<CostLabel>,
}

impl Cost {
    /// Create a cost without date and label.
    #[must_use]
    pub fn new(number: Decimal, currency: Currency) -> Self {
        Self {
            number,
            currency,
            date: None,
            label: None,
        }
    }
}

/// A possibly incomplete cost as specified in the input.
///
/// Any field might be missing; a missing field acts as a wildcard during matching.
#[derive(Default, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct CostSpec {
    /// The per-unit cost.
    pub number_per: Option<Decimal>,
    /// The total cost.
    pub number_total: Option<Decimal>,
    /// The currency.
    pub currency: Option<Currency>,
    /// The date that this lot was created.
    pub date: Option<Date>,
    /// An optional label to identify a position.
    pub label: Option<CostLabel>,
    /// Whether the lots should be merged, like in Beancount v2.
    pub merge: bool,
}

impl From<&Cost> for CostSpec {
    fn from(cost: &Cost) -> Self {
        CostSpec {
            number_per: Some(cost.number),
            number_total: None,
            currency: Some(cost.currency.clone()),
            date: cost.date,
            label: cost.label.clone(),
            merge: false,
        }
    }
}

/// The cost attached to a posting, either fully resolved or still a spec.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingCost {
    Cost(Cost),
    Spec(CostSpec),
}

impl PostingCost {
    /// The cost currency, if known.
    #[must_use]
    pub fn currency(&self) -> Option<&Currency> {
        match self {
            Self::Cost(cost) => Some(&cost.currency),
            Self::Spec(spec) => spec.currency.as_ref(),
        }
    }

    /// The per-unit cost number, resolving a total-cost spec against the unit count.
    ///
    /// Follows the interpolation arithmetic used during booking: when a total is given,
    /// the per-unit component (if any) is added per unit and the sum divided by the
    /// absolute number of units.
    #[must_use]
    pub fn number_per_unit(&self, units_number: Decimal) -> Option<Decimal> {
        match self {
            Self::Cost(cost) => Some(cost.number),
            Self::Spec(spec) => {
                if let Some(number_total) = spec.number_total {
                    let units_number = units_number.abs();
                    if units_number.is_zero() {
                        return None;
                    }
                    let mut total = number_total;
                    if let Some(number_per) = spec.number_per {
                        total += number_per * units_number;
                    }
                    Some(total / units_number)
                } else {
                    spec.number_per
                }
            }
        }
    }
}

impl From<Cost> for PostingCost {
    fn from(cost: Cost) -> Self {
        Self::Cost(cost)
    }
}

impl From<CostSpec> for PostingCost {
    fn from(spec: CostSpec) -> Self {
        Self::Spec(spec)
    }
}
