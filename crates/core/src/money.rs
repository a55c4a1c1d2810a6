//! Monetary amounts for exam costs.
//!
//! Amounts are kept as integer cents. On the wire and in snapshots they appear as
//! decimal reais (`150.5`), which is how the hosted database exports them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::Sum;
use std::ops::Add;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Converts a decimal amount in reais, rounding to the nearest cent.
    ///
    /// Returns `None` for non-finite or out-of-range values.
    pub fn from_reais(reais: f64) -> Option<Self> {
        let cents = (reais * 100.0).round();
        if !cents.is_finite() || cents.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self {
            cents: cents as i64,
        })
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn as_reais(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Formats the amount as Brazilian Real, e.g. `R$ 1.234,56`.
    pub fn format_brl(&self) -> String {
        let abs = self.cents.unsigned_abs();
        let whole = (abs / 100).to_string();
        let fraction = abs % 100;

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if self.cents < 0 { "-" } else { "" };
        format!("{sign}R$ {grouped},{fraction:02}")
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_brl())
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_reais())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let reais = f64::deserialize(deserializer)?;
        Money::from_reais(reais)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid monetary amount: {reais}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_brazilian_real() {
        assert_eq!(Money::from_cents(0).format_brl(), "R$ 0,00");
        assert_eq!(Money::from_cents(5).format_brl(), "R$ 0,05");
        assert_eq!(Money::from_cents(15050).format_brl(), "R$ 150,50");
        assert_eq!(Money::from_cents(123_456).format_brl(), "R$ 1.234,56");
        assert_eq!(Money::from_cents(123_456_789).format_brl(), "R$ 1.234.567,89");
        assert_eq!(Money::from_cents(-100).format_brl(), "-R$ 1,00");
    }

    #[test]
    fn rounds_reais_to_cents() {
        assert_eq!(Money::from_reais(150.5).unwrap().cents(), 15050);
        assert_eq!(Money::from_reais(19.999).unwrap().cents(), 2000);
        assert!(Money::from_reais(f64::NAN).is_none());
        assert!(Money::from_reais(f64::INFINITY).is_none());
    }

    #[test]
    fn sums_amounts() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .iter()
            .sum();
        assert_eq!(total, Money::from_cents(350));
    }

    #[test]
    fn deserializes_from_decimal_reais() {
        let money: Money = serde_yaml::from_str("89.9").unwrap();
        assert_eq!(money.cents(), 8990);
    }
}
