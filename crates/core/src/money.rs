//! Exact decimal money with a fixed per-currency scale.
//!
//! Amounts are non-negative `rust_decimal::Decimal`s rescaled at construction
//! to the currency's ISO 4217 default fractional digits using half-up
//! rounding. All arithmetic is checked; cross-currency operations fail
//! instead of converting. No floating point anywhere.

use core::cmp::Ordering;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("operation would produce a negative amount")]
    NegativeResult,

    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),
}

/// ISO 4217 alphabetic currency code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parse a 3-letter ISO 4217 code (case-insensitive).
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        let mut upper = [0u8; 3];
        for (i, b) in bytes.iter().enumerate() {
            upper[i] = b.to_ascii_uppercase();
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII uppercase letters.
        core::str::from_utf8(&self.0).expect("currency code is validated ASCII")
    }

    /// ISO 4217 default fractional digits for this currency.
    pub fn exponent(&self) -> u32 {
        match self.as_str() {
            // Zero-decimal currencies.
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            // Three-decimal currencies.
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::new(&code).map_err(serde::de::Error::custom)
    }
}

/// A non-negative amount in a specific currency.
///
/// Equality is same currency plus equal scaled amount; ordering across
/// currencies is refused rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Build a money value, rescaling half-up to the currency's ISO scale.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::NegativeAmount(amount));
        }
        Ok(Self {
            amount: rescale(amount, currency),
            currency,
        })
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: rescale(Decimal::ZERO, currency),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.assert_same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// Subtraction below zero is refused; this type never holds a negative.
    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        self.assert_same_currency(other)?;
        let result = self.amount - other.amount;
        if result.is_sign_negative() && !result.is_zero() {
            return Err(MoneyError::NegativeResult);
        }
        Ok(Money {
            amount: result,
            currency: self.currency,
        })
    }

    /// Multiply by a plain decimal factor, rescaling half-up.
    pub fn checked_mul(self, factor: Decimal) -> Result<Money, MoneyError> {
        let result = self.amount * factor;
        if result.is_sign_negative() && !result.is_zero() {
            return Err(MoneyError::NegativeResult);
        }
        Ok(Money {
            amount: rescale(result, self.currency),
            currency: self.currency,
        })
    }

    pub fn checked_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.assert_same_currency(*other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    fn assert_same_currency(&self, other: Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        Ok(())
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

fn rescale(amount: Decimal, currency: Currency) -> Decimal {
    let exponent = currency.exponent();
    let mut scaled = amount.round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero);
    // round_dp only reduces scale; pad back out so "100" renders as "100.00".
    scaled.rescale(exponent);
    scaled
}

#[derive(Serialize, Deserialize)]
struct MoneyRepr {
    amount: Decimal,
    currency: Currency,
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MoneyRepr {
            amount: self.amount,
            currency: self.currency,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = MoneyRepr::deserialize(deserializer)?;
        Money::new(repr.amount, repr.currency).map_err(serde::de::Error::custom)
    }
}
