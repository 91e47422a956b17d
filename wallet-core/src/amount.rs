//! Fixed-point amounts for prices, token balances and wallet balances
//!
//! Every value in the ledger is an `Amount`: an unsigned count of base units
//! with 18 implied decimals. Negative values cannot be represented, so the
//! non-negative balance invariant holds by construction.

use crate::errors::{WalletError, WalletResult};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Rates are expressed in basis points (1/100 of a percent).
pub const BPS_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    /// The amount in base units (1 token = 10^18 base units)
    base_units: u128,
}

impl Amount {
    /// Number of implied decimal places
    pub const DECIMALS: u8 = 18;
    /// Base units per whole token (10^18)
    pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;
    /// Largest whole-token value accepted anywhere in the ledger
    pub const MAX_TOKENS: u128 = 1_000_000_000_000;

    pub const ZERO: Amount = Amount { base_units: 0 };

    /// Create amount from base units
    pub fn from_base_units(base_units: u128) -> WalletResult<Self> {
        let max_base_units = Self::MAX_TOKENS
            .checked_mul(Self::UNITS_PER_TOKEN)
            .ok_or_else(|| WalletError::InvalidAmount("Maximum value overflow".to_string()))?;

        if base_units > max_base_units {
            return Err(WalletError::InvalidAmount("Amount too large".to_string()));
        }

        Ok(Amount { base_units })
    }

    /// Create amount from whole tokens
    pub fn from_whole(whole: u128) -> WalletResult<Self> {
        if whole > Self::MAX_TOKENS {
            return Err(WalletError::InvalidAmount("Amount too large".to_string()));
        }

        let base_units = whole
            .checked_mul(Self::UNITS_PER_TOKEN)
            .ok_or_else(|| WalletError::InvalidAmount("Amount calculation overflow".to_string()))?;
        Self::from_base_units(base_units)
    }

    /// Parse decimal notation (`"19.99"`, `"10"`, `".5"`).
    pub fn from_string(amount_str: &str) -> WalletResult<Self> {
        let amount_str = amount_str.trim();
        if amount_str.is_empty() {
            return Err(WalletError::InvalidInput(
                "Amount cannot be empty".to_string(),
            ));
        }

        if amount_str.starts_with('-') {
            return Err(WalletError::InvalidInput(
                "Amount must not be negative".to_string(),
            ));
        }

        let parts: Vec<&str> = amount_str.split('.').collect();
        if parts.len() > 2 {
            return Err(WalletError::InvalidInput(
                "Invalid decimal format".to_string(),
            ));
        }

        let whole_str = parts[0];
        if !whole_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidInput(
                "Invalid number format".to_string(),
            ));
        }
        let whole_part: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| WalletError::InvalidInput("Invalid number format".to_string()))?
        };

        let fractional_units = if parts.len() == 2 {
            let fractional_str = parts[1];
            if fractional_str.len() > Self::DECIMALS as usize {
                return Err(WalletError::InvalidInput(
                    "Too many decimal places".to_string(),
                ));
            }
            if whole_str.is_empty() && fractional_str.is_empty() {
                return Err(WalletError::InvalidInput(
                    "Invalid number format".to_string(),
                ));
            }
            if !fractional_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(WalletError::InvalidInput(
                    "Invalid fractional part".to_string(),
                ));
            }

            let padded = format!("{:0<18}", fractional_str);
            padded
                .parse::<u128>()
                .map_err(|_| WalletError::InvalidInput("Invalid fractional part".to_string()))?
        } else {
            0
        };

        let total_base_units = whole_part
            .checked_mul(Self::UNITS_PER_TOKEN)
            .and_then(|w| w.checked_add(fractional_units))
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))?;

        Self::from_base_units(total_base_units)
    }

    /// Parse a `0x`-prefixed hex quantity of base units, as returned by
    /// `eth_getBalance` (wei share the 18-decimal scale).
    pub fn from_hex_quantity(quantity: &str) -> WalletResult<Self> {
        let digits = quantity
            .strip_prefix("0x")
            .or_else(|| quantity.strip_prefix("0X"))
            .ok_or_else(|| {
                WalletError::Provider(format!("Balance is not a hex quantity: {}", quantity))
            })?;
        if digits.is_empty() {
            return Ok(Amount::ZERO);
        }
        let base_units = u128::from_str_radix(digits, 16).map_err(|_| {
            WalletError::Provider(format!("Balance is not a hex quantity: {}", quantity))
        })?;
        Self::from_base_units(base_units)
    }

    /// Get base units
    pub fn base_units(&self) -> u128 {
        self.base_units
    }

    /// Get amount as string with full precision
    pub fn as_string(&self) -> String {
        let whole = self.base_units / Self::UNITS_PER_TOKEN;
        let fractional = self.base_units % Self::UNITS_PER_TOKEN;

        if fractional == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:018}", fractional)
                .trim_end_matches('0')
                .to_string();
            format!("{}.{}", whole, frac_str)
        }
    }

    /// Check if amount is zero
    pub fn is_zero(&self) -> bool {
        self.base_units == 0
    }

    /// Get amount as string rounded to the given number of decimals
    pub fn to_display_string(self, decimals: u8) -> String {
        let decimals = decimals.min(Self::DECIMALS);
        let scale = 10_u128.pow((Self::DECIMALS - decimals) as u32);
        // Round to nearest before splitting, so 0.999 -> "1" at 2 decimals.
        let rounded = self.base_units.saturating_add(scale / 2) / scale * scale;
        let whole = rounded / Self::UNITS_PER_TOKEN;
        let fractional = (rounded % Self::UNITS_PER_TOKEN) / scale;

        if fractional == 0 || decimals == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:0width$}", fractional, width = decimals as usize)
                .trim_end_matches('0')
                .to_string();
            format!("{}.{}", whole, frac_str)
        }
    }

    /// Add two amounts
    pub fn checked_add(&self, other: &Amount) -> WalletResult<Amount> {
        self.base_units
            .checked_add(other.base_units)
            .and_then(|sum| Amount::from_base_units(sum).ok())
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in addition".to_string()))
    }

    /// Subtract two amounts
    pub fn checked_sub(&self, other: &Amount) -> WalletResult<Amount> {
        if self.base_units < other.base_units {
            return Err(WalletError::InsufficientBalance);
        }

        Amount::from_base_units(self.base_units - other.base_units)
    }

    /// Multiply by a rate given in basis points, truncating below one base unit.
    pub fn apply_rate_bps(&self, rate_bps: u32) -> Amount {
        // MAX_TOKENS * 10^18 * 10^4 stays far below u128::MAX.
        Amount {
            base_units: self.base_units * rate_bps as u128 / BPS_DENOMINATOR,
        }
    }

    /// Multiply by an integer quantity
    pub fn checked_mul_quantity(&self, quantity: u32) -> WalletResult<Amount> {
        self.base_units
            .checked_mul(quantity as u128)
            .and_then(|product| Amount::from_base_units(product).ok())
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in multiplication".to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_string(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Accepts decimal strings as well as plain JSON numbers, since persisted
/// cart prices may have been written either way.
struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative decimal amount")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
        Amount::from_string(value).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
        Amount::from_whole(value as u128).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
        if value < 0 {
            return Err(E::custom("Amount must not be negative"));
        }
        Amount::from_whole(value as u128).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Amount, E> {
        if !value.is_finite() || value < 0.0 {
            return Err(E::custom("Amount must be a finite non-negative number"));
        }
        Amount::from_string(&value.to_string()).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parsing() {
        let amount = Amount::from_string("19.99").unwrap();
        assert_eq!(amount.as_string(), "19.99");
        assert_eq!(Amount::from_string("10").unwrap(), Amount::from_whole(10).unwrap());
        assert_eq!(Amount::from_string(".5").unwrap().as_string(), "0.5");
    }

    #[test]
    fn test_negative_and_malformed_rejected() {
        assert!(matches!(
            Amount::from_string("-5"),
            Err(WalletError::InvalidInput(_))
        ));
        assert!(matches!(
            Amount::from_string("1.2.3"),
            Err(WalletError::InvalidInput(_))
        ));
        assert!(matches!(
            Amount::from_string("1e5"),
            Err(WalletError::InvalidInput(_))
        ));
        assert!(matches!(
            Amount::from_string("."),
            Err(WalletError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::from_whole(10).unwrap();
        let b = Amount::from_string("2.5").unwrap();
        assert_eq!(a.checked_add(&b).unwrap().as_string(), "12.5");
        assert_eq!(a.checked_sub(&b).unwrap().as_string(), "7.5");
        assert_eq!(b.checked_sub(&a), Err(WalletError::InsufficientBalance));
        assert_eq!(b.checked_mul_quantity(3).unwrap().as_string(), "7.5");
    }

    #[test]
    fn test_rate_application_is_exact() {
        let price = Amount::from_whole(100).unwrap();
        assert_eq!(price.apply_rate_bps(1_000), Amount::from_whole(10).unwrap());
        let price = Amount::from_string("19.99").unwrap();
        assert_eq!(price.apply_rate_bps(500).as_string(), "0.9995");
    }

    #[test]
    fn test_hex_quantity() {
        // 1.5 ETH in wei
        let amount = Amount::from_hex_quantity("0x14d1120d7b160000").unwrap();
        assert_eq!(amount.as_string(), "1.5");
        assert!(Amount::from_hex_quantity("1234").is_err());
        assert_eq!(Amount::from_hex_quantity("0x").unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_display_rounding() {
        let amount = Amount::from_string("0.9996").unwrap();
        assert_eq!(amount.to_display_string(3), "1");
        assert_eq!(amount.to_display_string(4), "0.9996");
        assert_eq!(Amount::from_string("2.345").unwrap().to_display_string(2), "2.35");
    }

    #[test]
    fn test_serde_accepts_strings_and_numbers() {
        let from_str: Amount = serde_json::from_str("\"42.5\"").unwrap();
        let from_num: Amount = serde_json::from_str("42.5").unwrap();
        let from_int: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(from_int, Amount::from_whole(42).unwrap());
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"42.5\"");
        assert!(serde_json::from_str::<Amount>("-1").is_err());
    }
}
