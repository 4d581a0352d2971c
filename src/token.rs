//! Token economics
//!
//! Exact integer arithmetic over token units. An amount of `1.5` tokens with
//! 18 decimals is the integer `1_500_000_000_000_000_000`; nothing in this
//! module ever goes through floating point, so every result matches what the
//! token contract computes on-chain.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::TokenError;
use crate::vesting::{RemainderPolicy, VestingSchedule};

/// Basis points in one whole (100%).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Immutable parameters of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    /// Fractional decimal places of the minor unit
    pub decimals: u8,
    /// Total supply, in units
    pub total_supply: U256,
    /// Price of one whole token, in wei
    pub price_peg: U256,
    pub minimum_transfer: U256,
    pub maximum_transfer: U256,
}

impl TokenConfig {
    /// The protocol's LGC token: 18 decimals, 13,088,000 supply, pegged at 1 ETH.
    pub fn legacy() -> Self {
        let one = pow10(18);
        let total_supply = U256::from(13_088_000u64) * one;
        Self {
            symbol: "LGC".to_string(),
            decimals: 18,
            total_supply,
            price_peg: one,
            // 0.000001 LGC
            minimum_transfer: pow10(12),
            maximum_transfer: total_supply,
        }
    }

    fn validate(&self) -> Result<(), TokenError> {
        // 10^78 does not fit in 256 bits
        if self.decimals > 77 {
            return Err(TokenError::InvalidConfig(format!(
                "{} decimals exceeds 77",
                self.decimals
            )));
        }
        if self.total_supply.is_zero() {
            return Err(TokenError::InvalidConfig("total supply is zero".to_string()));
        }
        if self.price_peg.is_zero() {
            return Err(TokenError::InvalidConfig("price peg is zero".to_string()));
        }
        if self.minimum_transfer > self.maximum_transfer {
            return Err(TokenError::InvalidConfig(
                "minimum transfer exceeds maximum transfer".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::legacy()
    }
}

fn pow10(exp: u8) -> U256 {
    let ten = U256::from(10u64);
    (0..exp).fold(U256::from(1u64), |acc, _| acc * ten)
}

/// Share of total supply in basis points (1/100 of a percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BasisPoints(pub u64);

impl BasisPoints {
    /// Decimal fraction with four places, e.g. `0.5000` for 5000 bps.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Conversions, pricing, fees and vesting for one [`TokenConfig`].
#[derive(Debug, Clone)]
pub struct TokenEconomics {
    config: TokenConfig,
    one_unit: U256,
}

impl TokenEconomics {
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        config.validate()?;
        let one_unit = pow10(config.decimals);
        Ok(Self { config, one_unit })
    }

    pub fn legacy() -> Self {
        Self {
            one_unit: pow10(18),
            config: TokenConfig::legacy(),
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Units in one whole token (`10^decimals`).
    pub fn one_unit(&self) -> U256 {
        self.one_unit
    }

    /// Parse a human-readable decimal amount (`"1.5"`, `".25"`, `"100"`) into units.
    pub fn to_units(&self, amount: &str) -> Result<U256, TokenError> {
        let malformed = || TokenError::MalformedAmount(amount.to_string());
        let trimmed = amount.trim();

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(malformed());
        }

        let decimals = self.config.decimals;
        if fraction.len() > decimals as usize {
            return Err(TokenError::TooManyDecimals {
                amount: amount.to_string(),
                decimals,
            });
        }

        let whole_value = if whole.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(whole, 10).map_err(|_| TokenError::Overflow("to_units"))?
        };
        let fraction_value = if fraction.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(fraction, 10).map_err(|_| TokenError::Overflow("to_units"))?
                * pow10(decimals - fraction.len() as u8)
        };

        whole_value
            .checked_mul(self.one_unit)
            .and_then(|scaled| scaled.checked_add(fraction_value))
            .ok_or(TokenError::Overflow("to_units"))
    }

    /// Render units as the shortest exact decimal string (`"1.5"`, `"0"`, `"13088000"`).
    pub fn from_units(&self, amount: U256) -> String {
        let (whole, fraction) = self.split(amount);
        match fraction {
            Some(fraction) => {
                let trimmed = fraction.trim_end_matches('0');
                format!("{}.{}", whole, trimmed)
            }
            None => whole.to_string(),
        }
    }

    /// Render units with exactly `digits` fractional places, truncating.
    pub fn format_amount(&self, amount: U256, digits: usize) -> String {
        let (whole, fraction) = self.split(amount);
        if digits == 0 {
            return whole.to_string();
        }
        let mut fraction = fraction.unwrap_or_default();
        if fraction.len() < digits {
            fraction.push_str(&"0".repeat(digits - fraction.len()));
        }
        format!("{}.{}", whole, &fraction[..digits])
    }

    /// Whole part and zero-padded fractional digits, if the fraction is non-zero.
    fn split(&self, amount: U256) -> (U256, Option<String>) {
        let whole = amount / self.one_unit;
        let fraction = amount % self.one_unit;
        if fraction.is_zero() {
            return (whole, None);
        }
        let width = self.config.decimals as usize;
        (whole, Some(format!("{:0>width$}", fraction.to_string(), width = width)))
    }

    /// Price in wei of `token_amount` units, truncating.
    pub fn price(&self, token_amount: U256) -> Result<U256, TokenError> {
        token_amount
            .checked_mul(self.config.price_peg)
            .map(|scaled| scaled / self.one_unit)
            .ok_or(TokenError::Overflow("price"))
    }

    /// Units purchasable for `eth_amount` wei, truncating.
    ///
    /// `price(token_amount_for(e))` is at most one wei below `e` when the peg
    /// is at or below one ETH per token.
    pub fn token_amount_for(&self, eth_amount: U256) -> Result<U256, TokenError> {
        eth_amount
            .checked_mul(self.one_unit)
            .map(|scaled| scaled / self.config.price_peg)
            .ok_or(TokenError::Overflow("token_amount_for"))
    }

    /// `amount` as a share of total supply. Saturates instead of overflowing.
    pub fn percentage_of_supply(&self, amount: U256) -> BasisPoints {
        let bps = amount.saturating_mul(U256::from(BPS_DENOMINATOR)) / self.config.total_supply;
        BasisPoints(u64::try_from(bps).unwrap_or(u64::MAX))
    }

    /// `amount * fee_rate_bps / 10000`, truncating.
    pub fn transfer_fee(&self, amount: U256, fee_rate_bps: u32) -> Result<U256, TokenError> {
        if fee_rate_bps > BPS_DENOMINATOR {
            return Err(TokenError::InvalidFeeRate(fee_rate_bps));
        }
        let rate = U256::from(fee_rate_bps);
        let denominator = U256::from(BPS_DENOMINATOR);
        // Split so the product never exceeds `amount`
        let quotient = amount / denominator;
        let remainder = amount % denominator;
        Ok(quotient * rate + remainder * rate / denominator)
    }

    /// `amount` minus its transfer fee. Fee and remainder always sum to `amount`.
    pub fn amount_after_fee(&self, amount: U256, fee_rate_bps: u32) -> Result<U256, TokenError> {
        let fee = self.transfer_fee(amount, fee_rate_bps)?;
        Ok(amount - fee)
    }

    pub fn minimum_transfer_amount(&self) -> U256 {
        self.config.minimum_transfer
    }

    pub fn maximum_transfer_amount(&self) -> U256 {
        self.config.maximum_transfer
    }

    /// True iff `amount` lies in `[minimum, maximum]`, inclusive.
    pub fn is_valid_transfer_amount(&self, amount: U256) -> bool {
        amount >= self.config.minimum_transfer && amount <= self.config.maximum_transfer
    }

    /// NFT id for `owner`: `keccak256(abi.encode(owner, nonce))`.
    pub fn token_id(owner: Address, nonce: U256) -> B256 {
        let encoded = (owner, nonce).abi_encode();
        B256::from_slice(&Keccak256::digest(&encoded))
    }

    /// Monthly vesting schedule anchored at the current time.
    ///
    /// Each of the 12 entries releases `total_amount / 12`; any remainder is
    /// dropped, matching the deployed contract.
    pub fn vesting_schedule(
        &self,
        total_amount: U256,
        duration: u64,
        cliff_duration: u64,
    ) -> Result<VestingSchedule, TokenError> {
        VestingSchedule::build(
            crate::vesting::unix_now(),
            total_amount,
            duration,
            cliff_duration,
            RemainderPolicy::Truncate,
        )
    }

    /// Vesting schedule at an explicit anchor and remainder policy.
    pub fn vesting_schedule_at(
        &self,
        anchor: u64,
        total_amount: U256,
        duration: u64,
        cliff_duration: u64,
        policy: RemainderPolicy,
    ) -> Result<VestingSchedule, TokenError> {
        VestingSchedule::build(anchor, total_amount, duration, cliff_duration, policy)
    }
}

impl Default for TokenEconomics {
    fn default() -> Self {
        Self::legacy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lgc() -> TokenEconomics {
        TokenEconomics::legacy()
    }

    #[test]
    fn test_unit_round_trip() {
        let token = lgc();
        for x in ["0", "1", "1.5", "13088000"] {
            let units = token.to_units(x).unwrap();
            assert_eq!(token.from_units(units), x);
        }
        assert_eq!(token.to_units("1.5").unwrap(), U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn test_to_units_forms() {
        let token = lgc();
        assert_eq!(token.to_units(".5").unwrap(), token.to_units("0.5").unwrap());
        assert_eq!(token.to_units("2.").unwrap(), token.to_units("2").unwrap());
        assert_eq!(token.to_units("0.000000000000000001").unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_to_units_rejects_bad_input() {
        let token = lgc();
        for bad in ["", ".", "-1", "1e18", "1.2.3", "abc", "+5"] {
            assert!(
                matches!(token.to_units(bad), Err(TokenError::MalformedAmount(_))),
                "accepted {:?}",
                bad
            );
        }
        assert!(matches!(
            token.to_units("0.0000000000000000001"),
            Err(TokenError::TooManyDecimals { decimals: 18, .. })
        ));
        let huge = "9".repeat(70);
        assert_eq!(token.to_units(&huge), Err(TokenError::Overflow("to_units")));
    }

    #[test]
    fn test_format_amount() {
        let token = lgc();
        let amount = token.to_units("1234.5678").unwrap();
        assert_eq!(token.format_amount(amount, 2), "1234.56");
        assert_eq!(token.format_amount(amount, 0), "1234");
        assert_eq!(token.format_amount(token.to_units("1").unwrap(), 2), "1.00");
    }

    #[test]
    fn test_price_and_inverse() {
        let token = lgc();
        let one = token.one_unit();
        assert_eq!(token.price(one).unwrap(), one);

        let config = TokenConfig {
            price_peg: U256::from(3u64) * pow10(17), // 0.3 ETH
            ..TokenConfig::legacy()
        };
        let token = TokenEconomics::new(config).unwrap();
        let eth = U256::from(1_000_000_000_000_000_001u128);
        let tokens = token.token_amount_for(eth).unwrap();
        let back = token.price(tokens).unwrap();
        assert!(back <= eth);
        assert!(eth - back <= U256::from(1u64));
    }

    #[test]
    fn test_price_overflow_reported() {
        assert_eq!(lgc().price(U256::MAX), Err(TokenError::Overflow("price")));
    }

    #[test]
    fn test_percentage_of_supply() {
        let token = lgc();
        let supply = token.config().total_supply;
        assert_eq!(token.percentage_of_supply(supply), BasisPoints(10_000));
        assert_eq!(token.percentage_of_supply(supply / U256::from(2u64)), BasisPoints(5_000));
        assert_eq!(token.percentage_of_supply(U256::ZERO), BasisPoints(0));
        // Saturates rather than overflowing
        assert!(token.percentage_of_supply(U256::MAX).0 > 0);
        assert_eq!(BasisPoints(5_000).to_decimal_string(), "0.5000");
        assert_eq!(BasisPoints(1_234).to_string(), "12.34%");
    }

    #[test]
    fn test_fee_conservation_example() {
        let token = lgc();
        let amount = U256::from(1_000_000u64);
        assert_eq!(token.transfer_fee(amount, 25).unwrap(), U256::from(2_500u64));
        assert_eq!(token.amount_after_fee(amount, 25).unwrap(), U256::from(997_500u64));
    }

    #[test]
    fn test_fee_rate_bounds() {
        let token = lgc();
        let amount = U256::from(777u64);
        assert_eq!(token.transfer_fee(amount, 10_000).unwrap(), amount);
        assert_eq!(token.transfer_fee(amount, 0).unwrap(), U256::ZERO);
        assert_eq!(token.transfer_fee(amount, 10_001), Err(TokenError::InvalidFeeRate(10_001)));
    }

    #[test]
    fn test_transfer_amount_bounds() {
        let token = lgc();
        let one = U256::from(1u64);
        let min = token.minimum_transfer_amount();
        let max = token.maximum_transfer_amount();
        assert!(token.is_valid_transfer_amount(min));
        assert!(token.is_valid_transfer_amount(max));
        assert!(!token.is_valid_transfer_amount(min - one));
        assert!(!token.is_valid_transfer_amount(max + one));
        assert_eq!(min, token.to_units("0.000001").unwrap());
    }

    #[test]
    fn test_invalid_config() {
        let config = TokenConfig {
            price_peg: U256::ZERO,
            ..TokenConfig::legacy()
        };
        assert!(matches!(TokenEconomics::new(config), Err(TokenError::InvalidConfig(_))));

        let config = TokenConfig {
            decimals: 78,
            ..TokenConfig::legacy()
        };
        assert!(TokenEconomics::new(config).is_err());
    }

    #[test]
    fn test_token_id_matches_abi_encoding() {
        let owner = Address::repeat_byte(0xaa);
        let id = TokenEconomics::token_id(owner, U256::from(7u64));

        let mut manual = Vec::with_capacity(64);
        manual.extend_from_slice(&[0u8; 12]);
        manual.extend_from_slice(owner.as_slice());
        manual.extend_from_slice(&U256::from(7u64).to_be_bytes::<32>());
        assert_eq!(id, B256::from_slice(&Keccak256::digest(&manual)));
        assert_ne!(id, TokenEconomics::token_id(owner, U256::from(8u64)));
    }

    #[test]
    fn test_independent_configs_coexist() {
        let six = TokenEconomics::new(TokenConfig {
            symbol: "USDX".to_string(),
            decimals: 6,
            ..TokenConfig::legacy()
        })
        .unwrap();
        assert_eq!(six.to_units("1.5").unwrap(), U256::from(1_500_000u64));
        assert_eq!(lgc().to_units("1.5").unwrap(), U256::from(1_500_000_000_000_000_000u128));
    }

    proptest! {
        #[test]
        fn prop_fee_conservation(amount in any::<u128>(), bps in 0u32..=10_000) {
            let token = lgc();
            let amount = U256::from(amount);
            let fee = token.transfer_fee(amount, bps).unwrap();
            let rest = token.amount_after_fee(amount, bps).unwrap();
            prop_assert_eq!(fee + rest, amount);
            prop_assert_eq!(fee, amount * U256::from(bps) / U256::from(10_000u64));
        }

        #[test]
        fn prop_fee_conservation_at_extremes(bps in 0u32..=10_000) {
            let token = lgc();
            let fee = token.transfer_fee(U256::MAX, bps).unwrap();
            prop_assert_eq!(fee + token.amount_after_fee(U256::MAX, bps).unwrap(), U256::MAX);
        }

        #[test]
        fn prop_units_round_trip(whole in 0u64..100_000_000, frac in 0u64..1_000_000_000_000_000_000) {
            let token = lgc();
            let units = U256::from(whole) * token.one_unit() + U256::from(frac);
            let rendered = token.from_units(units);
            prop_assert_eq!(token.to_units(&rendered).unwrap(), units);
            prop_assert_eq!(token.from_units(token.to_units(&rendered).unwrap()), rendered);
        }

        #[test]
        fn prop_price_inverse_within_one_unit(eth in any::<u64>()) {
            let token = lgc();
            let eth = U256::from(eth);
            let back = token.price(token.token_amount_for(eth).unwrap()).unwrap();
            prop_assert!(back <= eth);
            prop_assert!(eth - back <= U256::from(1u64));
        }
    }
}
