//! Static symbol→USD price table.
//!
//! Prices are configuration, not discovery; changing them requires a
//! restart. Portfolio values derived from this table are estimates.

use alloy_primitives::U256;

use crate::domain::services::analysis::u256_to_f64;

/// Known token symbols and their USD prices
const PRICE_TABLE: &[(&str, f64)] = &[
    ("SEI", 0.42),
    ("WSEI", 0.42),
    ("ISEI", 0.45),
    ("USDC", 1.0),
    ("USDT", 1.0),
    ("DAI", 1.0),
    ("WETH", 3200.0),
    ("WBTC", 67000.0),
    ("ATOM", 9.2),
    ("OSMO", 0.55),
];

/// Decimals of the native coin
pub const NATIVE_DECIMALS: u32 = 18;

/// USD price for a token symbol, if it is in the table
pub fn usd_price(symbol: &str) -> Option<f64> {
    let symbol = symbol.to_ascii_uppercase();
    PRICE_TABLE
        .iter()
        .find(|(known, _)| *known == symbol)
        .map(|(_, price)| *price)
}

/// USD value of a native balance given in wei
pub fn native_usd(balance_wei: U256) -> f64 {
    scaled(balance_wei, NATIVE_DECIMALS) * usd_price("SEI").unwrap_or(0.0)
}

/// USD value of a token balance; zero for symbols outside the table
pub fn holding_usd(balance: U256, decimals: u32, symbol: &str) -> f64 {
    match usd_price(symbol) {
        Some(price) => scaled(balance, decimals) * price,
        None => 0.0,
    }
}

fn scaled(amount: U256, decimals: u32) -> f64 {
    u256_to_f64(amount) / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_lookup_is_case_insensitive() {
        assert_eq!(usd_price("usdc"), Some(1.0));
        assert_eq!(usd_price("SEI"), Some(0.42));
        assert_eq!(usd_price("SHIB"), None);
    }

    #[test]
    fn test_native_usd() {
        // 10 SEI at 0.42
        let wei = U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64));
        let usd = native_usd(wei);
        assert!((usd - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_holding_is_worthless() {
        let balance = U256::from(1_000_000u64);
        assert_eq!(holding_usd(balance, 6, "JUNK"), 0.0);
        assert!((holding_usd(balance, 6, "USDT") - 1.0).abs() < 1e-9);
    }
}
