//! Helpers shared by the three incremental analyzers: address validation,
//! 256-bit arithmetic on decimal strings, rolling windows, bounded lists
//! and risk-score assembly.

use alloy_primitives::U256;
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use crate::domain::errors::AnalyzerError;
use crate::domain::models::{Alert, AlertSeverity};

/// The EVM zero address, destination of burns and source of mints
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub const HOUR_SECS: i64 = 3_600;
pub const SIX_HOURS_SECS: i64 = 6 * HOUR_SECS;
pub const DAY_SECS: i64 = 24 * HOUR_SECS;

/// Validate a 0x-prefixed 20-byte hex entity address, returning it
/// lowercased.
pub fn validate_entity_address(address: &str) -> Result<String, AnalyzerError> {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));

    match hex {
        Some(digits) if digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(trimmed.to_lowercase())
        }
        _ => Err(AnalyzerError::InvalidAddressFormat(address.to_string())),
    }
}

/// Parse a decimal amount string; malformed upstream values count as zero
/// rather than poisoning the cycle.
pub fn parse_amount(raw: &str) -> U256 {
    U256::from_str(raw.trim()).unwrap_or(U256::ZERO)
}

/// Lossy conversion for USD estimation and display
pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::MAX)
}

/// Whether a timestamp falls within the trailing window ending now
pub fn within_window(timestamp: DateTime<Utc>, now: DateTime<Utc>, window_secs: i64) -> bool {
    timestamp <= now && now - timestamp <= Duration::seconds(window_secs)
}

/// Truncate a list to its most recent `cap` entries, dropping the oldest.
/// Bounded windows are part of the data contract.
pub fn truncate_oldest<T>(list: &mut Vec<T>, cap: usize) {
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(0..excess);
    }
}

/// Integer percentage-growth check: current > prior * (100 + pct) / 100,
/// kept in integer arithmetic until the comparison. A zero prior never
/// counts as growth (no baseline).
pub fn volume_growth_exceeds(current: U256, prior: U256, pct: u64) -> bool {
    if prior.is_zero() {
        return false;
    }
    let scaled_current = current.saturating_mul(U256::from(100u64));
    let scaled_prior = prior.saturating_mul(U256::from(100 + pct));
    scaled_current > scaled_prior
}

/// Integer percentage-growth check over counts
pub fn count_growth_exceeds(current: u64, prior: u64, pct: u64) -> bool {
    if prior == 0 {
        return false;
    }
    (current as u128) * 100 > (prior as u128) * (100 + pct) as u128
}

/// Risk contribution of a cycle's alerts: 2 per HIGH, 1 per MEDIUM
pub fn alert_risk_contribution(alerts: &[Alert]) -> u32 {
    alerts
        .iter()
        .map(|alert| match alert.severity {
            AlertSeverity::High => 2,
            AlertSeverity::Medium => 1,
            AlertSeverity::Low => 0,
        })
        .sum()
}

/// Clamp an accumulated risk contribution into the 1..=10 score range
pub fn cap_risk_score(contributions: u32) -> i32 {
    contributions.clamp(1, 10) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        let ok = validate_entity_address("0xAbC0000000000000000000000000000000000123").unwrap();
        assert_eq!(ok, "0xabc0000000000000000000000000000000000123");

        assert!(validate_entity_address("abc").is_err());
        assert!(validate_entity_address("0x123").is_err());
        assert!(validate_entity_address("0xZZZ0000000000000000000000000000000000123").is_err());
        // 41 hex digits
        assert!(validate_entity_address("0xabc00000000000000000000000000000000001234").is_err());
    }

    #[test]
    fn test_parse_amount_handles_garbage() {
        assert_eq!(parse_amount("1500"), U256::from(1500u64));
        assert_eq!(parse_amount("  42 "), U256::from(42u64));
        assert_eq!(parse_amount("not-a-number"), U256::ZERO);
        assert_eq!(parse_amount(""), U256::ZERO);
    }

    #[test]
    fn test_truncate_oldest_keeps_tail() {
        let mut list: Vec<u32> = (0..10).collect();
        truncate_oldest(&mut list, 3);
        assert_eq!(list, vec![7, 8, 9]);

        let mut short = vec![1, 2];
        truncate_oldest(&mut short, 5);
        assert_eq!(short, vec![1, 2]);
    }

    #[test]
    fn test_volume_growth() {
        let prior = U256::from(1_000u64);
        assert!(volume_growth_exceeds(U256::from(1_600u64), prior, 50));
        assert!(!volume_growth_exceeds(U256::from(1_500u64), prior, 50));
        assert!(!volume_growth_exceeds(U256::from(900u64), prior, 50));
        assert!(!volume_growth_exceeds(U256::from(10_000u64), U256::ZERO, 50));
    }

    #[test]
    fn test_count_growth_overflow_safe() {
        assert!(count_growth_exceeds(u64::MAX, 1, 100));
        assert!(!count_growth_exceeds(100, 0, 10));
    }

    #[test]
    fn test_risk_score_bounds() {
        assert_eq!(cap_risk_score(0), 1);
        assert_eq!(cap_risk_score(4), 4);
        assert_eq!(cap_risk_score(99), 10);
    }

    #[test]
    fn test_window_membership() {
        let now = Utc::now();
        assert!(within_window(now - Duration::seconds(30), now, HOUR_SECS));
        assert!(!within_window(now - Duration::seconds(2 * HOUR_SECS), now, HOUR_SECS));
        // Future timestamps are not "within the trailing window"
        assert!(!within_window(now + Duration::seconds(30), now, HOUR_SECS));
    }
}
