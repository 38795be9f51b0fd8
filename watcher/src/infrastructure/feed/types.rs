//! Wire types for the block-explorer REST feed.
//!
//! The upstream is treated as an opaque paginated JSON feed; field shapes
//! vary between endpoint generations (plain strings vs `{hash: ...}`
//! objects, RFC 3339 vs unix timestamps, boolean vs `"ok"` statuses), so
//! deserialization is deliberately lenient.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::models::DataQuality;

/// One page of items from the upstream feed
#[derive(Debug, Clone)]
pub struct FeedPage<T> {
    /// Items in descending time order, as delivered by the upstream
    pub items: Vec<T>,
    /// Token identity, when the endpoint provides one
    pub token_info: Option<TokenInfo>,
    pub quality: DataQuality,
}

impl<T> FeedPage<T> {
    /// An empty page marking the upstream as unreachable
    pub fn unavailable() -> Self {
        Self {
            items: Vec::new(),
            token_info: None,
            quality: DataQuality::ServiceUnavailable,
        }
    }
}

/// A transaction row from the wallet transactions endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(alias = "txHash", alias = "tx_hash")]
    pub hash: String,
    #[serde(default, deserialize_with = "address_field")]
    pub from: String,
    #[serde(default, deserialize_with = "address_field")]
    pub to: String,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub value: String,
    /// Raw calldata hex; empty for plain value transfers
    #[serde(default, alias = "input", alias = "raw_input")]
    pub data: String,
    /// EVM transaction type (0 = legacy, 2 = dynamic fee)
    #[serde(default, rename = "type", alias = "txType", deserialize_with = "lenient_int")]
    pub tx_type: i64,
    #[serde(default = "status_ok", deserialize_with = "flexible_status")]
    pub status: bool,
    #[serde(default = "zero", alias = "gas_used", deserialize_with = "decimal_string")]
    pub gas_used: String,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub fee: String,
    #[serde(default = "Utc::now", deserialize_with = "flexible_time")]
    pub timestamp: DateTime<Utc>,
}

/// A transfer row from the erc20/erc721 transfer endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    #[serde(alias = "txHash", alias = "transactionHash", alias = "tx_hash")]
    pub hash: String,
    #[serde(default, deserialize_with = "address_field")]
    pub from: String,
    #[serde(default, deserialize_with = "address_field")]
    pub to: String,
    #[serde(default = "zero", alias = "amount", deserialize_with = "decimal_string")]
    pub value: String,
    #[serde(default, alias = "token_id", deserialize_with = "optional_string")]
    pub token_id: Option<String>,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub fee: String,
    #[serde(default = "status_ok", deserialize_with = "flexible_status")]
    pub status: bool,
    #[serde(default = "Utc::now", deserialize_with = "flexible_time")]
    pub timestamp: DateTime<Utc>,
}

/// Token identity attached to transfer pages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    #[serde(deserialize_with = "lenient_int")]
    pub decimals: i64,
    #[serde(alias = "total_supply", deserialize_with = "optional_string")]
    pub total_supply: Option<String>,
}

/// One token/NFT holding row from the account holdings endpoint
#[derive(Debug, Clone)]
pub struct TokenHoldingRecord {
    pub symbol: String,
    pub name: String,
    pub balance: String,
    pub decimals: i64,
}

impl TokenHoldingRecord {
    /// Extract a holding from one upstream item. Holdings come either flat
    /// or with the token identity nested under a `token` key.
    pub fn from_item(item: &Value) -> Option<Self> {
        let token = item.get("token").unwrap_or(item);
        let symbol = string_at(token, &["symbol"]).unwrap_or_default();
        let name = string_at(token, &["name"]).unwrap_or_default();
        let balance = string_at(item, &["value", "balance", "amount"])
            .unwrap_or_else(|| "0".to_string());
        let decimals = string_at(token, &["decimals"])
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(18);
        if symbol.is_empty() && name.is_empty() {
            return None;
        }
        Some(Self {
            symbol,
            name,
            balance,
            decimals,
        })
    }
}

/// First string-ish value found at any of the given keys.
fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn zero() -> String {
    "0".to_string()
}

fn status_ok() -> bool {
    true
}

/// Accept `"0x..."`, `{"hash": "0x..."}` or null; lowercased.
fn address_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    Ok(raw.to_lowercase())
}

/// Accept a decimal string, a JSON number, or null (treated as zero).
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => s,
        Value::Number(n) => n.to_string(),
        _ => "0".to_string(),
    })
}

/// Accept a string or number as an optional string.
fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept an integer, a numeric string, or null.
fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse::<i64>().unwrap_or(0),
        _ => 0,
    })
}

/// Accept `true`, `"ok"`, `"success"`, `"1"` or `1` as success.
fn flexible_status<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(
            s.to_ascii_lowercase().as_str(),
            "ok" | "success" | "1" | "true"
        ),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// Accept an RFC 3339 string or a unix timestamp (seconds or milliseconds).
fn flexible_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n.as_i64().and_then(|raw| {
            // Values too large for a seconds clock are milliseconds
            let secs = if raw > 1_000_000_000_000 { raw / 1000 } else { raw };
            Utc.timestamp_opt(secs, 0).single()
        }),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(Utc::now))
}
