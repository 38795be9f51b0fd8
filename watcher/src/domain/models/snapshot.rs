use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::job::Network;

/// How complete the data behind a snapshot is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    Complete,
    Partial,
    Limited,
    ServiceUnavailable,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// A threshold-based alert emitted by an analysis cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

impl Alert {
    pub fn new(
        alert_type: impl Into<String>,
        severity: AlertSeverity,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Counts and quality tag describing one analysis cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// Items delivered by the upstream page this cycle
    pub items_fetched: u64,
    /// Items not seen in any prior snapshot
    pub new_items_processed: u64,
    /// Cumulative processed-hash count after this cycle
    pub total_processed: u64,
    pub data_quality: DataQuality,
}

/// A snapshot ready to be appended to its store
#[derive(Debug, Clone)]
pub struct SnapshotDraft {
    pub entity_address: String,
    pub network: Network,
    pub timestamp: DateTime<Utc>,
    pub alerts: Vec<Alert>,
    pub risk_score: i32,
    pub analysis_metadata: AnalysisMetadata,
    pub metrics: Value,
}

/// One ERC-20 holding of a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHoldingSummary {
    pub symbol: String,
    pub name: String,
    /// Raw balance as a decimal string
    pub balance: String,
    pub decimals: u8,
    pub usd_value: f64,
}

/// One ERC-721 holding of a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftHoldingSummary {
    pub symbol: String,
    pub name: String,
    pub balance: String,
}

/// Cumulative wallet metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletMetrics {
    /// Native balance in wei as a decimal string
    pub native_balance: String,
    pub token_holdings: Vec<TokenHoldingSummary>,
    pub nft_holdings: Vec<NftHoldingSummary>,
    /// Sum of incoming transfer values, decimal string
    pub incoming_value: String,
    /// Sum of outgoing transfer values, decimal string
    pub outgoing_value: String,
    /// Fees paid on outgoing successful transactions, decimal string
    pub total_fees: String,
    /// Gas used by outgoing successful transactions, decimal string
    pub total_gas_used: String,
    pub avg_gas_per_tx: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    /// Counts per method-signature category
    pub transaction_categories: BTreeMap<String, u64>,
    pub unique_contracts: BTreeSet<String>,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub portfolio_value_usd: f64,
    pub processed_transaction_hashes: Vec<String>,
}

/// One transfer kept in a bounded recent list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// Ranked address with a cumulative volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressVolume {
    pub address: String,
    pub value: String,
    pub count: u64,
}

/// Per-address cumulative send/receive activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressActivity {
    pub sent: String,
    pub received: String,
    pub count: u64,
}

/// Rolling volume windows, decimal strings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeWindows {
    pub h1: String,
    pub h6: String,
    pub h24: String,
}

/// Basic token identity carried on token-flow snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfoSummary {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Cumulative token-flow metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenFlowMetrics {
    pub total_transfers: u64,
    /// Cumulative transfer volume, decimal string
    pub total_volume: String,
    pub unique_addresses: BTreeSet<String>,
    /// Recent transfers at or above the large-transfer threshold
    pub large_transfers: Vec<TransferSummary>,
    /// Recent transfers to the zero address
    pub burn_transactions: Vec<TransferSummary>,
    pub top_senders: Vec<AddressVolume>,
    pub top_receivers: Vec<AddressVolume>,
    pub volume_by_timeframe: VolumeWindows,
    /// Cumulative per-address activity
    pub transfer_patterns: BTreeMap<String, AddressActivity>,
    pub token_info: Option<TokenInfoSummary>,
    pub processed_transaction_hashes: Vec<String>,
}

/// One NFT transfer kept in a bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransferSummary {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub token_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A holder ranked by token count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderCount {
    pub address: String,
    pub token_count: u64,
}

/// A trader ranked by cumulative transfer count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderActivity {
    pub address: String,
    pub transfer_count: u64,
    pub distinct_tokens: u64,
}

/// Cumulative per-address trading stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraderStats {
    pub transfer_count: u64,
    pub tokens: BTreeSet<String>,
}

/// Rolling transfer-count windows
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CountWindows {
    pub h1: u64,
    pub h6: u64,
    pub h24: u64,
}

/// Transfer-fee buckets
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

/// Cumulative NFT-movement metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NftMovementMetrics {
    pub total_transfers: u64,
    /// Latest observed holder per token id; the zero address is kept so a
    /// later mint of the same id is recognized as such.
    pub current_holders: BTreeMap<String, String>,
    pub unique_holders: BTreeSet<String>,
    pub transfer_history: Vec<NftTransferSummary>,
    pub mint_transactions: Vec<NftTransferSummary>,
    pub burn_transactions: Vec<NftTransferSummary>,
    pub top_holders: Vec<HolderCount>,
    pub most_active_traders: Vec<TraderActivity>,
    /// Cumulative per-address trading stats the rankings are derived from
    pub trader_stats: BTreeMap<String, TraderStats>,
    pub transfers_by_timeframe: CountWindows,
    pub fee_distribution: FeeDistribution,
    pub processed_transaction_hashes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serializes_with_type_key() {
        let alert = Alert::new(
            "LARGE_TRANSFER",
            AlertSeverity::High,
            "large transfer observed",
            serde_json::json!({"value": "50000"}),
        );
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "LARGE_TRANSFER");
        assert_eq!(value["severity"], "HIGH");
    }

    #[test]
    fn test_data_quality_wire_format() {
        assert_eq!(
            serde_json::to_value(DataQuality::ServiceUnavailable).unwrap(),
            serde_json::json!("SERVICE_UNAVAILABLE")
        );
    }

    #[test]
    fn test_metrics_round_trip_defaults() {
        let metrics = TokenFlowMetrics::default();
        let value = serde_json::to_value(&metrics).unwrap();
        let back: TokenFlowMetrics = serde_json::from_value(value).unwrap();
        assert_eq!(back.total_transfers, 0);
        assert!(back.processed_transaction_hashes.is_empty());
    }
}
