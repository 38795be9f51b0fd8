use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Networks a job can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Testnet
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(format!(
                "unknown network '{}', expected mainnet, testnet or devnet",
                other
            )),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis actions a job can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    WalletSnapshot,
    AnalyzeCoinFlows,
    AnalyzeNftMovements,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::WalletSnapshot => "wallet_snapshot",
            JobAction::AnalyzeCoinFlows => "analyze_coin_flows",
            JobAction::AnalyzeNftMovements => "analyze_nft_movements",
        }
    }
}

impl FromStr for JobAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet_snapshot" => Ok(JobAction::WalletSnapshot),
            "analyze_coin_flows" => Ok(JobAction::AnalyzeCoinFlows),
            "analyze_nft_movements" => Ok(JobAction::AnalyzeNftMovements),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling modes: a scheduled job runs once at its scheduled time,
/// a retry job runs immediately and then on a fixed interval forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Scheduled,
    Retry,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scheduled => "scheduled",
            JobType::Retry => "retry",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(JobType::Scheduled),
            "retry" => Ok(JobType::Retry),
            other => Err(format!("unknown job type '{}'", other)),
        }
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Job submission request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    pub network: Option<String>,
    #[serde(rename = "type")]
    pub job_type: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub interval_minutes: Option<i64>,
}

/// Log severity levels for job log streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Which side of the engine produced a log entry: the worker itself or
/// the analyzer running inside the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Worker,
    Service,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Worker => "worker",
            LogSource::Service => "service",
        }
    }
}

impl FromStr for LogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "worker" => Ok(LogSource::Worker),
            "service" => Ok(LogSource::Service),
            other => Err(format!("unknown log source '{}'", other)),
        }
    }
}

/// A log entry to append to a job's log stream
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub function: Option<String>,
    pub duration_ms: Option<i64>,
    pub details: Option<Value>,
}

impl NewLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            function: None,
            duration_ms: None,
            details: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Last-failure snapshot stored on the job record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub message: String,
    pub stack: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorDetails {
    pub fn now(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Payload for `wallet_snapshot` jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletJobPayload {
    pub wallet: String,
}

/// Thresholds for `analyze_coin_flows` jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFlowThresholds {
    /// Raw transfer value at or above which a transfer counts as large
    #[serde(default = "default_large_transfer", deserialize_with = "string_or_number")]
    pub large_transfer: String,
    /// Percentage growth of 24h volume that triggers a volume-spike alert
    #[serde(default = "default_volume_spike", rename = "volumeSpike")]
    pub volume_spike_percent: u64,
}

impl Default for TokenFlowThresholds {
    fn default() -> Self {
        Self {
            large_transfer: default_large_transfer(),
            volume_spike_percent: default_volume_spike(),
        }
    }
}

fn default_large_transfer() -> String {
    // 1000 tokens at 18 decimals
    "1000000000000000000000".to_string()
}

fn default_volume_spike() -> u64 {
    50
}

/// Payload for `analyze_coin_flows` jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFlowJobPayload {
    pub token_address: String,
    #[serde(default)]
    pub thresholds: TokenFlowThresholds,
    #[serde(default)]
    pub watched_addresses: Vec<String>,
}

/// Thresholds for `analyze_nft_movements` jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMovementThresholds {
    /// Transfers within the last hour that count as a mass transfer
    #[serde(default = "default_mass_transfer_count")]
    pub mass_transfer_count: u64,
    /// Token count at which a single holder counts as a whale
    #[serde(default = "default_whale_token_count")]
    pub whale_token_count: u64,
    /// Mints within the last hour that count as suspicious
    #[serde(default = "default_suspicious_mint_rate")]
    pub suspicious_mint_rate: u64,
    /// Percentage growth of the 24h transfer count that triggers a spike alert
    #[serde(default = "default_high_activity_spike")]
    pub high_activity_spike: u64,
}

impl Default for NftMovementThresholds {
    fn default() -> Self {
        Self {
            mass_transfer_count: default_mass_transfer_count(),
            whale_token_count: default_whale_token_count(),
            suspicious_mint_rate: default_suspicious_mint_rate(),
            high_activity_spike: default_high_activity_spike(),
        }
    }
}

fn default_mass_transfer_count() -> u64 {
    50
}

fn default_whale_token_count() -> u64 {
    50
}

fn default_suspicious_mint_rate() -> u64 {
    10
}

fn default_high_activity_spike() -> u64 {
    100
}

/// Payload for `analyze_nft_movements` jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMovementJobPayload {
    pub collection_address: String,
    #[serde(default)]
    pub thresholds: NftMovementThresholds,
    #[serde(default)]
    pub watched_addresses: Vec<String>,
}

/// Accept a JSON number or string and normalize to a decimal string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_round_trip() {
        for name in ["mainnet", "testnet", "devnet"] {
            let network: Network = name.parse().unwrap();
            assert_eq!(network.as_str(), name);
        }
        assert!("sepolia".parse::<Network>().is_err());
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(
            "analyze_coin_flows".parse::<JobAction>().unwrap(),
            JobAction::AnalyzeCoinFlows
        );
        assert!("mine_blocks".parse::<JobAction>().is_err());
    }

    #[test]
    fn test_submit_request_deserializes_camel_case() {
        let request: SubmitJobRequest = serde_json::from_value(serde_json::json!({
            "action": "wallet_snapshot",
            "type": "retry",
            "intervalMinutes": 5,
            "payload": {"wallet": "0x1111111111111111111111111111111111111111"}
        }))
        .unwrap();
        assert_eq!(request.job_type, "retry");
        assert_eq!(request.interval_minutes, Some(5));
        assert!(request.scheduled_at.is_none());
    }

    #[test]
    fn test_token_thresholds_accept_numeric_large_transfer() {
        let payload: TokenFlowJobPayload = serde_json::from_value(serde_json::json!({
            "tokenAddress": "0x2222222222222222222222222222222222222222",
            "thresholds": {"largeTransfer": 10000, "volumeSpike": 25}
        }))
        .unwrap();
        assert_eq!(payload.thresholds.large_transfer, "10000");
        assert_eq!(payload.thresholds.volume_spike_percent, 25);
    }

    #[test]
    fn test_nft_payload_defaults() {
        let payload: NftMovementJobPayload = serde_json::from_value(serde_json::json!({
            "collectionAddress": "0x3333333333333333333333333333333333333333"
        }))
        .unwrap();
        assert_eq!(payload.thresholds.mass_transfer_count, 50);
        assert!(payload.watched_addresses.is_empty());
    }
}
