//! Incremental wallet analysis.
//!
//! A wallet cycle pulls four sources: native balance, ERC-20 holdings,
//! ERC-721 holdings and the transactions page. Only the native balance is
//! load-bearing; every other source degrades the snapshot's data quality
//! instead of failing the cycle. Transaction processing is incremental
//! against the prior snapshot's processed hashes.

use alloy_primitives::U256;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::errors::AnalyzerError;
use crate::domain::models::{
    Alert, AlertSeverity, AnalysisMetadata, DataQuality, Network, NftHoldingSummary,
    SnapshotDraft, TokenHoldingSummary, WalletJobPayload, WalletMetrics,
};
use crate::domain::services::analysis::{
    alert_risk_contribution, cap_risk_score, parse_amount, truncate_oldest,
    validate_entity_address,
};
use crate::domain::services::service_log::ServiceLogSink;
use crate::domain::services::{prices, signatures};
use crate::infrastructure::feed::{FeedClient, FeedError, TokenHoldingRecord, TransactionRecord};
use crate::infrastructure::persistence::entities::wallet_snapshots;
use crate::infrastructure::persistence::repositories::WalletSnapshotRepository;

const PROCESSED_HASHES_CAP: usize = 1000;

/// Batch value above which a transaction counts as large for risk scoring
const LARGE_TX_WEI: &str = "100000000000000000000";
/// Value above which a single transaction raises a LARGE_TRANSACTION alert
const ALERT_TX_WEI: &str = "1000000000000000000000";
/// Batch fee total above which gas usage is alert-worthy (1 native coin)
const HIGH_GAS_COST_WEI: &str = "1000000000000000000";
/// Calldata length counting as large for suspicious execute detection
const LARGE_CALLDATA_LEN: usize = 1000;

/// Inputs of one wallet cycle. A None source was unavailable upstream.
#[derive(Debug, Default)]
pub struct WalletAnalysisInputs {
    pub native_balance: String,
    pub token_holdings: Option<Vec<TokenHoldingRecord>>,
    pub nft_holdings: Option<Vec<TokenHoldingRecord>>,
    pub transactions: Option<Vec<TransactionRecord>>,
}

/// Result of one merge cycle before persistence
#[derive(Debug)]
pub struct WalletOutcome {
    pub metrics: WalletMetrics,
    pub alerts: Vec<Alert>,
    pub risk_score: i32,
    pub metadata: AnalysisMetadata,
}

/// Analyzer for `wallet_snapshot` jobs
pub struct WalletAnalyzer {
    feed: Arc<FeedClient>,
    repository: WalletSnapshotRepository,
}

impl WalletAnalyzer {
    pub fn new(feed: Arc<FeedClient>, repository: WalletSnapshotRepository) -> Self {
        Self { feed, repository }
    }

    /// Run one analysis cycle. Returns the appended snapshot, or None when
    /// nothing new arrived and the prior snapshot stays authoritative.
    pub async fn analyze(
        &self,
        payload: &WalletJobPayload,
        network: Network,
        sink: &ServiceLogSink,
    ) -> Result<Option<wallet_snapshots::Model>, AnalyzerError> {
        let address = validate_entity_address(&payload.wallet)?;
        sink.info(format!(
            "Starting wallet snapshot for {} on {}",
            address, network
        ));

        // Native balance is the one source the cycle cannot run without
        let native_balance = match self.feed.fetch_native_balance(&address, network).await {
            Ok(balance) => balance,
            Err(FeedError::NotFound { status, .. }) => {
                sink.error(format!("Wallet {} unknown upstream", address));
                return Err(AnalyzerError::WalletNotFound { address, status });
            }
            Err(e) => {
                sink.error(format!("Native balance unavailable: {}", e));
                return Err(AnalyzerError::UpstreamUnavailable(format!(
                    "native balance unavailable for {}",
                    address
                )));
            }
        };

        let transactions = match self.feed.fetch_wallet_transactions(&address, network).await {
            Ok(page) if page.quality == DataQuality::ServiceUnavailable => {
                sink.warn("Transactions feed unavailable; proceeding with partial data");
                None
            }
            Ok(page) => Some(page.items),
            Err(FeedError::NotFound { status, .. }) => {
                sink.error(format!("Wallet {} unknown to transaction endpoints", address));
                return Err(AnalyzerError::WalletNotFound { address, status });
            }
            Err(e) => {
                sink.warn(format!("Transactions fetch failed: {}", e));
                None
            }
        };

        let token_holdings = match self.feed.fetch_token_holdings(&address, network).await {
            Ok(holdings) => Some(holdings),
            Err(e) => {
                sink.warn(format!("Token holdings unavailable: {}", e));
                None
            }
        };

        let nft_holdings = match self.feed.fetch_nft_holdings(&address, network).await {
            Ok(holdings) => Some(holdings),
            Err(e) => {
                sink.warn(format!("NFT holdings unavailable: {}", e));
                None
            }
        };

        let inputs = WalletAnalysisInputs {
            native_balance,
            token_holdings,
            nft_holdings,
            transactions,
        };

        let prior_model = self.repository.latest(&address, network.as_str()).await?;
        let prior_metrics: Option<WalletMetrics> = prior_model
            .as_ref()
            .map(|m| serde_json::from_value(m.metrics.clone()).unwrap_or_default());

        let outcome = merge_wallet_snapshot(&address, prior_metrics.as_ref(), &inputs);

        let Some(outcome) = outcome else {
            sink.info("No new transactions; previous snapshot remains current");
            return Ok(None);
        };

        sink.info(format!(
            "Merged {} new transactions, portfolio ${:.2}, risk score {}",
            outcome.metadata.new_items_processed,
            outcome.metrics.portfolio_value_usd,
            outcome.risk_score
        ));

        let draft = SnapshotDraft {
            entity_address: address,
            network,
            timestamp: Utc::now(),
            alerts: outcome.alerts,
            risk_score: outcome.risk_score,
            analysis_metadata: outcome.metadata,
            metrics: serde_json::to_value(&outcome.metrics).unwrap_or_default(),
        };

        let model = self.repository.append(draft).await?;
        Ok(Some(model))
    }
}

/// Merge one wallet cycle into the prior cumulative metrics.
pub fn merge_wallet_snapshot(
    wallet: &str,
    prior: Option<&WalletMetrics>,
    inputs: &WalletAnalysisInputs,
) -> Option<WalletOutcome> {
    let page: &[TransactionRecord] = inputs.transactions.as_deref().unwrap_or(&[]);

    let prior_hashes: HashSet<&str> = prior
        .map(|m| m.processed_transaction_hashes.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let new_items: Vec<&TransactionRecord> = page
        .iter()
        .filter(|t| !prior_hashes.contains(t.hash.as_str()))
        .collect();

    if new_items.is_empty() && prior.is_some() {
        return None;
    }

    let mut metrics = prior.cloned().unwrap_or_default();
    let wallet = wallet.to_lowercase();

    let mut incoming = parse_amount(&metrics.incoming_value);
    let mut outgoing = parse_amount(&metrics.outgoing_value);
    let mut fees = parse_amount(&metrics.total_fees);
    let mut gas = parse_amount(&metrics.total_gas_used);

    let large_tx_bar = parse_amount(LARGE_TX_WEI);
    let alert_tx_bar = parse_amount(ALERT_TX_WEI);

    // Batch trackers feeding alerts and risk scoring
    let mut batch_fees = U256::ZERO;
    let mut batch_gas = U256::ZERO;
    let mut batch_successes = 0u64;
    let mut batch_failures = 0u64;
    let mut batch_large = 0u64;
    let mut batch_zero_value_calls = 0u64;
    let mut batch_suspicious_executes = 0u64;
    let mut batch_max_value = U256::ZERO;

    for tx in &new_items {
        metrics.processed_transaction_hashes.push(tx.hash.clone());

        // Failed transactions touch nothing but the failure counter
        if !tx.status {
            metrics.failed_transactions += 1;
            batch_failures += 1;
            continue;
        }

        metrics.successful_transactions += 1;
        batch_successes += 1;

        let category = signatures::categorize_transaction(&tx.data, tx.tx_type);
        *metrics
            .transaction_categories
            .entry(category.to_string())
            .or_default() += 1;

        let value = parse_amount(&tx.value);
        batch_max_value = batch_max_value.max(value);
        if value > large_tx_bar {
            batch_large += 1;
        }
        if value.is_zero() && category != signatures::NATIVE_TRANSFER {
            batch_zero_value_calls += 1;
            if category == signatures::ROUTER_EXECUTE && tx.data.len() > LARGE_CALLDATA_LEN {
                batch_suspicious_executes += 1;
            }
        }

        if tx.to == wallet {
            incoming = incoming.saturating_add(value);
        }
        if tx.from == wallet {
            outgoing = outgoing.saturating_add(value);

            let fee = parse_amount(&tx.fee);
            let gas_used = parse_amount(&tx.gas_used);
            fees = fees.saturating_add(fee);
            gas = gas.saturating_add(gas_used);
            batch_fees = batch_fees.saturating_add(fee);
            batch_gas = batch_gas.saturating_add(gas_used);

            if tx.tx_type == 2 && !tx.to.is_empty() {
                metrics.unique_contracts.insert(tx.to.clone());
            }
        }

        let activity = Some(tx.timestamp);
        if activity > metrics.last_activity_time {
            metrics.last_activity_time = activity;
        }
    }

    metrics.incoming_value = incoming.to_string();
    metrics.outgoing_value = outgoing.to_string();
    metrics.total_fees = fees.to_string();
    metrics.total_gas_used = gas.to_string();
    metrics.avg_gas_per_tx = if metrics.successful_transactions > 0 {
        gas.checked_div(U256::from(metrics.successful_transactions))
            .map(|avg| u64::try_from(avg).unwrap_or(u64::MAX))
            .unwrap_or(0)
    } else {
        0
    };

    truncate_oldest(&mut metrics.processed_transaction_hashes, PROCESSED_HASHES_CAP);

    // Holdings and balance are refreshed from the latest pages; a missing
    // source keeps the prior values
    metrics.native_balance = inputs.native_balance.clone();
    if let Some(holdings) = &inputs.token_holdings {
        metrics.token_holdings = holdings
            .iter()
            .map(|h| TokenHoldingSummary {
                symbol: h.symbol.clone(),
                name: h.name.clone(),
                balance: h.balance.clone(),
                decimals: h.decimals.clamp(0, u8::MAX as i64) as u8,
                usd_value: prices::holding_usd(
                    parse_amount(&h.balance),
                    h.decimals.clamp(0, 76) as u32,
                    &h.symbol,
                ),
            })
            .collect();
    }
    if let Some(holdings) = &inputs.nft_holdings {
        metrics.nft_holdings = holdings
            .iter()
            .map(|h| NftHoldingSummary {
                symbol: h.symbol.clone(),
                name: h.name.clone(),
                balance: h.balance.clone(),
            })
            .collect();
    }

    let prior_portfolio = prior.map(|m| m.portfolio_value_usd).unwrap_or(0.0);
    metrics.portfolio_value_usd = prices::native_usd(parse_amount(&metrics.native_balance))
        + metrics
            .token_holdings
            .iter()
            .map(|h| h.usd_value)
            .sum::<f64>();

    let alerts = wallet_alerts(
        &metrics,
        batch_max_value,
        alert_tx_bar,
        batch_fees,
        batch_suspicious_executes,
        prior.is_some(),
        prior_portfolio,
    );

    let batch_total = batch_successes + batch_failures;
    let mut contributions = alert_risk_contribution(&alerts);
    if batch_total > 50 {
        contributions += 1;
    }
    if batch_large > 5 {
        contributions += 1;
    }
    if metrics.unique_contracts.len() > 20 {
        contributions += 1;
    }
    let batch_avg_gas = if batch_successes > 0 {
        batch_gas
            .checked_div(U256::from(batch_successes))
            .map(|avg| u64::try_from(avg).unwrap_or(u64::MAX))
            .unwrap_or(0)
    } else {
        0
    };
    if batch_avg_gas > 200_000 {
        contributions += 1;
    }
    if batch_total > 0 && batch_failures * 10 > batch_total {
        contributions += 1;
    }
    if batch_total > 0 && batch_zero_value_calls * 2 > batch_total {
        contributions += 1;
    }

    let quality = if inputs.transactions.is_none() {
        DataQuality::ServiceUnavailable
    } else if inputs.token_holdings.is_none() || inputs.nft_holdings.is_none() {
        DataQuality::Partial
    } else {
        DataQuality::Complete
    };

    Some(WalletOutcome {
        metadata: AnalysisMetadata {
            items_fetched: page.len() as u64,
            new_items_processed: new_items.len() as u64,
            total_processed: metrics.processed_transaction_hashes.len() as u64,
            data_quality: quality,
        },
        risk_score: cap_risk_score(contributions),
        alerts,
        metrics,
    })
}

fn wallet_alerts(
    metrics: &WalletMetrics,
    batch_max_value: U256,
    alert_tx_bar: U256,
    batch_fees: U256,
    batch_suspicious_executes: u64,
    has_prior: bool,
    prior_portfolio: f64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if batch_max_value > alert_tx_bar {
        alerts.push(Alert::new(
            "LARGE_TRANSACTION",
            AlertSeverity::High,
            "Transaction above the large-value threshold observed",
            serde_json::json!({"value": batch_max_value.to_string()}),
        ));
    }

    if batch_fees > parse_amount(HIGH_GAS_COST_WEI) {
        alerts.push(Alert::new(
            "HIGH_GAS_USAGE",
            AlertSeverity::Medium,
            "Gas spend this cycle exceeded one native coin",
            serde_json::json!({"totalFees": batch_fees.to_string()}),
        ));
    }

    if metrics.unique_contracts.len() > 10 {
        alerts.push(Alert::new(
            "MULTIPLE_CONTRACT_INTERACTIONS",
            AlertSeverity::Medium,
            format!(
                "Wallet has interacted with {} distinct contracts",
                metrics.unique_contracts.len()
            ),
            serde_json::json!({"uniqueContracts": metrics.unique_contracts.len()}),
        ));
    }

    if has_prior && prior_portfolio > 0.0 {
        let delta = metrics.portfolio_value_usd - prior_portfolio;
        let change_pct = (delta / prior_portfolio) * 100.0;
        if change_pct.abs() > 20.0 {
            let severity = if delta < 0.0 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            alerts.push(Alert::new(
                "PORTFOLIO_VALUE_CHANGE",
                severity,
                format!("Portfolio value changed {:.1}% since last snapshot", change_pct),
                serde_json::json!({
                    "previousUsd": prior_portfolio,
                    "currentUsd": metrics.portfolio_value_usd,
                    "changePercent": change_pct,
                }),
            ));
        }
    }

    if batch_suspicious_executes > 10 {
        alerts.push(Alert::new(
            "SUSPICIOUS_ACTIVITY",
            AlertSeverity::High,
            format!(
                "{} zero-value execute calls with large calldata this cycle",
                batch_suspicious_executes
            ),
            serde_json::json!({"count": batch_suspicious_executes}),
        ));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const WALLET: &str = "0x00000000000000000000000000000000000000ab";

    fn tx(hash: &str, from: &str, to: &str, value: &str, data: &str, ok: bool) -> TransactionRecord {
        serde_json::from_value(serde_json::json!({
            "hash": hash,
            "from": from,
            "to": to,
            "value": value,
            "input": data,
            "type": 2,
            "status": ok,
            "gasUsed": "21000",
            "fee": "315000000000",
            "timestamp": (Utc::now() - Duration::seconds(120)).to_rfc3339(),
        }))
        .unwrap()
    }

    fn inputs(transactions: Vec<TransactionRecord>) -> WalletAnalysisInputs {
        WalletAnalysisInputs {
            native_balance: "5000000000000000000".to_string(),
            token_holdings: Some(Vec::new()),
            nft_holdings: Some(Vec::new()),
            transactions: Some(transactions),
        }
    }

    #[test]
    fn test_directional_sums_and_contracts() {
        let page = vec![
            tx("0x1", WALLET, "0xcontract00000000000000000000000000000001", "1000", "0xa9059cbb00", true),
            tx("0x2", "0xpeer", WALLET, "2500", "", true),
        ];

        let outcome = merge_wallet_snapshot(WALLET, None, &inputs(page)).unwrap();
        assert_eq!(outcome.metrics.outgoing_value, "1000");
        assert_eq!(outcome.metrics.incoming_value, "2500");
        assert_eq!(outcome.metrics.successful_transactions, 2);
        assert!(outcome
            .metrics
            .unique_contracts
            .contains("0xcontract00000000000000000000000000000001"));
        assert_eq!(outcome.metrics.transaction_categories["ERC20_TRANSFER"], 1);
        // Fees accumulate only on the outgoing transaction
        assert_eq!(outcome.metrics.total_fees, "315000000000");
    }

    #[test]
    fn test_failed_transactions_only_count_failures() {
        let page = vec![tx("0x1", WALLET, "0xc", "999", "0xa9059cbb", false)];

        let outcome = merge_wallet_snapshot(WALLET, None, &inputs(page)).unwrap();
        assert_eq!(outcome.metrics.failed_transactions, 1);
        assert_eq!(outcome.metrics.successful_transactions, 0);
        assert_eq!(outcome.metrics.outgoing_value, "0");
        assert!(outcome.metrics.transaction_categories.is_empty());
        // Failed hashes are still deduplicated
        assert_eq!(outcome.metrics.processed_transaction_hashes.len(), 1);
    }

    #[test]
    fn test_no_new_transactions_short_circuits() {
        let page = vec![tx("0x1", WALLET, "0xc", "1", "", true)];
        let first = merge_wallet_snapshot(WALLET, None, &inputs(page.clone())).unwrap();
        let again = merge_wallet_snapshot(WALLET, Some(&first.metrics), &inputs(page));
        assert!(again.is_none());
    }

    #[test]
    fn test_large_transaction_alert() {
        // Above 10^21
        let page = vec![tx("0x1", "0xpeer", WALLET, "2000000000000000000000", "", true)];

        let outcome = merge_wallet_snapshot(WALLET, None, &inputs(page)).unwrap();
        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == "LARGE_TRANSACTION")
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        assert!(outcome.risk_score >= 3);
    }

    #[test]
    fn test_portfolio_drop_is_high_severity() {
        let mut prior = WalletMetrics::default();
        prior.portfolio_value_usd = 100.0;
        prior.processed_transaction_hashes = vec!["0xold".to_string()];

        // Fresh balance of 5 SEI at 0.42 is a collapse from $100
        let page = vec![tx("0xnew", "0xpeer", WALLET, "1", "", true)];
        let outcome =
            merge_wallet_snapshot(WALLET, Some(&prior), &inputs(page)).unwrap();

        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == "PORTFOLIO_VALUE_CHANGE")
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
    }

    #[test]
    fn test_quality_degrades_per_missing_source() {
        let mut no_tx = inputs(Vec::new());
        no_tx.transactions = None;
        let outcome = merge_wallet_snapshot(WALLET, None, &no_tx).unwrap();
        assert_eq!(
            outcome.metadata.data_quality,
            DataQuality::ServiceUnavailable
        );

        let mut no_holdings = inputs(vec![tx("0x1", WALLET, "0xc", "1", "", true)]);
        no_holdings.token_holdings = None;
        let outcome = merge_wallet_snapshot(WALLET, None, &no_holdings).unwrap();
        assert_eq!(outcome.metadata.data_quality, DataQuality::Partial);

        let complete = inputs(vec![tx("0x2", WALLET, "0xc", "1", "", true)]);
        let outcome = merge_wallet_snapshot(WALLET, None, &complete).unwrap();
        assert_eq!(outcome.metadata.data_quality, DataQuality::Complete);
    }

    #[test]
    fn test_risk_score_stays_in_range() {
        // A pathological batch: many failures, zero-value calls, contracts
        let mut page = Vec::new();
        for i in 0..60 {
            let mut record = tx(
                &format!("0x{}", i),
                WALLET,
                &format!("0xc{:038x}", i),
                "0",
                "0x3593564c00",
                i % 3 != 0,
            );
            record.data = format!("0x3593564c{}", "00".repeat(600));
            page.push(record);
        }

        let outcome = merge_wallet_snapshot(WALLET, None, &inputs(page)).unwrap();
        assert!(outcome.risk_score >= 1 && outcome.risk_score <= 10);
    }
}
