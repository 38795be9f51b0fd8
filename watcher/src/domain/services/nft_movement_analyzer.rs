//! Incremental NFT-movement analysis.
//!
//! Tracks per-token ownership, mint/burn/transfer histories and trader
//! activity for a collection, cycle over cycle. The holder map keeps the
//! zero address on burns so a later mint of the same token id is
//! recognized; holder statistics always exclude it.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::domain::errors::AnalyzerError;
use crate::domain::models::job::NftMovementThresholds;
use crate::domain::models::{
    Alert, AlertSeverity, AnalysisMetadata, CountWindows, DataQuality, HolderCount, Network,
    NftMovementJobPayload, NftMovementMetrics, NftTransferSummary, SnapshotDraft, TraderActivity,
};
use crate::domain::services::analysis::{
    alert_risk_contribution, cap_risk_score, count_growth_exceeds, parse_amount, truncate_oldest,
    validate_entity_address, within_window, DAY_SECS, HOUR_SECS, SIX_HOURS_SECS, ZERO_ADDRESS,
};
use crate::domain::services::service_log::ServiceLogSink;
use crate::infrastructure::feed::{FeedClient, TransferRecord};
use crate::infrastructure::persistence::entities::nft_movement_snapshots;
use crate::infrastructure::persistence::repositories::NftMovementSnapshotRepository;

/// Bounded-window sizes of NFT-movement snapshots
const TRANSFER_HISTORY_CAP: usize = 1000;
const MINTS_CAP: usize = 500;
const BURNS_CAP: usize = 500;
const PROCESSED_HASHES_CAP: usize = 2000;
const TOP_LIST_LEN: usize = 10;

/// Fee bucket boundaries in wei: below 0.001 native is low, below 0.01 is
/// medium, anything above is high.
const FEE_LOW_MAX_WEI: u128 = 1_000_000_000_000_000;
const FEE_MEDIUM_MAX_WEI: u128 = 10_000_000_000_000_000;

/// Result of one merge cycle before persistence
#[derive(Debug)]
pub struct NftMovementOutcome {
    pub metrics: NftMovementMetrics,
    pub alerts: Vec<Alert>,
    pub risk_score: i32,
    pub metadata: AnalysisMetadata,
}

/// Analyzer for `analyze_nft_movements` jobs
pub struct NftMovementAnalyzer {
    feed: Arc<FeedClient>,
    repository: NftMovementSnapshotRepository,
}

impl NftMovementAnalyzer {
    pub fn new(feed: Arc<FeedClient>, repository: NftMovementSnapshotRepository) -> Self {
        Self { feed, repository }
    }

    /// Run one analysis cycle. Returns the appended snapshot, or None when
    /// nothing new arrived and the prior snapshot stays authoritative.
    pub async fn analyze(
        &self,
        payload: &NftMovementJobPayload,
        network: Network,
        sink: &ServiceLogSink,
    ) -> Result<Option<nft_movement_snapshots::Model>, AnalyzerError> {
        let address = validate_entity_address(&payload.collection_address)?;
        sink.info(format!(
            "Starting NFT-movement analysis for {} on {}",
            address, network
        ));

        let page = self.feed.fetch_nft_transfers(&address, network).await?;
        if page.quality == DataQuality::ServiceUnavailable {
            sink.error("NFT transfer feed unavailable on all endpoints");
            return Err(AnalyzerError::UpstreamUnavailable(format!(
                "nft transfer feed unavailable for {}",
                address
            )));
        }

        let prior_model = self.repository.latest(&address, network.as_str()).await?;
        let prior_metrics: Option<NftMovementMetrics> = prior_model
            .as_ref()
            .map(|m| serde_json::from_value(m.metrics.clone()).unwrap_or_default());

        let outcome = merge_nft_movements(
            prior_metrics.as_ref(),
            &page.items,
            page.token_info.is_some(),
            &payload.thresholds,
            &payload.watched_addresses,
            Utc::now(),
        );

        let Some(outcome) = outcome else {
            sink.info("No new NFT transfers; previous snapshot remains current");
            return Ok(None);
        };

        sink.info(format!(
            "Merged {} new NFT transfers, {} alerts, risk score {}",
            outcome.metadata.new_items_processed,
            outcome.alerts.len(),
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

/// Merge an NFT transfer page into the prior cumulative metrics.
pub fn merge_nft_movements(
    prior: Option<&NftMovementMetrics>,
    page: &[TransferRecord],
    collection_resolved: bool,
    thresholds: &NftMovementThresholds,
    watched_addresses: &[String],
    now: DateTime<Utc>,
) -> Option<NftMovementOutcome> {
    let successful: Vec<&TransferRecord> = page.iter().filter(|t| t.status).collect();

    let prior_hashes: HashSet<&str> = prior
        .map(|m| m.processed_transaction_hashes.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let new_items: Vec<&TransferRecord> = successful
        .iter()
        .filter(|t| !prior_hashes.contains(t.hash.as_str()))
        .copied()
        .collect();

    if new_items.is_empty() {
        if prior.is_some() {
            return None;
        }
        if !collection_resolved {
            return None;
        }
    }

    let mut metrics = prior.cloned().unwrap_or_default();
    let watched: HashSet<String> = watched_addresses.iter().map(|a| a.to_lowercase()).collect();
    let mut watched_hits: Vec<&TransferRecord> = Vec::new();

    for transfer in &new_items {
        let token_id = transfer.token_id.clone().unwrap_or_default();
        let summary = NftTransferSummary {
            hash: transfer.hash.clone(),
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            token_id: token_id.clone(),
            timestamp: transfer.timestamp,
        };

        // Most recent transfer wins ownership of the token id, burns
        // included.
        if !token_id.is_empty() && !transfer.to.is_empty() {
            metrics
                .current_holders
                .insert(token_id.clone(), transfer.to.clone());
        }
        if !transfer.to.is_empty() && transfer.to != ZERO_ADDRESS {
            metrics.unique_holders.insert(transfer.to.clone());
        }

        let is_mint = transfer.from == ZERO_ADDRESS;
        let is_burn = transfer.to == ZERO_ADDRESS;
        if is_mint {
            metrics.mint_transactions.push(summary);
        } else if is_burn {
            metrics.burn_transactions.push(summary);
        } else {
            metrics.transfer_history.push(summary);
        }

        for party in [&transfer.from, &transfer.to] {
            if party.is_empty() || party == ZERO_ADDRESS {
                continue;
            }
            let stats = metrics.trader_stats.entry(party.clone()).or_default();
            stats.transfer_count += 1;
            if !token_id.is_empty() {
                stats.tokens.insert(token_id.clone());
            }
        }

        let fee = parse_amount(&transfer.fee);
        if fee <= U256::from(FEE_LOW_MAX_WEI) {
            metrics.fee_distribution.low += 1;
        } else if fee <= U256::from(FEE_MEDIUM_MAX_WEI) {
            metrics.fee_distribution.medium += 1;
        } else {
            metrics.fee_distribution.high += 1;
        }

        if watched.contains(&transfer.from) || watched.contains(&transfer.to) {
            watched_hits.push(transfer);
        }

        metrics.processed_transaction_hashes.push(transfer.hash.clone());
    }

    metrics.total_transfers += new_items.len() as u64;

    let prior_day_count = metrics.transfers_by_timeframe.h24;
    metrics.transfers_by_timeframe = count_windows(&successful, now);

    truncate_oldest(&mut metrics.transfer_history, TRANSFER_HISTORY_CAP);
    truncate_oldest(&mut metrics.mint_transactions, MINTS_CAP);
    truncate_oldest(&mut metrics.burn_transactions, BURNS_CAP);
    truncate_oldest(&mut metrics.processed_transaction_hashes, PROCESSED_HASHES_CAP);

    metrics.top_holders = rank_holders(&metrics.current_holders);
    metrics.most_active_traders = rank_traders(&metrics);

    let alerts = nft_movement_alerts(&metrics, &watched_hits, prior_day_count, thresholds, now);

    let risk_score = nft_risk_score(&metrics, &alerts, now);

    Some(NftMovementOutcome {
        metadata: AnalysisMetadata {
            items_fetched: page.len() as u64,
            new_items_processed: new_items.len() as u64,
            total_processed: metrics.processed_transaction_hashes.len() as u64,
            data_quality: DataQuality::Complete,
        },
        risk_score,
        alerts,
        metrics,
    })
}

fn count_windows(successful: &[&TransferRecord], now: DateTime<Utc>) -> CountWindows {
    let mut windows = CountWindows::default();
    for transfer in successful {
        if within_window(transfer.timestamp, now, HOUR_SECS) {
            windows.h1 += 1;
        }
        if within_window(transfer.timestamp, now, SIX_HOURS_SECS) {
            windows.h6 += 1;
        }
        if within_window(transfer.timestamp, now, DAY_SECS) {
            windows.h24 += 1;
        }
    }
    windows
}

/// Token counts per holder, zero address excluded, largest first
fn rank_holders(current_holders: &BTreeMap<String, String>) -> Vec<HolderCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for holder in current_holders.values() {
        if holder != ZERO_ADDRESS && !holder.is_empty() {
            *counts.entry(holder.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<HolderCount> = counts
        .into_iter()
        .map(|(address, token_count)| HolderCount {
            address: address.to_string(),
            token_count,
        })
        .collect();
    ranked.sort_by(|a, b| b.token_count.cmp(&a.token_count));
    ranked.truncate(TOP_LIST_LEN);
    ranked
}

fn rank_traders(metrics: &NftMovementMetrics) -> Vec<TraderActivity> {
    let mut ranked: Vec<TraderActivity> = metrics
        .trader_stats
        .iter()
        .map(|(address, stats)| TraderActivity {
            address: address.clone(),
            transfer_count: stats.transfer_count,
            distinct_tokens: stats.tokens.len() as u64,
        })
        .collect();
    ranked.sort_by(|a, b| b.transfer_count.cmp(&a.transfer_count));
    ranked.truncate(TOP_LIST_LEN);
    ranked
}

fn nft_movement_alerts(
    metrics: &NftMovementMetrics,
    watched_hits: &[&TransferRecord],
    prior_day_count: u64,
    thresholds: &NftMovementThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if metrics.transfers_by_timeframe.h1 > thresholds.mass_transfer_count {
        alerts.push(Alert::new(
            "MASS_TRANSFER",
            AlertSeverity::High,
            format!(
                "{} transfers in the last hour (threshold {})",
                metrics.transfers_by_timeframe.h1, thresholds.mass_transfer_count
            ),
            serde_json::json!({"lastHour": metrics.transfers_by_timeframe.h1}),
        ));
    }

    if let Some(whale) = metrics
        .top_holders
        .iter()
        .find(|h| h.token_count >= thresholds.whale_token_count)
    {
        alerts.push(Alert::new(
            "WHALE_ACCUMULATION",
            AlertSeverity::Medium,
            format!(
                "Holder {} has accumulated {} tokens",
                whale.address, whale.token_count
            ),
            serde_json::json!({"address": whale.address, "tokenCount": whale.token_count}),
        ));
    }

    let recent_mints = metrics
        .mint_transactions
        .iter()
        .filter(|m| within_window(m.timestamp, now, HOUR_SECS))
        .count() as u64;
    if recent_mints > thresholds.suspicious_mint_rate {
        alerts.push(Alert::new(
            "SUSPICIOUS_MINTING",
            AlertSeverity::High,
            format!(
                "{} mints in the last hour (threshold {})",
                recent_mints, thresholds.suspicious_mint_rate
            ),
            serde_json::json!({"lastHour": recent_mints}),
        ));
    }

    if count_growth_exceeds(
        metrics.transfers_by_timeframe.h24,
        prior_day_count,
        thresholds.high_activity_spike,
    ) {
        alerts.push(Alert::new(
            "HIGH_ACTIVITY_SPIKE",
            AlertSeverity::Medium,
            format!(
                "24h transfer count grew more than {}% since the previous snapshot",
                thresholds.high_activity_spike
            ),
            serde_json::json!({
                "current24h": metrics.transfers_by_timeframe.h24,
                "previous24h": prior_day_count,
            }),
        ));
    }

    if let Some((address, stats)) = metrics
        .trader_stats
        .iter()
        .find(|(_, stats)| stats.transfer_count > 20 && stats.tokens.len() < 3)
    {
        alerts.push(Alert::new(
            "WASH_TRADING",
            AlertSeverity::Medium,
            format!(
                "Address {} made {} transfers over only {} token(s)",
                address,
                stats.transfer_count,
                stats.tokens.len()
            ),
            serde_json::json!({
                "address": address,
                "transferCount": stats.transfer_count,
                "distinctTokens": stats.tokens.len(),
            }),
        ));
    }

    if let Some(hit) = watched_hits.first() {
        alerts.push(Alert::new(
            "WATCHED_WALLET_ACTIVITY",
            AlertSeverity::Low,
            format!("Watched address seen in {} new transfer(s)", watched_hits.len()),
            serde_json::json!({
                "count": watched_hits.len(),
                "hash": hit.hash,
                "from": hit.from,
                "to": hit.to,
            }),
        ));
    }

    alerts
}

fn nft_risk_score(metrics: &NftMovementMetrics, alerts: &[Alert], now: DateTime<Utc>) -> i32 {
    let mut contributions = alert_risk_contribution(alerts);

    // Hourly transfer density tiers
    let hourly = metrics.transfers_by_timeframe.h1;
    contributions += match hourly {
        0..=4 => 0,
        5..=19 => 1,
        20..=49 => 2,
        _ => 3,
    };

    // Concentration of the top holder among held tokens
    let held_tokens: u64 = metrics
        .current_holders
        .values()
        .filter(|h| *h != ZERO_ADDRESS && !h.is_empty())
        .count() as u64;
    if let Some(top) = metrics.top_holders.first() {
        if held_tokens > 0 {
            if top.token_count * 100 >= held_tokens * 50 {
                contributions += 2;
            } else if top.token_count * 100 >= held_tokens * 25 {
                contributions += 1;
            }
        }
    }

    // Recent mint volume
    let mints_24h = metrics
        .mint_transactions
        .iter()
        .filter(|m| within_window(m.timestamp, now, DAY_SECS))
        .count();
    if mints_24h > 100 {
        contributions += 2;
    } else if mints_24h > 50 {
        contributions += 1;
    }

    // Flipping: one trader churning more than 20 transfers
    if metrics
        .most_active_traders
        .first()
        .map(|t| t.transfer_count > 20)
        .unwrap_or(false)
    {
        contributions += 1;
    }

    cap_risk_score(contributions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn nft_transfer(
        hash: &str,
        from: &str,
        to: &str,
        token_id: &str,
        age_secs: i64,
    ) -> TransferRecord {
        serde_json::from_value(serde_json::json!({
            "hash": hash,
            "from": from,
            "to": to,
            "tokenId": token_id,
            "value": "1",
            "fee": "500000000000000",
            "status": true,
            "timestamp": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
        }))
        .unwrap()
    }

    fn thresholds() -> NftMovementThresholds {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }

    #[test]
    fn test_holder_tracking_follows_latest_transfer() {
        let page = vec![
            nft_transfer("0x1", ZERO_ADDRESS, "0xalice", "1", 300),
            nft_transfer("0x2", "0xalice", "0xbob", "1", 200),
            nft_transfer("0x3", ZERO_ADDRESS, "0xalice", "2", 100),
        ];

        let outcome =
            merge_nft_movements(None, &page, true, &thresholds(), &[], Utc::now()).unwrap();

        assert_eq!(outcome.metrics.current_holders["1"], "0xbob");
        assert_eq!(outcome.metrics.current_holders["2"], "0xalice");
        assert!(outcome.metrics.unique_holders.contains("0xalice"));
        assert!(outcome.metrics.unique_holders.contains("0xbob"));
        assert_eq!(outcome.metrics.mint_transactions.len(), 2);
        assert_eq!(outcome.metrics.transfer_history.len(), 1);
    }

    #[test]
    fn test_burn_keeps_token_id_under_zero_address() {
        let page = vec![
            nft_transfer("0x1", ZERO_ADDRESS, "0xalice", "7", 300),
            nft_transfer("0x2", "0xalice", ZERO_ADDRESS, "7", 100),
        ];

        let outcome =
            merge_nft_movements(None, &page, true, &thresholds(), &[], Utc::now()).unwrap();

        assert_eq!(outcome.metrics.current_holders["7"], ZERO_ADDRESS);
        assert_eq!(outcome.metrics.burn_transactions.len(), 1);
        // Burned tokens do not count toward holder stats
        assert!(outcome
            .metrics
            .top_holders
            .iter()
            .all(|h| h.address != ZERO_ADDRESS));
    }

    #[test]
    fn test_no_new_items_short_circuits() {
        let page = vec![nft_transfer("0x1", "0xa", "0xb", "1", 300)];
        let first = merge_nft_movements(None, &page, true, &thresholds(), &[], Utc::now()).unwrap();
        let again = merge_nft_movements(
            Some(&first.metrics),
            &page,
            true,
            &thresholds(),
            &[],
            Utc::now(),
        );
        assert!(again.is_none());
    }

    #[test]
    fn test_wash_trading_alert() {
        // 21 back-and-forth transfers of the same two tokens
        let page: Vec<TransferRecord> = (0..21)
            .map(|i| {
                let (from, to) = if i % 2 == 0 {
                    ("0xwasher", "0xpartner")
                } else {
                    ("0xpartner", "0xwasher")
                };
                nft_transfer(&format!("0xw{}", i), from, to, &(i % 2).to_string(), 120)
            })
            .collect();

        let outcome =
            merge_nft_movements(None, &page, true, &thresholds(), &[], Utc::now()).unwrap();
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.alert_type == "WASH_TRADING"));
    }

    #[test]
    fn test_mass_transfer_alert_and_density_risk() {
        let custom: NftMovementThresholds = serde_json::from_value(serde_json::json!({
            "massTransferCount": 10
        }))
        .unwrap();
        let page: Vec<TransferRecord> = (0..15)
            .map(|i| nft_transfer(&format!("0xm{}", i), "0xa", "0xb", &i.to_string(), 60))
            .collect();

        let outcome = merge_nft_movements(None, &page, true, &custom, &[], Utc::now()).unwrap();
        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == "MASS_TRANSFER")
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        // 15 hourly transfers land in the second density tier, plus the
        // HIGH alert contribution
        assert!(outcome.risk_score >= 3);
        assert!(outcome.risk_score <= 10);
    }

    #[test]
    fn test_whale_accumulation() {
        let custom: NftMovementThresholds = serde_json::from_value(serde_json::json!({
            "whaleTokenCount": 3
        }))
        .unwrap();
        let page: Vec<TransferRecord> = (0..4)
            .map(|i| {
                nft_transfer(&format!("0xacc{}", i), ZERO_ADDRESS, "0xwhale", &i.to_string(), 60)
            })
            .collect();

        let outcome = merge_nft_movements(None, &page, true, &custom, &[], Utc::now()).unwrap();
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.alert_type == "WHALE_ACCUMULATION"));
        assert_eq!(outcome.metrics.top_holders[0].address, "0xwhale");
        assert_eq!(outcome.metrics.top_holders[0].token_count, 4);
    }

    #[test]
    fn test_bounded_windows_hold() {
        let mut prior = NftMovementMetrics::default();
        prior.processed_transaction_hashes = (0..1990).map(|i| format!("0xold{}", i)).collect();

        let page: Vec<TransferRecord> = (0..20)
            .map(|i| nft_transfer(&format!("0xnew{}", i), "0xa", "0xb", &i.to_string(), 60))
            .collect();

        let outcome =
            merge_nft_movements(Some(&prior), &page, true, &thresholds(), &[], Utc::now())
                .unwrap();
        assert_eq!(outcome.metrics.processed_transaction_hashes.len(), 2000);
        // The newest hashes survive truncation
        assert!(outcome
            .metrics
            .processed_transaction_hashes
            .contains(&"0xnew19".to_string()));
    }
}
