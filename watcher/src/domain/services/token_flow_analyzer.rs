//! Incremental token-flow analysis.
//!
//! Each cycle merges the latest ERC-20 transfer page into the previous
//! cumulative snapshot: dedup against processed hashes, accumulate volume
//! and per-address activity, re-rank top senders/receivers, apply the
//! alert rules, and append a new snapshot. A cycle with nothing new writes
//! nothing and reports no change.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::errors::AnalyzerError;
use crate::domain::models::job::TokenFlowThresholds;
use crate::domain::models::{
    AddressActivity, AddressVolume, Alert, AlertSeverity, AnalysisMetadata, DataQuality, Network,
    SnapshotDraft, TokenFlowJobPayload, TokenFlowMetrics, TokenInfoSummary, TransferSummary,
    VolumeWindows,
};
use crate::domain::services::analysis::{
    alert_risk_contribution, cap_risk_score, parse_amount, truncate_oldest,
    validate_entity_address, volume_growth_exceeds, within_window, DAY_SECS, HOUR_SECS,
    SIX_HOURS_SECS, ZERO_ADDRESS,
};
use crate::domain::services::service_log::ServiceLogSink;
use crate::infrastructure::feed::{FeedClient, TokenInfo, TransferRecord};
use crate::infrastructure::persistence::entities::token_flow_snapshots;
use crate::infrastructure::persistence::repositories::TokenFlowSnapshotRepository;

/// Bounded-window sizes of token-flow snapshots
const LARGE_TRANSFERS_CAP: usize = 100;
const BURNS_CAP: usize = 100;
const PROCESSED_HASHES_CAP: usize = 1000;
const TOP_LIST_LEN: usize = 10;

/// Result of one merge cycle before persistence
#[derive(Debug)]
pub struct TokenFlowOutcome {
    pub metrics: TokenFlowMetrics,
    pub alerts: Vec<Alert>,
    pub risk_score: i32,
    pub metadata: AnalysisMetadata,
}

/// Analyzer for `analyze_coin_flows` jobs
pub struct TokenFlowAnalyzer {
    feed: Arc<FeedClient>,
    repository: TokenFlowSnapshotRepository,
}

impl TokenFlowAnalyzer {
    pub fn new(feed: Arc<FeedClient>, repository: TokenFlowSnapshotRepository) -> Self {
        Self { feed, repository }
    }

    /// Run one analysis cycle. Returns the appended snapshot, or None when
    /// nothing new arrived and the prior snapshot stays authoritative.
    pub async fn analyze(
        &self,
        payload: &TokenFlowJobPayload,
        network: Network,
        sink: &ServiceLogSink,
    ) -> Result<Option<token_flow_snapshots::Model>, AnalyzerError> {
        let address = validate_entity_address(&payload.token_address)?;
        sink.info(format!(
            "Starting coin-flow analysis for {} on {}",
            address, network
        ));

        let page = self.feed.fetch_token_transfers(&address, network).await?;
        if page.quality == DataQuality::ServiceUnavailable {
            sink.error("Transfer feed unavailable on all endpoints");
            return Err(AnalyzerError::UpstreamUnavailable(format!(
                "transfer feed unavailable for {}",
                address
            )));
        }

        let prior_model = self.repository.latest(&address, network.as_str()).await?;
        let prior_metrics: Option<TokenFlowMetrics> = prior_model
            .as_ref()
            .map(|m| serde_json::from_value(m.metrics.clone()).unwrap_or_default());

        let outcome = merge_token_flows(
            prior_metrics.as_ref(),
            &page.items,
            page.token_info.as_ref(),
            &payload.thresholds,
            &payload.watched_addresses,
            Utc::now(),
        );

        let Some(outcome) = outcome else {
            sink.info("No new transfers; previous snapshot remains current");
            return Ok(None);
        };

        sink.info(format!(
            "Merged {} new transfers, {} alerts, risk score {}",
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

/// Merge a transfer page into the prior cumulative metrics.
///
/// Returns None when there is nothing to write: no new successful
/// transfers while a prior snapshot exists, or an empty first page without
/// token identity.
pub fn merge_token_flows(
    prior: Option<&TokenFlowMetrics>,
    page: &[TransferRecord],
    token_info: Option<&TokenInfo>,
    thresholds: &TokenFlowThresholds,
    watched_addresses: &[String],
    now: DateTime<Utc>,
) -> Option<TokenFlowOutcome> {
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
        // First observation: only worth writing when the token itself was
        // resolvable.
        if token_info.is_none() {
            return None;
        }
    }

    let mut metrics = prior.cloned().unwrap_or_default();
    let large_threshold = parse_amount(&thresholds.large_transfer);
    let watched: HashSet<String> = watched_addresses.iter().map(|a| a.to_lowercase()).collect();

    let mut cumulative_volume = parse_amount(&metrics.total_volume);
    let mut new_large: Vec<TransferSummary> = Vec::new();
    let mut new_burns: Vec<TransferSummary> = Vec::new();
    let mut watched_hits: Vec<&TransferRecord> = Vec::new();

    for transfer in &new_items {
        let value = parse_amount(&transfer.value);
        cumulative_volume = cumulative_volume.saturating_add(value);

        if !transfer.from.is_empty() {
            metrics.unique_addresses.insert(transfer.from.clone());
            let sender = metrics
                .transfer_patterns
                .entry(transfer.from.clone())
                .or_default();
            sender.sent = parse_amount(&sender.sent).saturating_add(value).to_string();
            sender.count += 1;
        }
        if !transfer.to.is_empty() {
            metrics.unique_addresses.insert(transfer.to.clone());
            let receiver = metrics
                .transfer_patterns
                .entry(transfer.to.clone())
                .or_default();
            receiver.received = parse_amount(&receiver.received)
                .saturating_add(value)
                .to_string();
            receiver.count += 1;
        }

        let summary = summarize(transfer);
        if value >= large_threshold && !large_threshold.is_zero() {
            new_large.push(summary.clone());
        }
        if transfer.to == ZERO_ADDRESS {
            new_burns.push(summary);
        }
        if watched.contains(&transfer.from) || watched.contains(&transfer.to) {
            watched_hits.push(transfer);
        }

        metrics.processed_transaction_hashes.push(transfer.hash.clone());
    }

    metrics.total_transfers += new_items.len() as u64;
    metrics.total_volume = cumulative_volume.to_string();
    metrics.large_transfers.extend(new_large.iter().cloned());
    metrics.burn_transactions.extend(new_burns.iter().cloned());

    // Rolling windows are recomputed from the page against wall-clock now
    let prior_day_volume = parse_amount(&metrics.volume_by_timeframe.h24);
    metrics.volume_by_timeframe = volume_windows(&successful, now);

    if let Some(info) = token_info {
        metrics.token_info = Some(TokenInfoSummary {
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            decimals: info.decimals.clamp(0, u8::MAX as i64) as u8,
        });
    }

    truncate_oldest(&mut metrics.large_transfers, LARGE_TRANSFERS_CAP);
    truncate_oldest(&mut metrics.burn_transactions, BURNS_CAP);
    truncate_oldest(&mut metrics.processed_transaction_hashes, PROCESSED_HASHES_CAP);

    metrics.top_senders = rank_by(&metrics, |activity| parse_amount(&activity.sent));
    metrics.top_receivers = rank_by(&metrics, |activity| parse_amount(&activity.received));

    let alerts = token_flow_alerts(
        &metrics,
        &new_large,
        &new_burns,
        &watched_hits,
        prior_day_volume,
        large_threshold,
        thresholds,
        now,
    );

    let mut contributions = alert_risk_contribution(&alerts);
    if new_items.len() > 50 {
        contributions += 1;
    }
    if new_large.len() > 5 {
        contributions += 1;
    }
    if !new_burns.is_empty() {
        contributions += 1;
    }

    let quality = if metrics.token_info.is_some() {
        DataQuality::Complete
    } else {
        DataQuality::Limited
    };

    Some(TokenFlowOutcome {
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

fn summarize(transfer: &TransferRecord) -> TransferSummary {
    TransferSummary {
        hash: transfer.hash.clone(),
        from: transfer.from.clone(),
        to: transfer.to.clone(),
        value: transfer.value.clone(),
        timestamp: transfer.timestamp,
    }
}

fn volume_windows(successful: &[&TransferRecord], now: DateTime<Utc>) -> VolumeWindows {
    let mut h1 = U256::ZERO;
    let mut h6 = U256::ZERO;
    let mut h24 = U256::ZERO;

    for transfer in successful {
        let value = parse_amount(&transfer.value);
        if within_window(transfer.timestamp, now, HOUR_SECS) {
            h1 = h1.saturating_add(value);
        }
        if within_window(transfer.timestamp, now, SIX_HOURS_SECS) {
            h6 = h6.saturating_add(value);
        }
        if within_window(transfer.timestamp, now, DAY_SECS) {
            h24 = h24.saturating_add(value);
        }
    }

    VolumeWindows {
        h1: h1.to_string(),
        h6: h6.to_string(),
        h24: h24.to_string(),
    }
}

/// Top addresses by a cumulative U256 measure, largest first
fn rank_by<F>(metrics: &TokenFlowMetrics, measure: F) -> Vec<AddressVolume>
where
    F: Fn(&AddressActivity) -> U256,
{
    let mut ranked: Vec<(U256, AddressVolume)> = metrics
        .transfer_patterns
        .iter()
        .filter_map(|(address, activity)| {
            let value = measure(activity);
            if value.is_zero() {
                return None;
            }
            Some((
                value,
                AddressVolume {
                    address: address.clone(),
                    value: value.to_string(),
                    count: activity.count,
                },
            ))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.truncate(TOP_LIST_LEN);
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

#[allow(clippy::too_many_arguments)]
fn token_flow_alerts(
    metrics: &TokenFlowMetrics,
    new_large: &[TransferSummary],
    new_burns: &[TransferSummary],
    watched_hits: &[&TransferRecord],
    prior_day_volume: U256,
    large_threshold: U256,
    thresholds: &TokenFlowThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let recent_large: Vec<&TransferSummary> = new_large
        .iter()
        .filter(|t| within_window(t.timestamp, now, HOUR_SECS))
        .collect();
    if let Some(largest) = recent_large
        .iter()
        .max_by_key(|t| parse_amount(&t.value))
    {
        alerts.push(Alert::new(
            "LARGE_TRANSFER",
            AlertSeverity::High,
            format!(
                "{} transfer(s) at or above the large-transfer threshold in the last hour",
                recent_large.len()
            ),
            serde_json::json!({
                "count": recent_large.len(),
                "largestValue": largest.value,
                "hash": largest.hash,
            }),
        ));
    }

    let recent_burns = new_burns
        .iter()
        .filter(|t| within_window(t.timestamp, now, HOUR_SECS))
        .count();
    if recent_burns > 0 {
        alerts.push(Alert::new(
            "BURN_DETECTED",
            AlertSeverity::Medium,
            format!("{} burn transaction(s) in the last hour", recent_burns),
            serde_json::json!({"count": recent_burns}),
        ));
    }

    if !large_threshold.is_zero() {
        let whale_bar = large_threshold.saturating_mul(U256::from(10u64));
        if let Some(whale) = metrics
            .top_senders
            .iter()
            .find(|s| parse_amount(&s.value) >= whale_bar)
        {
            alerts.push(Alert::new(
                "WHALE_MOVEMENT",
                AlertSeverity::High,
                format!(
                    "Sender {} has moved 10x the large-transfer threshold cumulatively",
                    whale.address
                ),
                serde_json::json!({"address": whale.address, "totalSent": whale.value}),
            ));
        }
    }

    let day_volume = parse_amount(&metrics.volume_by_timeframe.h24);
    if volume_growth_exceeds(day_volume, prior_day_volume, thresholds.volume_spike_percent) {
        alerts.push(Alert::new(
            "VOLUME_SPIKE",
            AlertSeverity::Medium,
            format!(
                "24h volume grew more than {}% since the previous snapshot",
                thresholds.volume_spike_percent
            ),
            serde_json::json!({
                "current24h": day_volume.to_string(),
                "previous24h": prior_day_volume.to_string(),
            }),
        ));
    }

    if let Some((address, activity)) = metrics.transfer_patterns.iter().find(|(_, activity)| {
        if activity.count <= 100 {
            return false;
        }
        let moved = parse_amount(&activity.sent).saturating_add(parse_amount(&activity.received));
        moved < U256::from(100u64).saturating_mul(U256::from(activity.count))
    }) {
        alerts.push(Alert::new(
            "SUSPICIOUS_PATTERN",
            AlertSeverity::Medium,
            format!(
                "Address {} shows high-frequency dust activity ({} transfers)",
                address, activity.count
            ),
            serde_json::json!({"address": address, "count": activity.count}),
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn transfer(hash: &str, from: &str, to: &str, value: &str, age_secs: i64) -> TransferRecord {
        serde_json::from_value(serde_json::json!({
            "hash": hash,
            "from": from,
            "to": to,
            "value": value,
            "status": true,
            "timestamp": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
        }))
        .unwrap()
    }

    fn token_info() -> TokenInfo {
        serde_json::from_value(serde_json::json!({
            "name": "Example Token", "symbol": "EXM", "decimals": 18
        }))
        .unwrap()
    }

    fn thresholds(large: &str, spike: u64) -> TokenFlowThresholds {
        serde_json::from_value(serde_json::json!({
            "largeTransfer": large, "volumeSpike": spike
        }))
        .unwrap()
    }

    #[test]
    fn test_first_cycle_with_empty_page_needs_token_info() {
        let thresholds = thresholds("10000", 50);
        assert!(merge_token_flows(None, &[], None, &thresholds, &[], Utc::now()).is_none());

        let info = token_info();
        let outcome =
            merge_token_flows(None, &[], Some(&info), &thresholds, &[], Utc::now()).unwrap();
        assert_eq!(outcome.metrics.total_transfers, 0);
        assert_eq!(outcome.metrics.token_info.as_ref().unwrap().symbol, "EXM");
    }

    #[test]
    fn test_no_new_items_short_circuits() {
        let thresholds = thresholds("10000", 50);
        let page = vec![transfer("0xh1", "0xa", "0xb", "500", 60)];
        let info = token_info();

        let first =
            merge_token_flows(None, &page, Some(&info), &thresholds, &[], Utc::now()).unwrap();
        assert_eq!(first.metrics.total_transfers, 1);

        let again = merge_token_flows(
            Some(&first.metrics),
            &page,
            Some(&info),
            &thresholds,
            &[],
            Utc::now(),
        );
        assert!(again.is_none());
    }

    #[test]
    fn test_cumulative_merge_counts_only_the_delta() {
        let thresholds = thresholds("1000000", 50);
        let info = token_info();

        let first_page: Vec<TransferRecord> = (1..=25)
            .map(|i| transfer(&format!("0xh{}", i), "0xa", "0xb", "10", 60))
            .collect();
        let first =
            merge_token_flows(None, &first_page, Some(&info), &thresholds, &[], Utc::now())
                .unwrap();
        assert_eq!(first.metrics.total_transfers, 25);

        // Second page: one new hash plus 24 already-seen ones
        let mut second_page = vec![transfer("0xh26", "0xc", "0xd", "10", 30)];
        second_page.extend(first_page.iter().take(24).cloned());

        let second = merge_token_flows(
            Some(&first.metrics),
            &second_page,
            Some(&info),
            &thresholds,
            &[],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(second.metadata.new_items_processed, 1);
        assert_eq!(second.metrics.total_transfers, 26);
        assert!(second
            .metrics
            .unique_addresses
            .is_superset(&first.metrics.unique_addresses));
    }

    #[test]
    fn test_large_transfer_alert_and_risk() {
        let thresholds = thresholds("10000", 50);
        let info = token_info();
        let page = vec![transfer("0xbig", "0xa", "0xb", "50000", 30)];

        let outcome =
            merge_token_flows(None, &page, Some(&info), &thresholds, &[], Utc::now()).unwrap();

        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == "LARGE_TRANSFER")
            .expect("expected LARGE_TRANSFER alert");
        assert_eq!(alert.severity, AlertSeverity::High);
        assert!(outcome.risk_score >= 2);
        assert_eq!(outcome.metrics.large_transfers.len(), 1);
    }

    #[test]
    fn test_burn_detection() {
        let thresholds = thresholds("1000000", 50);
        let info = token_info();
        let page = vec![transfer("0xburn", "0xa", ZERO_ADDRESS, "77", 30)];

        let outcome =
            merge_token_flows(None, &page, Some(&info), &thresholds, &[], Utc::now()).unwrap();
        assert_eq!(outcome.metrics.burn_transactions.len(), 1);
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.alert_type == "BURN_DETECTED"));
    }

    #[test]
    fn test_watched_address_alert_is_low_severity() {
        let thresholds = thresholds("1000000", 50);
        let info = token_info();
        let page = vec![transfer("0xw", "0xWatchedSender", "0xb", "5", 30)];
        let watched = vec!["0xwatchedsender".to_string()];

        let outcome =
            merge_token_flows(None, &page, Some(&info), &thresholds, &watched, Utc::now())
                .unwrap();
        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == "WATCHED_WALLET_ACTIVITY")
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Low);
    }

    #[test]
    fn test_failed_transfers_are_ignored() {
        let thresholds = thresholds("10", 50);
        let info = token_info();
        let mut failed = transfer("0xfail", "0xa", "0xb", "50000", 30);
        failed.status = false;

        let outcome =
            merge_token_flows(None, &[failed], Some(&info), &thresholds, &[], Utc::now())
                .unwrap();
        assert_eq!(outcome.metrics.total_transfers, 0);
        assert!(outcome.metrics.large_transfers.is_empty());
        assert!(outcome.metrics.processed_transaction_hashes.is_empty());
    }

    #[test]
    fn test_bounded_windows_hold() {
        let thresholds = thresholds("1", 50);
        let info = token_info();
        let page: Vec<TransferRecord> = (0..150)
            .map(|i| transfer(&format!("0xl{}", i), "0xa", "0xb", "100", 30))
            .collect();

        let outcome =
            merge_token_flows(None, &page, Some(&info), &thresholds, &[], Utc::now()).unwrap();
        assert!(outcome.metrics.large_transfers.len() <= LARGE_TRANSFERS_CAP);
        assert_eq!(outcome.metrics.total_transfers, 150);
    }

    #[test]
    fn test_top_senders_ranked_by_cumulative_volume() {
        let thresholds = thresholds("1000000", 50);
        let info = token_info();
        let page = vec![
            transfer("0x1", "0xsmall", "0xb", "10", 30),
            transfer("0x2", "0xwhale", "0xb", "90000", 30),
            transfer("0x3", "0xwhale", "0xb", "90000", 30),
            transfer("0x4", "0xmid", "0xb", "500", 30),
        ];

        let outcome =
            merge_token_flows(None, &page, Some(&info), &thresholds, &[], Utc::now()).unwrap();
        assert_eq!(outcome.metrics.top_senders[0].address, "0xwhale");
        assert_eq!(outcome.metrics.top_senders[0].value, "180000");
        assert_eq!(outcome.metrics.top_senders[0].count, 2);
    }
}
