//! Multi-cycle properties of the incremental analyzers: deduplication,
//! cumulative additivity, monotone sets, bounded windows and risk bounds.

use chrono::{Duration, Utc};
use serde_json::json;

use sei_watcher::domain::models::job::{NftMovementThresholds, TokenFlowThresholds};
use sei_watcher::domain::services::analysis::ZERO_ADDRESS;
use sei_watcher::domain::services::nft_movement_analyzer::merge_nft_movements;
use sei_watcher::domain::services::token_flow_analyzer::merge_token_flows;
use sei_watcher::domain::services::wallet_analyzer::{
    merge_wallet_snapshot, WalletAnalysisInputs,
};
use sei_watcher::infrastructure::feed::{TokenInfo, TransactionRecord, TransferRecord};

fn transfer(hash: &str, from: &str, to: &str, value: &str, age_secs: i64) -> TransferRecord {
    serde_json::from_value(json!({
        "hash": hash,
        "from": from,
        "to": to,
        "value": value,
        "status": true,
        "timestamp": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
    }))
    .unwrap()
}

fn nft_transfer(hash: &str, from: &str, to: &str, token_id: &str) -> TransferRecord {
    serde_json::from_value(json!({
        "hash": hash,
        "from": from,
        "to": to,
        "tokenId": token_id,
        "value": "1",
        "fee": "400000000000000",
        "status": true,
        "timestamp": (Utc::now() - Duration::seconds(90)).to_rfc3339(),
    }))
    .unwrap()
}

fn token_info() -> TokenInfo {
    serde_json::from_value(json!({"name": "Example", "symbol": "EXM", "decimals": 18})).unwrap()
}

fn token_thresholds() -> TokenFlowThresholds {
    serde_json::from_value(json!({"largeTransfer": "10000", "volumeSpike": 50})).unwrap()
}

#[test]
fn token_flow_dedup_processes_only_the_delta_across_cycles() {
    let info = token_info();
    let thresholds = token_thresholds();

    // Cycle 1: h1..h25
    let first_page: Vec<TransferRecord> = (1..=25)
        .map(|i| transfer(&format!("0xh{}", i), "0xsender", "0xreceiver", "100", 600))
        .collect();
    let first =
        merge_token_flows(None, &first_page, Some(&info), &thresholds, &[], Utc::now()).unwrap();
    assert_eq!(first.metrics.total_transfers, 25);
    assert_eq!(first.metadata.new_items_processed, 25);

    // Cycle 2: h26 plus h1..h24 re-delivered
    let mut second_page = vec![transfer("0xh26", "0xsender", "0xreceiver", "100", 60)];
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

    // Exactly the delta was processed and totals stayed additive
    assert_eq!(second.metadata.new_items_processed, 1);
    assert_eq!(
        second.metrics.total_transfers,
        first.metrics.total_transfers + 1
    );

    // Hash-set growth equals the delta
    let first_hashes: std::collections::HashSet<_> = first
        .metrics
        .processed_transaction_hashes
        .iter()
        .collect();
    let new_hashes: Vec<_> = second
        .metrics
        .processed_transaction_hashes
        .iter()
        .filter(|h| !first_hashes.contains(h))
        .collect();
    assert_eq!(new_hashes, vec!["0xh26"]);

    // Address sets are monotone
    assert!(second
        .metrics
        .unique_addresses
        .is_superset(&first.metrics.unique_addresses));

    // Cycle 3: the same page again is a no-op
    let third = merge_token_flows(
        Some(&second.metrics),
        &second_page,
        Some(&info),
        &thresholds,
        &[],
        Utc::now(),
    );
    assert!(third.is_none());
}

#[test]
fn token_flow_large_transfer_raises_risk_over_prior() {
    let info = token_info();
    let thresholds = token_thresholds();

    let quiet_page = vec![transfer("0xq1", "0xa", "0xb", "5", 600)];
    let quiet =
        merge_token_flows(None, &quiet_page, Some(&info), &thresholds, &[], Utc::now()).unwrap();

    let mut loud_page = vec![transfer("0xbig", "0xa", "0xb", "50000", 30)];
    loud_page.extend(quiet_page.iter().cloned());
    let loud = merge_token_flows(
        Some(&quiet.metrics),
        &loud_page,
        Some(&info),
        &thresholds,
        &[],
        Utc::now(),
    )
    .unwrap();

    assert!(loud
        .alerts
        .iter()
        .any(|a| a.alert_type == "LARGE_TRANSFER"));
    assert!(loud.risk_score >= quiet.risk_score + 1);
    assert!(loud.risk_score <= 10);
}

#[test]
fn token_flow_bounded_windows_survive_many_cycles() {
    let info = token_info();
    let thresholds: TokenFlowThresholds =
        serde_json::from_value(json!({"largeTransfer": "1"})).unwrap();

    let mut metrics = None;
    for cycle in 0..30 {
        let page: Vec<TransferRecord> = (0..50)
            .map(|i| {
                transfer(
                    &format!("0xc{}i{}", cycle, i),
                    "0xa",
                    if i % 10 == 0 { ZERO_ADDRESS } else { "0xb" },
                    "1000",
                    30,
                )
            })
            .collect();

        let outcome = merge_token_flows(
            metrics.as_ref(),
            &page,
            Some(&info),
            &thresholds,
            &[],
            Utc::now(),
        )
        .unwrap();

        assert!(outcome.metrics.large_transfers.len() <= 100);
        assert!(outcome.metrics.burn_transactions.len() <= 100);
        assert!(outcome.metrics.processed_transaction_hashes.len() <= 1000);
        assert!(outcome.risk_score >= 1 && outcome.risk_score <= 10);
        metrics = Some(outcome.metrics);
    }

    // 30 cycles x 50 transfers, every one counted despite the caps
    assert_eq!(metrics.unwrap().total_transfers, 1500);
}

#[test]
fn nft_movement_holder_sets_grow_monotonically() {
    let thresholds = NftMovementThresholds::default();

    let first_page = vec![
        nft_transfer("0x1", ZERO_ADDRESS, "0xalice", "1"),
        nft_transfer("0x2", ZERO_ADDRESS, "0xbob", "2"),
    ];
    let first =
        merge_nft_movements(None, &first_page, true, &thresholds, &[], Utc::now()).unwrap();

    // Alice sells everything; she must remain in the historical holder set
    let second_page = vec![nft_transfer("0x3", "0xalice", "0xcarol", "1")];
    let second = merge_nft_movements(
        Some(&first.metrics),
        &second_page,
        true,
        &thresholds,
        &[],
        Utc::now(),
    )
    .unwrap();

    assert!(second
        .metrics
        .unique_holders
        .is_superset(&first.metrics.unique_holders));
    assert!(second.metrics.unique_holders.contains("0xcarol"));
    assert_eq!(second.metrics.current_holders["1"], "0xcarol");
    assert_eq!(
        second.metrics.total_transfers,
        first.metrics.total_transfers + 1
    );
}

#[test]
fn nft_movement_bounded_windows_hold() {
    let thresholds = NftMovementThresholds::default();

    let mut metrics = None;
    for cycle in 0..5 {
        let page: Vec<TransferRecord> = (0..600)
            .map(|i| {
                let id = format!("{}", cycle * 600 + i);
                if i % 3 == 0 {
                    nft_transfer(&format!("0xm{}x{}", cycle, i), ZERO_ADDRESS, "0xminter", &id)
                } else if i % 3 == 1 {
                    nft_transfer(&format!("0xb{}x{}", cycle, i), "0xminter", ZERO_ADDRESS, &id)
                } else {
                    nft_transfer(&format!("0xt{}x{}", cycle, i), "0xminter", "0xtrader", &id)
                }
            })
            .collect();

        let outcome = merge_nft_movements(
            metrics.as_ref(),
            &page,
            true,
            &thresholds,
            &[],
            Utc::now(),
        )
        .unwrap();

        assert!(outcome.metrics.transfer_history.len() <= 1000);
        assert!(outcome.metrics.mint_transactions.len() <= 500);
        assert!(outcome.metrics.burn_transactions.len() <= 500);
        assert!(outcome.metrics.processed_transaction_hashes.len() <= 2000);
        metrics = Some(outcome.metrics);
    }
}

#[test]
fn wallet_cycles_accumulate_and_short_circuit() {
    let wallet = "0x00000000000000000000000000000000000000aa";

    let tx = |hash: &str, from: &str, to: &str, value: &str| -> TransactionRecord {
        serde_json::from_value(json!({
            "hash": hash,
            "from": from,
            "to": to,
            "value": value,
            "type": 2,
            "status": true,
            "gasUsed": "21000",
            "fee": "315000000000",
            "timestamp": (Utc::now() - Duration::seconds(60)).to_rfc3339(),
        }))
        .unwrap()
    };

    let inputs = |transactions: Vec<TransactionRecord>| WalletAnalysisInputs {
        native_balance: "1000000000000000000".to_string(),
        token_holdings: Some(Vec::new()),
        nft_holdings: Some(Vec::new()),
        transactions: Some(transactions),
    };

    let first_page = vec![
        tx("0x1", wallet, "0xpeer00000000000000000000000000000000cafe", "100"),
        tx("0x2", "0xpeer00000000000000000000000000000000cafe", wallet, "300"),
    ];
    let first = merge_wallet_snapshot(wallet, None, &inputs(first_page.clone())).unwrap();
    assert_eq!(first.metrics.outgoing_value, "100");
    assert_eq!(first.metrics.incoming_value, "300");

    // Same page again: no new work, no snapshot
    assert!(merge_wallet_snapshot(wallet, Some(&first.metrics), &inputs(first_page.clone())).is_none());

    // One new incoming transaction on top of the old page
    let mut second_page = vec![tx(
        "0x3",
        "0xpeer00000000000000000000000000000000cafe",
        wallet,
        "50",
    )];
    second_page.extend(first_page);

    let second =
        merge_wallet_snapshot(wallet, Some(&first.metrics), &inputs(second_page)).unwrap();
    assert_eq!(second.metadata.new_items_processed, 1);
    assert_eq!(second.metrics.incoming_value, "350");
    assert_eq!(second.metrics.outgoing_value, "100");
    assert!(second.risk_score >= 1 && second.risk_score <= 10);
}
