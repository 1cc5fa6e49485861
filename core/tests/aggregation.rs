//! Aggregation tests: cross-detector merging, report ordering, rounding,
//! and summary bookkeeping.

use ringtrace_core::engine::DetectionEngine;
use ringtrace_core::types::TransactionRecord;

fn txn(id: &str, sender: &str, receiver: &str, amount: f64, ts: &str) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
        timestamp: ts.to_string(),
    }
}

/// An account in a cycle and at the center of a fan-in at once. One ring
/// per pattern, cycle LOOP_A -> LOOP_B -> LOOP_C plus ten mules feeding
/// LOOP_A inside ten minutes.
fn mixed_batch() -> Vec<TransactionRecord> {
    let mut records = vec![
        txn("c1", "LOOP_A", "LOOP_B", 1000.0, "2024-08-01 10:00:00"),
        txn("c2", "LOOP_B", "LOOP_C", 1000.0, "2024-08-01 10:30:00"),
        txn("c3", "LOOP_C", "LOOP_A", 1000.0, "2024-08-01 11:00:00"),
    ];
    for i in 0..10 {
        records.push(txn(
            &format!("m{i}"),
            &format!("MULE_{i:02}"),
            "LOOP_A",
            900.0,
            &format!("2024-08-01 12:0{i}:00"),
        ));
    }
    records
}

/// The aggregator must report a doubly-flagged account exactly once with
/// the max score and both detectors' pattern labels.
#[test]
fn account_in_multiple_patterns_merged_once() {
    let report = DetectionEngine::with_defaults()
        .run(&mixed_batch())
        .expect("engine run");

    let entries: Vec<_> = report
        .suspicious_accounts
        .iter()
        .filter(|a| a.account_id == "LOOP_A")
        .collect();
    assert_eq!(entries.len(), 1, "LOOP_A must appear exactly once");

    let merged = entries[0];
    assert_eq!(
        merged.suspicion_score, 90.0,
        "Max of cycle and fan-in scores must win"
    );
    assert_eq!(
        merged.ring_id, "SMURF_IN_LOOP_A",
        "Ring id must follow the winning score"
    );
    for pattern in ["cycle_length_3", "fan_in"] {
        assert!(
            merged.detected_patterns.contains(&pattern.to_string()),
            "Missing {pattern}: {:?}",
            merged.detected_patterns
        );
    }
    let mut sorted = merged.detected_patterns.clone();
    sorted.sort();
    assert_eq!(
        merged.detected_patterns, sorted,
        "Pattern union must be sorted"
    );

    let ring_ids: Vec<&str> = report.fraud_rings.iter().map(|r| r.ring_id.as_str()).collect();
    assert_eq!(ring_ids, vec!["RING_001", "SMURF_IN_LOOP_A"]);
}

/// Accounts come out sorted by score descending, id ascending on ties.
#[test]
fn accounts_sorted_by_score_then_id() {
    let report = DetectionEngine::with_defaults()
        .run(&mixed_batch())
        .expect("engine run");

    assert!(!report.suspicious_accounts.is_empty());
    for pair in report.suspicious_accounts.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.suspicion_score > b.suspicion_score
                || (a.suspicion_score == b.suspicion_score && a.account_id < b.account_id),
            "Order violated: {} ({}) before {} ({})",
            a.account_id,
            a.suspicion_score,
            b.account_id,
            b.suspicion_score
        );
    }
}

/// Final scores carry one decimal; a second rounding pass must be a
/// no-op.
#[test]
fn final_scores_rounded_to_one_decimal() {
    let report = DetectionEngine::with_defaults()
        .run(&mixed_batch())
        .expect("engine run");

    for account in &report.suspicious_accounts {
        let rounded = (account.suspicion_score * 10.0).round() / 10.0;
        assert_eq!(
            account.suspicion_score, rounded,
            "Account {} score not 1-decimal",
            account.account_id
        );
        assert!((0.0..=100.0).contains(&account.suspicion_score));
    }
    for ring in &report.fraud_rings {
        let rounded = (ring.risk_score * 10.0).round() / 10.0;
        assert_eq!(ring.risk_score, rounded, "Ring {} score not 1-decimal", ring.ring_id);
    }
}

/// Summary counters must match the report body and the distinct valid
/// accounts of the batch.
#[test]
fn summary_counts_match_body() {
    let mut records = mixed_batch();
    // Skipped rows still feed the account census: their ids were in the
    // batch even though no edge survives.
    records.push(txn("bad1", "", "LOOP_A", 10.0, "2024-08-01 13:00:00"));
    records.push(txn("bad2", "GHOST", "GHOST", 10.0, "2024-08-01 13:00:00"));
    records.push(txn("bad3", "X1", "X2", -5.0, "2024-08-01 13:00:00"));

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    // 3 loop accounts + 10 mules + GHOST, X1, X2 from the skipped rows.
    assert_eq!(report.summary.total_accounts_analyzed, 16);
    assert_eq!(
        report.summary.suspicious_accounts_flagged,
        report.suspicious_accounts.len()
    );
    assert_eq!(report.summary.fraud_rings_detected, report.fraud_rings.len());
    assert!(report.summary.processing_time_seconds >= 0.0);
}
