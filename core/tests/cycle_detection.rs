//! Circular fund routing tests: cycle enumeration bounds, hub pruning,
//! and CRS scoring behavior.

use ringtrace_core::engine::DetectionEngine;
use ringtrace_core::report::PatternType;
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

/// A tight three-hop loop with equal amounts is the canonical round-trip
/// and must come out as one high-scoring ring.
#[test]
fn three_hop_cycle_detected() {
    let records = vec![
        txn("t1", "ACC_A", "ACC_B", 1000.0, "2024-01-01 10:00:00"),
        txn("t2", "ACC_B", "ACC_C", 1000.0, "2024-01-01 10:30:00"),
        txn("t3", "ACC_C", "ACC_A", 1000.0, "2024-01-01 11:00:00"),
    ];

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    assert_eq!(
        report.fraud_rings.len(),
        1,
        "Expected exactly one ring, got {:?}",
        report.fraud_rings
    );
    let ring = &report.fraud_rings[0];
    assert_eq!(ring.ring_id, "RING_001");
    assert_eq!(ring.pattern_type, PatternType::Cycle);
    assert_eq!(
        ring.member_accounts,
        vec!["ACC_A", "ACC_B", "ACC_C"],
        "Cycle must be anchored at its smallest member"
    );
    assert!(
        ring.risk_score > 60.0,
        "Tight equal-amount loop should score high, got {}",
        ring.risk_score
    );
    assert_eq!(
        ring.detected_at.as_deref(),
        Some("2024-01-01 11:00:00"),
        "detected_at must be the loop's completing transaction"
    );

    assert_eq!(report.suspicious_accounts.len(), 3);
    for account in &report.suspicious_accounts {
        assert!(
            account
                .detected_patterns
                .contains(&"cycle_length_3".to_string()),
            "Member {} missing cycle_length_3: {:?}",
            account.account_id,
            account.detected_patterns
        );
    }
}

/// Cycles longer than five hops are outside the search bound and must
/// produce nothing.
#[test]
fn six_hop_cycle_ignored() {
    let nodes = ["N1", "N2", "N3", "N4", "N5", "N6"];
    let mut records = Vec::new();
    for i in 0..6 {
        records.push(txn(
            &format!("t{i}"),
            nodes[i],
            nodes[(i + 1) % 6],
            500.0,
            &format!("2024-01-01 10:0{i}:00"),
        ));
    }

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    assert!(
        report.fraud_rings.is_empty(),
        "Six-hop loop must not be reported: {:?}",
        report.fraud_rings
    );
    assert!(report.suspicious_accounts.is_empty());
}

/// An account above the hub degree threshold is excluded from the cycle
/// search even when a real loop runs through it.
#[test]
fn hub_excluded_from_cycles() {
    let mut records = Vec::new();
    // 21 spokes push the hub's degree past the limit of 20.
    for i in 0..21 {
        records.push(txn(
            &format!("bg{i}"),
            "HUB",
            &format!("SPOKE_{i:02}"),
            50.0,
            &format!("2024-02-{:02} 09:00:00", (i % 27) + 1),
        ));
    }
    records.push(txn("c1", "HUB", "X", 2000.0, "2024-02-01 10:00:00"));
    records.push(txn("c2", "X", "Y", 2000.0, "2024-02-01 10:10:00"));
    records.push(txn("c3", "Y", "HUB", 2000.0, "2024-02-01 10:20:00"));

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    assert!(
        !report
            .fraud_rings
            .iter()
            .any(|r| r.pattern_type == PatternType::Cycle),
        "Loop through a hub must be pruned: {:?}",
        report.fraud_rings
    );
}

/// Overlapping cycles sharing an edge are each reported once, with
/// sequential ring ids and scores inside [0, 100].
#[test]
fn overlapping_cycles_enumerated_once_each() {
    let records = vec![
        txn("t1", "A", "B", 1000.0, "2024-03-01 10:00:00"),
        txn("t2", "B", "C", 1000.0, "2024-03-01 11:00:00"),
        txn("t3", "C", "A", 1000.0, "2024-03-01 12:00:00"),
        txn("t4", "B", "D", 900.0, "2024-03-01 13:00:00"),
        txn("t5", "D", "A", 900.0, "2024-03-01 14:00:00"),
    ];

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    assert_eq!(
        report.fraud_rings.len(),
        2,
        "Expected the ABC and ABD cycles: {:?}",
        report.fraud_rings
    );
    assert_eq!(report.fraud_rings[0].ring_id, "RING_001");
    assert_eq!(report.fraud_rings[1].ring_id, "RING_002");
    for ring in &report.fraud_rings {
        assert_eq!(ring.member_accounts.len(), 3);
        assert!(
            (0.0..=100.0).contains(&ring.risk_score),
            "Score out of range: {}",
            ring.risk_score
        );
    }
}

/// Uniform amounts along the loop score higher than wildly varying ones,
/// all else equal.
#[test]
fn dissimilar_amounts_score_lower() {
    let records = vec![
        txn("t1", "EQ_1", "EQ_2", 1000.0, "2024-04-01 10:00:00"),
        txn("t2", "EQ_2", "EQ_3", 1000.0, "2024-04-01 10:30:00"),
        txn("t3", "EQ_3", "EQ_1", 1000.0, "2024-04-01 11:00:00"),
        txn("t4", "VAR_1", "VAR_2", 100.0, "2024-04-01 10:00:00"),
        txn("t5", "VAR_2", "VAR_3", 5000.0, "2024-04-01 10:30:00"),
        txn("t6", "VAR_3", "VAR_1", 9000.0, "2024-04-01 11:00:00"),
    ];

    let report = DetectionEngine::with_defaults()
        .run(&records)
        .expect("engine run");

    let score_of = |member: &str| {
        report
            .fraud_rings
            .iter()
            .find(|r| r.member_accounts.iter().any(|m| m == member))
            .map(|r| r.risk_score)
            .unwrap_or_else(|| panic!("no ring containing {member}"))
    };

    let equal = score_of("EQ_1");
    let varying = score_of("VAR_1");
    assert!(
        equal > varying,
        "Equal-amount loop ({equal}) must outscore varying one ({varying})"
    );
}
