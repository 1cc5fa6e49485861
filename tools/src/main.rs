//! batch-runner: headless detection runner for ringtrace.
//!
//! Usage:
//!   batch-runner --input transactions.csv --output report.json
//!   batch-runner --synthetic 200 --seed 42
//!
//! CSV input needs a header row with sender_id, receiver_id, amount and
//! timestamp columns (case-insensitive, `,` or `;` delimited). Parsing
//! lives here, not in the engine: the engine consumes sanitized-ish
//! records and drops whatever is still malformed.

use anyhow::Result;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use ringtrace_core::{
    config::EngineConfig, engine::DetectionEngine, report::DetectionReport,
    types::TransactionRecord,
};
use std::env;
use std::fs;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = arg_value(&args, "--input");
    let output = arg_value(&args, "--output");
    let config_path = arg_value(&args, "--config");
    let synthetic: Option<usize> = parse_arg(&args, "--synthetic");
    let seed: u64 = parse_arg(&args, "--seed").unwrap_or(42);

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let records = match (input, synthetic) {
        (Some(path), _) => load_csv(path)?,
        (None, Some(n)) => {
            println!("generating {n} synthetic transactions (seed {seed})");
            synthetic_batch(n, seed)
        }
        (None, None) => {
            eprintln!("usage: batch-runner --input <csv> [--output <json>] [--config <json>]");
            eprintln!("       batch-runner --synthetic <n> [--seed <u64>]");
            std::process::exit(2);
        }
    };

    let engine = DetectionEngine::new(config);
    let report = engine.run(&records)?;

    print_summary(&report, records.len());

    if let Some(path) = output {
        fs::write(path, report.to_json()?)?;
        println!();
        println!("report written to {path}");
    }

    Ok(())
}

fn print_summary(report: &DetectionReport, record_count: usize) {
    println!("=== DETECTION SUMMARY ===");
    println!("  records:            {record_count}");
    println!(
        "  accounts analyzed:  {}",
        report.summary.total_accounts_analyzed
    );
    println!(
        "  accounts flagged:   {}",
        report.summary.suspicious_accounts_flagged
    );
    println!(
        "  rings detected:     {}",
        report.summary.fraud_rings_detected
    );
    println!(
        "  processing time:    {:.1}s",
        report.summary.processing_time_seconds
    );

    if !report.suspicious_accounts.is_empty() {
        println!();
        println!("=== TOP FLAGGED ACCOUNTS ===");
        for account in report.suspicious_accounts.iter().take(10) {
            println!(
                "  {:<20} {:>5.1}  [{}]  {}",
                account.account_id,
                account.suspicion_score,
                account.detected_patterns.join(", "),
                account.ring_id
            );
        }
    }

    if !report.fraud_rings.is_empty() {
        println!();
        println!("=== RINGS ===");
        for ring in report.fraud_rings.iter().take(10) {
            println!(
                "  {:<16} {:>5.1}  {} members  {}",
                ring.ring_id,
                ring.risk_score,
                ring.member_accounts.len(),
                ring.detected_at.as_deref().unwrap_or("-")
            );
        }
    }
}

// ── CSV loading ──────────────────────────────────────────────────────────────

fn load_csv(path: &str) -> Result<Vec<TransactionRecord>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let mut lines = content.lines();

    let header = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("{path} is empty"))?;
    let delimiter = if header.matches(';').count() > header.matches(',').count() {
        ';'
    } else {
        ','
    };

    let columns: Vec<String> = header
        .split(delimiter)
        .map(|c| c.trim().to_lowercase())
        .collect();
    let col = |name: &str| columns.iter().position(|c| c == name);

    let sender_col = col("sender_id")
        .ok_or_else(|| anyhow::anyhow!("missing sender_id column, found: {columns:?}"))?;
    let receiver_col = col("receiver_id")
        .ok_or_else(|| anyhow::anyhow!("missing receiver_id column, found: {columns:?}"))?;
    let amount_col = col("amount")
        .ok_or_else(|| anyhow::anyhow!("missing amount column, found: {columns:?}"))?;
    let timestamp_col = col("timestamp")
        .ok_or_else(|| anyhow::anyhow!("missing timestamp column, found: {columns:?}"))?;
    let id_col = col("transaction_id").or_else(|| col("id"));

    let mut records = Vec::new();
    for (row_idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        records.push(TransactionRecord {
            id: id_col
                .map(field)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("row-{}", row_idx + 1)),
            sender: field(sender_col).to_string(),
            receiver: field(receiver_col).to_string(),
            // Unparseable amounts become NaN; the engine drops them.
            amount: field(amount_col).parse().unwrap_or(f64::NAN),
            timestamp: field(timestamp_col).to_string(),
        });
    }

    log::info!("loaded {} records from {path}", records.len());
    Ok(records)
}

// ── Synthetic batch ──────────────────────────────────────────────────────────

/// Deterministic demo batch: random background traffic plus one planted
/// cycle, one fan-in burst, and one shell chain. Same seed, same batch.
fn synthetic_batch(n: usize, seed: u64) -> Vec<TransactionRecord> {
    use rand::Rng;

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let account_pool = (n / 4).max(20);
    let mut records = Vec::new();
    let mut id = 0usize;
    let mut next_id = |records: &mut Vec<TransactionRecord>,
                       s: String,
                       r: String,
                       amount: f64,
                       minute: i64| {
        id += 1;
        records.push(TransactionRecord {
            id: format!("txn-{id:05}"),
            sender: s,
            receiver: r,
            amount,
            timestamp: timestamp_at(minute),
        });
    };

    // Background traffic.
    for _ in 0..n {
        let s = rng.gen_range(0..account_pool);
        let mut r = rng.gen_range(0..account_pool);
        if r == s {
            r = (r + 1) % account_pool;
        }
        let amount = rng.gen_range(10.0..5000.0);
        let minute = rng.gen_range(0..60 * 24 * 30);
        next_id(
            &mut records,
            format!("ACC_{s:04}"),
            format!("ACC_{r:04}"),
            amount,
            minute,
        );
    }

    // Planted cycle: equal amounts, tight timing.
    let cycle = ["LOOP_A", "LOOP_B", "LOOP_C"];
    for (i, pair) in [(0, 1), (1, 2), (2, 0)].iter().enumerate() {
        next_id(
            &mut records,
            cycle[pair.0].to_string(),
            cycle[pair.1].to_string(),
            2500.0,
            100 + i as i64 * 10,
        );
    }

    // Planted fan-in: 10 mules feed one aggregator inside an hour.
    for i in 0..10 {
        next_id(
            &mut records,
            format!("MULE_{i:02}"),
            "AGGREGATOR".to_string(),
            900.0,
            200 + i as i64 * 5,
        );
    }

    // Planted shell chain: two low-activity intermediaries.
    for (i, (s, r)) in [
        ("SRC", "SHELL_X"),
        ("SHELL_X", "SHELL_Y"),
        ("SHELL_Y", "DEST"),
    ]
    .iter()
    .enumerate()
    {
        next_id(
            &mut records,
            s.to_string(),
            r.to_string(),
            7000.0,
            300 + i as i64 * 60,
        );
    }

    records
}

fn timestamp_at(minute: i64) -> String {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid base date");
    (base + chrono::Duration::minutes(minute))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// ── Arg parsing ──────────────────────────────────────────────────────────────

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    arg_value(args, flag).and_then(|v| v.parse().ok())
}
