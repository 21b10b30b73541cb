//! Store sync tests against the in-memory sheet.

use chrono::{TimeZone, Utc};

use stockscan::sync::{self, KeyValueSheet, ResultSynchronizer};
use stockscan::types::{Board, Instrument, ScanOutcome, ScanResult, SyncRecord};

use super::mock_sources::InMemorySheet;

fn ranked_outcome(n: usize) -> ScanOutcome {
    let results = (0..n)
        .map(|i| ScanResult {
            instrument: Instrument::from_code("2330", Board::Listed).unwrap(),
            current_price: 100.0,
            buy_price: 98.0,
            sell_price: 104.0 - i as f64,
            days_to_target: 5,
            projected_return: (104.0 - i as f64 - 98.0) / 98.0,
            insight: String::new(),
        })
        .collect();
    ScanOutcome::Ranked {
        scanned: n + 2,
        results,
    }
}

#[tokio::test]
async fn repeated_runs_keep_one_row_per_key() {
    // Scenario C: two runs write last_scan=T1 then T2; the store ends
    // up with exactly one last_scan row holding T2.
    let sheet = InMemorySheet::new();
    let sync = ResultSynchronizer::new(Box::new(sheet.clone()));

    let t1 = Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2026, 8, 24, 17, 30, 0).unwrap();

    sync.upsert(&sync::summary_records(&ranked_outcome(3), t1))
        .await
        .unwrap();
    sync.upsert(&sync::summary_records(&ranked_outcome(1), t2))
        .await
        .unwrap();

    let last_scan = sheet.rows_for_key("last_scan");
    assert_eq!(last_scan.len(), 1);
    assert_eq!(last_scan[0][1], "17:30:00");

    let found = sheet.rows_for_key("found");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0][1], "1");

    // Three distinct keys, three rows total.
    assert_eq!(sheet.snapshot().len(), 3);
}

#[tokio::test]
async fn no_results_outcome_still_syncs_counters() {
    let sheet = InMemorySheet::new();
    let sync = ResultSynchronizer::new(Box::new(sheet.clone()));

    let at = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
    let outcome = ScanOutcome::NoResults { scanned: 8 };
    sync.upsert(&sync::summary_records(&outcome, at))
        .await
        .unwrap();

    assert_eq!(sheet.rows_for_key("found")[0][1], "0");
    assert_eq!(sheet.rows_for_key("scanned")[0][1], "8");
}

#[tokio::test]
async fn upsert_preserves_unrelated_rows() {
    // Rows the scanner doesn't own stay untouched across a sync.
    let sheet = InMemorySheet::new();
    sheet
        .append_row(vec!["note".to_string(), "manual entry".to_string()])
        .await
        .unwrap();
    sheet
        .append_row(vec!["found".to_string(), "99".to_string()])
        .await
        .unwrap();

    let sync = ResultSynchronizer::new(Box::new(sheet.clone()));
    sync.upsert(&[
        SyncRecord::new("found", "2"),
        SyncRecord::new("scanned", "6"),
    ])
    .await
    .unwrap();

    let rows = sheet.snapshot();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["note".to_string(), "manual entry".to_string()]);
    assert_eq!(rows[1], vec!["found".to_string(), "2".to_string()]);
    assert_eq!(rows[2], vec!["scanned".to_string(), "6".to_string()]);
}
