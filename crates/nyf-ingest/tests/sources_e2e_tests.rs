//! End-to-end tests for the hand-written adapters and multi-endpoint sources

mod common;

use common::{csv_lines, ymd, TestEnv};
use nyf_ingest::pipeline::{RunMode, SourceStatus};
use nyf_ingest::sources::primary_dealer::PrimaryDealerStats;
use nyf_ingest::sources::reference_rates;
use nyf_ingest::sources::soma::SomaHoldings;
use nyf_ingest::state::{Cadence, StateStore, Watermark};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, ResponseTemplate};

// ============================================================================
// Primary Dealer Statistics
// ============================================================================

const SERIES_CSV: &str = "As Of Date,Time Series,Value\n2024-05-29,X,\"12,345\"\n2024-06-05,X,100\n";

#[tokio::test]
async fn test_primary_dealer_tolerates_a_failed_series() {
    let env = TestEnv::start().await;
    Mock::given(method("GET"))
        .and(path("/pd/latest/PDFINRR.csv"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/pd/latest/[A-Z]+\.csv$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_CSV))
        .mount(&env.server)
        .await;

    let outcome = env
        .runner(ymd(2024, 6, 10), RunMode::Full)
        .run(&PrimaryDealerStats)
        .await;

    match &outcome.status {
        SourceStatus::Published { rows, watermark, .. } => {
            assert_eq!(*rows, 18);
            assert_eq!(*watermark, Some(ymd(2024, 6, 5)));
        },
        other => panic!("expected publish, got {:?}", other),
    }

    let lines = csv_lines(&env.output_file("nyf_primary_dealer_stats"));
    assert!(!lines.iter().any(|l| l.contains("PDFINRR")));
    assert!(lines.iter().any(|l| l.contains("12.345")));

    let watermark = env.state().load("primary_dealer_stats").await;
    assert_eq!(watermark.cadence, Cadence::Weekly);
    let stored = std::fs::read_to_string(env.state().path_for("primary_dealer_stats")).unwrap();
    assert!(stored.contains("last_week"));
}

#[tokio::test]
async fn test_primary_dealer_skips_weeks_already_published() {
    let env = TestEnv::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/pd/latest/[A-Z]+\.csv$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_CSV))
        .mount(&env.server)
        .await;

    env.runner(ymd(2024, 6, 10), RunMode::Full)
        .run(&PrimaryDealerStats)
        .await;
    let second = env
        .runner(ymd(2024, 6, 11), RunMode::Full)
        .run(&PrimaryDealerStats)
        .await;

    assert!(matches!(second.status, SourceStatus::NoNewData));
    assert_eq!(env.watermark("primary_dealer_stats").await, Some(ymd(2024, 6, 5)));
}

// ============================================================================
// SOMA Holdings
// ============================================================================

fn treasury_holdings() -> Value {
    let holdings: Vec<Value> = (0..8)
        .map(|i| {
            json!({
                "cusip": format!("91282C{:03}", i),
                "securityDescription": if i % 2 == 0 { "Treasury Note" } else { "Treasury Bill" },
                "maturityDate": "2030-05-15",
                "parValue": "1,000,000",
                "percentOutstanding": "0.25"
            })
        })
        .collect();
    json!({"soma": {"holdings": holdings}})
}

fn agency_holdings() -> Value {
    json!({"soma": {"holdings": [
        {"cusip": "3133EKQP4", "securityDescription": "FFCB 2.5", "issuer": "FFCB", "parValue": 5000},
        {"cusip": "3130AGWK7", "securityDescription": "FHLB 1.5", "issuer": "FHLB", "parValue": 7000}
    ]}})
}

async fn mount_soma(env: &TestEnv) {
    Mock::given(method("GET"))
        .and(path("/soma/summary.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "soma": {"summary": [{"asOfDate": "2024-05-29"}, {"asOfDate": "2024-06-05"}]}
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/soma/tsy/get/all/asof/2024-06-05.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(treasury_holdings()))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/soma/agency/get/asof/2024-06-05.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agency_holdings()))
        .expect(1)
        .mount(&env.server)
        .await;
}

#[tokio::test]
async fn test_soma_publishes_latest_snapshot_once() {
    let env = TestEnv::start().await;
    mount_soma(&env).await;

    let first = env
        .runner(ymd(2024, 6, 10), RunMode::Full)
        .run(&SomaHoldings)
        .await;
    assert!(matches!(first.status, SourceStatus::Published { rows: 10, .. }));
    assert_eq!(env.watermark("soma_holdings").await, Some(ymd(2024, 6, 5)));

    let lines = csv_lines(&env.output_file("nyf_soma_holdings"));
    assert_eq!(lines.iter().filter(|l| l.contains("Agency Debt")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.contains("U.S. Treasury")).count(), 8);

    // same snapshot on the next day: holdings are not requested again
    let second = env
        .runner(ymd(2024, 6, 11), RunMode::Full)
        .run(&SomaHoldings)
        .await;
    assert!(matches!(second.status, SourceStatus::NoNewData));
    assert_eq!(env.watermark("soma_holdings").await, Some(ymd(2024, 6, 5)));
}

// ============================================================================
// Reference Rates
// ============================================================================

fn rates(kind: &[&str], date: &str) -> Value {
    let rows: Vec<Value> = kind
        .iter()
        .map(|t| json!({"effectiveDate": date, "type": t, "percentRate": "5.33", "volumeInBillions": "1,950"}))
        .collect();
    json!({"refRates": rows})
}

#[tokio::test]
async fn test_reference_rates_merge_both_endpoints_and_lag_a_day() {
    let env = TestEnv::start().await;
    let unsecured = ["EFFR", "OBFR", "EFFR", "OBFR", "EFFR", "OBFR"];
    let secured = ["SOFR", "BGCR", "TGCR", "SOFR", "BGCR", "TGCR", "SOFRAI"];
    Mock::given(method("GET"))
        .and(path("/rates/all/search.json"))
        .and(query_param("endDate", "2024-06-09"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates(&unsecured, "2024-06-07")))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rates/secured/all/search.json"))
        .and(query_param("endDate", "2024-06-09"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates(&secured, "2024-06-07")))
        .expect(1)
        .mount(&env.server)
        .await;

    env.state()
        .save(&Watermark::new("reference_rates", Cadence::Daily, ymd(2024, 6, 1)))
        .await
        .unwrap();

    let outcome = env
        .runner(ymd(2024, 6, 10), RunMode::Full)
        .run(&reference_rates::source())
        .await;

    // SOFRAI is not a published rate type and is filtered out
    assert!(matches!(outcome.status, SourceStatus::Published { rows: 12, .. }));
    assert_eq!(env.watermark("reference_rates").await, Some(ymd(2024, 6, 7)));
    assert_eq!(env.start_dates("/rates/all/search.json").await, vec!["2024-06-02"]);
}
