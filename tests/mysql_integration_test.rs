// ABOUTME: Integration tests for the MySQL listing store
// ABOUTME: Need a scratch database in TEST_MYSQL_URL; run with `cargo test -- --ignored`

use finn_bobil_sync::config::DatabaseConfig;
use finn_bobil_sync::store::{ListingRecord, ListingStore, MysqlStore};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts};
use std::env;

/// Helper to get the test database URL from environment
fn get_test_url() -> Option<String> {
    env::var("TEST_MYSQL_URL").ok()
}

/// Mask the password of a connection URL before printing it.
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

fn database_config(url: &str, table: &str) -> DatabaseConfig {
    let parsed = url::Url::parse(url).expect("TEST_MYSQL_URL must be a URL");
    DatabaseConfig {
        host: parsed.host_str().unwrap_or("localhost").to_string(),
        user: parsed.username().to_string(),
        password: parsed.password().unwrap_or_default().to_string(),
        name: parsed.path().trim_start_matches('/').to_string(),
        port: parsed.port().unwrap_or(3306),
        table: table.to_string(),
    }
}

async fn setup_tables(url: &str, table: &str) -> anyhow::Result<()> {
    eprintln!("Preparing `{}` on {}", table, redact_url(url));
    let mut conn = Conn::new(Opts::from_url(url)?).await?;
    conn.query_drop(format!("DROP TABLE IF EXISTS `{}`", table))
        .await?;
    conn.query_drop(format!(
        "CREATE TABLE `{}` (
            Finnkode VARCHAR(32) PRIMARY KEY,
            Annonsenavn TEXT,
            Modell VARCHAR(16),
            Kilometerstand VARCHAR(32),
            Girkasse VARCHAR(64),
            Beskrivelse TEXT,
            Nyttelast VARCHAR(64),
            Typebobil VARCHAR(64),
            Oppdatert VARCHAR(32),
            URL TEXT,
            Pris INT
        )",
        table
    ))
    .await?;
    conn.query_drop(
        "CREATE TABLE IF NOT EXISTS prisendringer (
            id INT AUTO_INCREMENT PRIMARY KEY,
            Finnkode VARCHAR(32),
            Tidspunkt DATETIME,
            Pris INT
        )",
    )
    .await?;
    conn.query_drop(
        "CREATE TABLE IF NOT EXISTS bobil_script_status (
            id INT PRIMARY KEY DEFAULT 1,
            last_run DATETIME
        )",
    )
    .await?;
    conn.disconnect().await?;
    Ok(())
}

fn record(id: &str, price: i64) -> ListingRecord {
    ListingRecord {
        id: id.to_string(),
        title: "Adria Coral 670 SL".to_string(),
        model: "2014".to_string(),
        mileage: "64 500 km".to_string(),
        transmission: "Automat".to_string(),
        description: "Pen og velholdt".to_string(),
        payload: "450 kg".to_string(),
        body_type: "Halvintegrert".to_string(),
        updated: "14. Mar. 2024 09:30".to_string(),
        url: format!("https://www.finn.no/mobility/item/{}", id),
        price: Some(price),
    }
}

#[tokio::test]
#[ignore]
async fn test_upsert_then_find_roundtrip() {
    let Some(url) = get_test_url() else {
        eprintln!("Skipping: TEST_MYSQL_URL not set");
        return;
    };
    let table = "bobil_it_roundtrip";
    setup_tables(&url, table).await.unwrap();

    let mut store = MysqlStore::connect(&database_config(&url, table))
        .await
        .unwrap();

    assert!(store.find("900000001").await.unwrap().is_none());

    store.upsert(&record("900000001", 500000)).await.unwrap();
    let stored = store.find("900000001").await.unwrap().unwrap();
    assert_eq!(stored, record("900000001", 500000));

    store.upsert(&record("900000001", 480000)).await.unwrap();
    let stored = store.find("900000001").await.unwrap().unwrap();
    assert_eq!(stored.price, Some(480000));

    store.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_price_history_and_run_stamp() {
    let Some(url) = get_test_url() else {
        eprintln!("Skipping: TEST_MYSQL_URL not set");
        return;
    };
    let table = "bobil_it_history";
    setup_tables(&url, table).await.unwrap();

    let mut store = MysqlStore::connect(&database_config(&url, table))
        .await
        .unwrap();
    store.record_price_change("900000002", 455000).await.unwrap();
    store.mark_run_finished().await.unwrap();
    store.mark_run_finished().await.unwrap();
    store.close().await.unwrap();

    let mut conn = Conn::new(Opts::from_url(&url).unwrap()).await.unwrap();
    let prices: Vec<i64> = conn
        .exec(
            "SELECT Pris FROM prisendringer WHERE Finnkode = ?",
            ("900000002",),
        )
        .await
        .unwrap();
    assert!(prices.contains(&455000));

    let stamps: Vec<u64> = conn
        .query("SELECT COUNT(*) FROM bobil_script_status")
        .await
        .unwrap();
    assert_eq!(stamps, vec![1]);
    conn.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_connect_failure_is_reported() {
    let config = DatabaseConfig {
        host: "127.0.0.1".to_string(),
        user: "nobody".to_string(),
        password: "wrong".to_string(),
        name: "missing".to_string(),
        port: 1,
        table: "bobil".to_string(),
    };
    let err = match MysqlStore::connect(&config).await {
        Ok(_) => panic!("connecting to port 1 should fail"),
        Err(e) => e,
    };
    assert!(format!("{:#}", err).contains("127.0.0.1"));
}
