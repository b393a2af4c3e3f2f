// ABOUTME: MySQL-backed ListingStore using a single connection per run
// ABOUTME: Uses INSERT ... ON DUPLICATE KEY UPDATE for upserts

use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{params, Conn, OptsBuilder, Row, Value};
use std::time::Duration;

use super::columns;
use super::{ListingRecord, ListingStore, RowRejected};
use crate::config::DatabaseConfig;
use crate::utils::{parse_digits, quote_mysql_ident};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PRICE_HISTORY_TABLE: &str = "prisendringer";
const RUN_STATUS_TABLE: &str = "bobil_script_status";

/// Data columns in the order they are selected and written, key excluded.
const DATA_COLUMNS: [&str; 10] = [
    columns::TITLE,
    columns::MODEL,
    columns::MILEAGE,
    columns::TRANSMISSION,
    columns::DESCRIPTION,
    columns::PAYLOAD,
    columns::BODY_TYPE,
    columns::UPDATED,
    columns::URL,
    columns::PRICE,
];

pub struct MysqlStore {
    /// `None` once the store has been closed.
    conn: Option<Conn>,
    select_query: String,
    upsert_query: String,
}

impl MysqlStore {
    /// Open the connection used for every read and write of a run.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.name.clone()));

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, Conn::new(opts))
            .await
            .with_context(|| {
                format!(
                    "Timed out after {:?} connecting to {}",
                    CONNECT_TIMEOUT,
                    config.describe()
                )
            })?
            .with_context(|| format!("Failed to connect to {}", config.describe()))?;

        tracing::info!("Connected to {}", config.describe());

        Ok(Self {
            conn: Some(conn),
            select_query: build_select_query(&config.table),
            upsert_query: build_upsert_query(&config.table),
        })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .context("Database connection is already closed")
    }
}

/// Server-side refusals concern the statement only; I/O, driver and
/// protocol errors mean the connection can no longer be trusted.
fn classify_statement_error(id: &str, err: mysql_async::Error) -> anyhow::Error {
    match err {
        mysql_async::Error::Server(server) => RowRejected {
            id: id.to_string(),
            reason: server.to_string(),
        }
        .into(),
        other => anyhow::Error::new(other),
    }
}

#[async_trait]
impl ListingStore for MysqlStore {
    async fn find(&mut self, id: &str) -> Result<Option<ListingRecord>> {
        let query = self.select_query.clone();
        let row: Option<Row> = self
            .conn()?
            .exec_first(query, params! { "id" => id })
            .await
            .map_err(|e| classify_statement_error(id, e))
            .with_context(|| format!("Failed to look up listing {}", id))?;

        Ok(row.map(|row| row_to_record(id, row)))
    }

    async fn upsert(&mut self, record: &ListingRecord) -> Result<()> {
        let query = self.upsert_query.clone();
        self.conn()?
            .exec_drop(
                query,
                params! {
                    "id" => record.id.as_str(),
                    "title" => record.title.as_str(),
                    "model" => record.model.as_str(),
                    "mileage" => record.mileage.as_str(),
                    "transmission" => record.transmission.as_str(),
                    "description" => record.description.as_str(),
                    "payload" => record.payload.as_str(),
                    "body_type" => record.body_type.as_str(),
                    "updated" => record.updated.as_str(),
                    "url" => record.url.as_str(),
                    "price" => record.price,
                },
            )
            .await
            .map_err(|e| classify_statement_error(&record.id, e))
            .with_context(|| format!("Failed to save listing {}", record.id))
    }

    async fn record_price_change(&mut self, id: &str, price: i64) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (Finnkode, Tidspunkt, Pris) VALUES (:id, NOW(), :price)",
            quote_mysql_ident(PRICE_HISTORY_TABLE)
        );
        self.conn()?
            .exec_drop(query, params! { "id" => id, "price" => price })
            .await
            .with_context(|| format!("Failed to record price change for {}", id))
    }

    async fn mark_run_finished(&mut self) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (last_run) VALUES (NOW()) ON DUPLICATE KEY UPDATE last_run = NOW()",
            quote_mysql_ident(RUN_STATUS_TABLE)
        );
        self.conn()?
            .query_drop(query)
            .await
            .context("Failed to update last run timestamp")
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .disconnect()
                .await
                .context("Failed to close database connection"),
            None => Ok(()),
        }
    }
}

/// `SELECT <data columns> FROM <table> WHERE Finnkode = :id`
fn build_select_query(table: &str) -> String {
    let cols: Vec<String> = DATA_COLUMNS.iter().map(|c| quote_mysql_ident(c)).collect();
    format!(
        "SELECT {} FROM {} WHERE {} = :id",
        cols.join(", "),
        quote_mysql_ident(table),
        quote_mysql_ident(columns::ID)
    )
}

/// Upsert every column, keyed on Finnkode.
fn build_upsert_query(table: &str) -> String {
    let placeholders = [
        ":title",
        ":model",
        ":mileage",
        ":transmission",
        ":description",
        ":payload",
        ":body_type",
        ":updated",
        ":url",
        ":price",
    ];

    let mut cols = vec![quote_mysql_ident(columns::ID)];
    cols.extend(DATA_COLUMNS.iter().map(|c| quote_mysql_ident(c)));

    let mut values = vec![":id"];
    values.extend(placeholders);

    let updates: Vec<String> = DATA_COLUMNS
        .iter()
        .map(|c| {
            let col = quote_mysql_ident(c);
            format!("{} = VALUES({})", col, col)
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        quote_mysql_ident(table),
        cols.join(", "),
        values.join(", "),
        updates.join(", ")
    )
}

fn row_to_record(id: &str, mut row: Row) -> ListingRecord {
    let mut text = |index: usize| value_to_text(row.take::<Value, _>(index));
    let title = text(0);
    let model = text(1);
    let mileage = text(2);
    let transmission = text(3);
    let description = text(4);
    let payload = text(5);
    let body_type = text(6);
    let updated = text(7);
    let url = text(8);
    let price = value_to_price(row.take::<Value, _>(9));

    ListingRecord {
        id: id.to_string(),
        title,
        model,
        mileage,
        transmission,
        description,
        payload,
        body_type,
        updated,
        url,
        price,
    }
}

/// Render a column the way the listing compares it. NULL reads as empty.
fn value_to_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::NULL) => String::new(),
        Some(Value::Bytes(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(Value::Int(i)) => i.to_string(),
        Some(Value::UInt(u)) => u.to_string(),
        Some(Value::Float(f)) => f.to_string(),
        Some(Value::Double(d)) => d.to_string(),
        Some(other) => other.as_sql(true).trim_matches('\'').to_string(),
    }
}

/// Older rows store the price as display text ("500 000 kr").
fn value_to_price(value: Option<Value>) -> Option<i64> {
    match value {
        Some(Value::Int(i)) => Some(i),
        Some(Value::UInt(u)) => i64::try_from(u).ok(),
        Some(Value::Float(f)) => Some(f as i64),
        Some(Value::Double(d)) => Some(d as i64),
        Some(Value::Bytes(bytes)) => parse_digits(&String::from_utf8_lossy(&bytes)),
        _ => None,
    }
}
